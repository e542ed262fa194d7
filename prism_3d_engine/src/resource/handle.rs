/// Typed resource handles
///
/// Every table issues its own handle type, so a texture handle can never
/// be passed where a sampler handle is expected. The raw value is the
/// table slot; `-1` is the "none / invalid" sentinel.

use std::fmt;

/// Common behaviour of the handle newtypes
pub trait ResourceHandle: Copy + Eq + fmt::Debug {
    /// Table name used in log and error messages
    const KIND: &'static str;

    /// Handle for a table slot
    fn from_slot(slot: u32) -> Self;

    /// Table slot, `None` for the invalid sentinel
    fn slot(self) -> Option<u32>;
}

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(i32);

        impl $name {
            /// "No resource" sentinel
            pub const INVALID: Self = Self(-1);

            /// Whether this is anything but the sentinel
            ///
            /// A valid-looking handle can still be stale; the owning table
            /// has the final word.
            pub fn is_valid(self) -> bool {
                self.0 >= 0
            }

            /// Raw integer value (`-1` when invalid)
            pub fn raw(self) -> i32 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }

        impl ResourceHandle for $name {
            const KIND: &'static str = $kind;

            fn from_slot(slot: u32) -> Self {
                Self(slot as i32)
            }

            fn slot(self) -> Option<u32> {
                (self.0 >= 0).then_some(self.0 as u32)
            }
        }
    };
}

resource_handle!(
    /// Handle into the texture table (loaded images and render-target views)
    TextureId, "texture"
);
resource_handle!(
    /// Handle into the buffer object table (vertex + index buffer pairs)
    BufferId, "buffer"
);
resource_handle!(SamplerId, "sampler");
resource_handle!(RenderTargetId, "render_target");
resource_handle!(DepthTargetId, "depth_target");
resource_handle!(RasterizerStateId, "rasterizer_state");
resource_handle!(DepthStencilStateId, "depth_stencil_state");
resource_handle!(
    /// Handle into the shader table
    ShaderId, "shader"
);

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
