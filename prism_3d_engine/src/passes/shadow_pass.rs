/// Shadow depth pass
///
/// Renders the Z-pass objects from the shadow-casting light into a square
/// depth-only target. Only the first casting light of the frame is used.

use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::Viewport;
use crate::renderer::{DefaultDepthStencilState, DefaultRasterizerState, Renderer};
use crate::resource::{DepthTargetId, TextureId};
use super::shader_library::ShaderLibrary;
use super::FrameContext;

const SOURCE: &str = "prism3d::ShadowPass";

pub struct ShadowPass {
    depth_target: DepthTargetId,
    dimension: u32,
}

impl ShadowPass {
    pub fn new(renderer: &mut Renderer, dimension: u32) -> Result<Self> {
        let depth_target = create_target(renderer, dimension)?;
        Ok(Self { depth_target, dimension })
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn depth_target(&self) -> DepthTargetId {
        self.depth_target
    }

    /// Depth texture sampled by the lighting shaders
    pub fn shadow_map(&self, renderer: &Renderer) -> TextureId {
        renderer.depth_target_texture(self.depth_target)
    }

    /// Recreate the target when the shadow map size setting changes
    pub fn set_dimension(&mut self, renderer: &mut Renderer, dimension: u32) -> Result<()> {
        if dimension == self.dimension {
            return Ok(());
        }
        let depth_target = create_target(renderer, dimension)?;
        renderer.destroy_depth_target(self.depth_target);
        self.depth_target = depth_target;
        self.dimension = dimension;
        Ok(())
    }

    /// Clear the shadow map and draw the casters; returns the number of draws
    ///
    /// Without a casting light the map is only cleared.
    pub fn render(&self, renderer: &mut Renderer, shaders: &ShaderLibrary, frame: &FrameContext) -> Result<usize> {
        renderer.begin_event("Shadow map");
        renderer.bind_render_targets(&[], self.depth_target)?;
        renderer.clear_depth_target(self.depth_target, 1.0)?;

        let Some(caster) = frame.lighting.shadow_caster else {
            renderer.end_event();
            return Ok(0);
        };

        renderer.set_shader(shaders.shadow_depth)?;
        let cull_front = renderer.default_rasterizer_state(DefaultRasterizerState::CullFront);
        renderer.set_rasterizer_state(cull_front)?;
        let depth_write = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthWrite);
        renderer.set_depth_stencil_state(depth_write)?;
        renderer.set_viewport(Viewport::from_size(self.dimension, self.dimension));
        renderer.set_constant("light_space_matrix", &caster.light_space_matrix);

        let mut draws = 0;
        for request in frame.scene.z_pass_objects() {
            let buffer = request.mesh.resolve(renderer);
            if !buffer.is_valid() {
                continue;
            }
            renderer.set_buffer_obj(buffer)?;
            renderer.set_constant("world", &request.world);
            renderer.apply()?;
            renderer.draw_indexed()?;
            draws += 1;
        }

        renderer.reset()?;
        renderer.end_event();
        Ok(draws)
    }
}

fn create_target(renderer: &mut Renderer, dimension: u32) -> Result<DepthTargetId> {
    let target = renderer.create_depth_target(dimension, dimension);
    if !target.is_valid() {
        let message = format!("cannot create the {0}x{0} shadow map", dimension);
        engine_error!(SOURCE, "{}", message);
        return Err(Error::InitializationFailed(message));
    }
    Ok(target)
}

#[cfg(test)]
#[path = "shadow_pass_tests.rs"]
mod tests;
