/// Colour and depth targets
///
/// A target owns its texture; when the texture is sampleable it is also
/// registered in the texture table so later passes can read it by handle.

use std::sync::Arc;
use crate::graphics_device::Texture;
use crate::resource::TextureId;

pub struct RenderTarget {
    pub(crate) texture: Arc<dyn Texture>,
    /// Sampling view, `INVALID` for the back buffer
    pub(crate) view: TextureId,
}

impl RenderTarget {
    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn view(&self) -> TextureId {
        self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.desc().width, self.texture.desc().height)
    }
}

pub struct DepthTarget {
    pub(crate) texture: Arc<dyn Texture>,
    pub(crate) view: TextureId,
}

impl DepthTarget {
    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn view(&self) -> TextureId {
        self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.desc().width, self.texture.desc().height)
    }
}
