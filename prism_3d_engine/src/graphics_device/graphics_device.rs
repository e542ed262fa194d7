/// GraphicsDevice trait - resource factory and frame presentation

use std::sync::Arc;
use crate::error::Result;
use super::{
    Buffer, BufferDesc, Texture, TextureDesc, Sampler, SamplerDesc,
    ShaderModule, ShaderStage, CommandList,
};

/// Backend device
///
/// Creates GPU resources, owns the immediate command list and the
/// swap chain. Implemented once per native API; `HeadlessDevice` is the
/// in-memory implementation.
pub trait GraphicsDevice: Send {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Create a buffer, optionally filled with `data`
    ///
    /// Immutable buffers must be created with data of exactly `desc.size` bytes.
    fn create_buffer(&mut self, desc: BufferDesc, data: Option<&[u8]>) -> Result<Arc<dyn Buffer>>;

    /// Create a 2D texture, optionally filled with top-mip texels
    fn create_texture(&mut self, desc: TextureDesc, data: Option<&[u8]>) -> Result<Arc<dyn Texture>>;

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a stage program from SPIR-V words
    fn create_shader_module(&mut self, stage: ShaderStage, spirv: &[u32]) -> Result<Arc<dyn ShaderModule>>;

    /// Immediate command list
    fn command_list(&mut self) -> &mut dyn CommandList;

    /// Current swap-chain image
    fn back_buffer(&self) -> Arc<dyn Texture>;

    /// Recreate the swap chain for a new window size
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Present the back buffer
    fn present(&mut self, vsync: bool) -> Result<()>;
}
