/// Per-frame counters of the renderer, reset by `Renderer::begin_frame`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub indices: u64,
    pub vertices: u64,
    /// Constant buffers actually uploaded by `apply`
    pub cbuffer_uploads: u32,
    pub shader_binds: u32,
    pub texture_binds: u32,
}

impl RenderStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
