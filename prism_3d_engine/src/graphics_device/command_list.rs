/// CommandList trait - the immediate rendering context

use std::sync::Arc;
use crate::error::Result;
use super::{
    Buffer, Texture, Sampler, ShaderModule, ShaderStage, IndexType,
    PrimitiveTopology, RasterizerDesc, DepthStencilDesc, VertexLayout,
};

/// Immediate-mode command interface
///
/// Every call takes effect in submission order. State set here persists
/// until it is overwritten; the renderer facade decides what to re-send.
pub trait CommandList: Send {
    /// Bind color targets (possibly none) and an optional depth target
    fn set_render_targets(
        &mut self,
        colors: &[Arc<dyn Texture>],
        depth: Option<&Arc<dyn Texture>>,
    ) -> Result<()>;

    /// Clear a color target
    fn clear_color(&mut self, target: &Arc<dyn Texture>, color: [f32; 4]) -> Result<()>;

    /// Clear a depth target
    fn clear_depth(&mut self, target: &Arc<dyn Texture>, depth: f32, stencil: u8) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<()>;

    fn set_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> Result<()>;

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()>;

    fn set_input_layout(&mut self, layout: &VertexLayout) -> Result<()>;

    /// Bind (or with `None` unbind) the program of one stage
    fn bind_shader(&mut self, stage: ShaderStage, module: Option<&Arc<dyn ShaderModule>>) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, stride: u32) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, index_type: IndexType) -> Result<()>;

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: &Arc<dyn Buffer>) -> Result<()>;

    /// Bind (or with `None` unbind) a shader resource view
    fn bind_texture(&mut self, stage: ShaderStage, slot: u32, texture: Option<&Arc<dyn Texture>>) -> Result<()>;

    fn bind_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: &Arc<dyn Sampler>) -> Result<()>;

    /// Draw indexed primitives from the bound index buffer
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()>;

    /// Draw non-indexed primitives
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Open a named debug region
    fn begin_event(&mut self, name: &str);

    /// Close the innermost debug region
    fn end_event(&mut self);
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with the [0, 1] depth range
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}
