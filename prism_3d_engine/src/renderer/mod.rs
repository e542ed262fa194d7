//! Renderer façade
//!
//! Owns the device, every resource table and the draw state. Passes talk
//! to the GPU only through the "set, apply, draw" protocol of `Renderer`.

pub mod render_states;
pub mod render_stats;
pub mod buffer_object;
pub mod render_target;
pub mod renderer;

pub use render_states::{DefaultRasterizerState, DefaultDepthStencilState, DefaultSampler};
pub use render_stats::RenderStats;
pub use buffer_object::BufferObject;
pub use render_target::{RenderTarget, DepthTarget};
pub use renderer::{Renderer, RendererConfig, DrawState};
