//! Shader module
//!
//! WGSL stage sources are compiled to SPIR-V with naga, reflected with
//! spirq, and turned into a `Shader`: device stage modules, the vertex
//! layout, the texture/sampler slot tables, and one CPU-mirrored
//! `ConstantBuffer` per reflected uniform block.

pub mod compiler;
pub mod reflection;
pub mod constant_buffer;
pub mod shader;
pub mod watcher;

pub use compiler::compile_wgsl;
pub use reflection::{
    reflect_stage, StageReflection, SignatureParam, SignatureType, ScalarKind,
    CBufferLayout, CBufferField, ResourceSlot,
};
pub use constant_buffer::{ConstantBuffer, CpuConstant};
pub use shader::{Shader, ShaderDesc, ShaderState};
pub use watcher::ShaderWatcher;
