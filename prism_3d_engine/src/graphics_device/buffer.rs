/// Buffer trait and buffer descriptor

use std::any::Any;
use crate::error::Result;

/// What the buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Constant (uniform) buffer
    Constant,
}

/// CPU access policy
///
/// A buffer is either immutable (contents fixed at creation) or
/// CPU-writable through `Buffer::update`, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Contents fixed at creation
    Immutable,
    /// Rewritten by the CPU (map / copy / unmap)
    Dynamic,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Binding kind
    pub kind: BufferKind,
    /// CPU access policy
    pub usage: BufferUsage,
}

impl BufferDesc {
    /// Dynamic constant buffer of `size` bytes
    pub fn constant(size: u64) -> Self {
        Self { size, kind: BufferKind::Constant, usage: BufferUsage::Dynamic }
    }
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types.
/// The buffer is destroyed when the last reference is dropped.
pub trait Buffer: Send + Sync {
    /// Creation descriptor
    fn desc(&self) -> &BufferDesc;

    /// Map the buffer, copy `data` at `offset`, unmap
    ///
    /// Fails on immutable buffers and out-of-range writes.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Concrete type access for the backend that created the buffer
    fn as_any(&self) -> &dyn Any;
}
