/// Buffer - Vulkan implementation of the Buffer trait
///
/// Immutable buffers are written once at creation. Dynamic buffers are
/// rewritten between draws of the same frame (constant buffers above
/// all), while the GPU only reads them once the frame is submitted: their
/// contents live in a CPU shadow copy and each version that a draw
/// actually uses is copied into the frame's upload ring.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use prism_3d_engine::prism3d::device::{Buffer, BufferDesc, BufferUsage};
use prism_3d_engine::prism3d::Result;
use prism_3d_engine::{engine_bail, engine_err};
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::buffer_kind_to_vk;

// ============================================================================
// UPLOAD RING
// ============================================================================

const RING_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

struct RingChunk {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    capacity: u64,
    head: u64,
}

/// Linear host-visible memory for one frame in flight
///
/// Reset once the frame's fence has signalled; grows by whole chunks
/// when a frame needs more than it has.
pub(crate) struct UploadRing {
    ctx: Arc<GpuContext>,
    chunks: Vec<RingChunk>,
    current: usize,
    /// Frame counter value the ring's contents belong to
    serial: u64,
}

impl UploadRing {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx, chunks: Vec::new(), current: 0, serial: 0 }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Start a new frame; earlier contents may be overwritten
    pub fn reset(&mut self, serial: u64) {
        for chunk in &mut self.chunks {
            chunk.head = 0;
        }
        self.current = 0;
        self.serial = serial;
    }

    /// Copy `data` into the ring; returns the buffer and offset holding it
    pub fn push(&mut self, data: &[u8]) -> Result<(vk::Buffer, u64)> {
        let alignment = self.ctx.uniform_alignment;
        let size = data.len() as u64;

        loop {
            if self.current == self.chunks.len() {
                let capacity = RING_CHUNK_SIZE.max(size.next_power_of_two());
                let usage = vk::BufferUsageFlags::UNIFORM_BUFFER
                    | vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::INDEX_BUFFER;
                let (buffer, allocation) =
                    self.ctx.create_buffer("upload ring", capacity, usage, MemoryLocation::CpuToGpu)?;
                self.chunks.push(RingChunk { buffer, allocation: Some(allocation), capacity, head: 0 });
            }

            let chunk = &mut self.chunks[self.current];
            let offset = align_up(chunk.head, alignment);
            if offset + size > chunk.capacity {
                self.current += 1;
                continue;
            }

            let mapped = chunk.allocation
                .as_mut()
                .and_then(|allocation| allocation.mapped_slice_mut())
                .ok_or_else(|| engine_err!(SOURCE, "Upload ring memory is not mapped"))?;
            mapped[offset as usize..(offset + size) as usize].copy_from_slice(data);
            chunk.head = offset + size;
            return Ok((chunk.buffer, offset));
        }
    }
}

impl Drop for UploadRing {
    fn drop(&mut self) {
        for chunk in &mut self.chunks {
            if let Some(allocation) = chunk.allocation.take() {
                self.ctx.free(allocation);
            }
            unsafe {
                self.ctx.device.destroy_buffer(chunk.buffer, None);
            }
        }
    }
}

pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

// ============================================================================
// BUFFER
// ============================================================================

struct DynamicContents {
    shadow: Vec<u8>,
    version: u64,
    /// Where the current version sits: (ring serial, version, buffer, offset)
    uploaded: Option<(u64, u64, vk::Buffer, u64)>,
}

enum Storage {
    Device {
        buffer: vk::Buffer,
        allocation: Option<Allocation>,
    },
    Dynamic(Mutex<DynamicContents>),
}

pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    desc: BufferDesc,
    storage: Storage,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: BufferDesc, data: Option<&[u8]>) -> Result<Self> {
        if let Some(data) = data {
            if data.len() as u64 > desc.size {
                engine_bail!(SOURCE, "{} bytes of data for a {}-byte buffer", data.len(), desc.size);
            }
        }

        let storage = match desc.usage {
            BufferUsage::Immutable => {
                let data = match data {
                    Some(data) if data.len() as u64 == desc.size => data,
                    _ => engine_bail!(SOURCE, "Immutable {:?} buffer created without {} bytes of data", desc.kind, desc.size),
                };
                let (buffer, mut allocation) = ctx.create_buffer(
                    "immutable",
                    desc.size,
                    buffer_kind_to_vk(desc.kind),
                    MemoryLocation::CpuToGpu,
                )?;
                match allocation.mapped_slice_mut() {
                    Some(mapped) => mapped[..data.len()].copy_from_slice(data),
                    None => {
                        ctx.free(allocation);
                        unsafe { ctx.device.destroy_buffer(buffer, None) };
                        engine_bail!(SOURCE, "Buffer memory is not CPU-accessible");
                    }
                }
                Storage::Device { buffer, allocation: Some(allocation) }
            }
            BufferUsage::Dynamic => {
                let mut shadow = vec![0u8; desc.size as usize];
                if let Some(data) = data {
                    shadow[..data.len()].copy_from_slice(data);
                }
                Storage::Dynamic(Mutex::new(DynamicContents { shadow, version: 0, uploaded: None }))
            }
        };

        Ok(Self { ctx, desc, storage })
    }

    /// Buffer and offset holding the current contents for this frame
    ///
    /// Dynamic contents are copied into `ring` the first time each version
    /// is used in the ring's frame.
    pub(crate) fn resolve(&self, ring: &mut UploadRing) -> Result<(vk::Buffer, u64)> {
        match &self.storage {
            Storage::Device { buffer, .. } => Ok((*buffer, 0)),
            Storage::Dynamic(contents) => {
                let mut contents = contents
                    .lock()
                    .map_err(|_| engine_err!(SOURCE, "Buffer contents lock poisoned"))?;
                if let Some((serial, version, buffer, offset)) = contents.uploaded {
                    if serial == ring.serial() && version == contents.version {
                        return Ok((buffer, offset));
                    }
                }
                let (buffer, offset) = ring.push(&contents.shadow)?;
                contents.uploaded = Some((ring.serial(), contents.version, buffer, offset));
                Ok((buffer, offset))
            }
        }
    }
}

impl Buffer for VulkanBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let contents = match &self.storage {
            Storage::Device { .. } => engine_bail!(SOURCE, "Cannot update an immutable {:?} buffer", self.desc.kind),
            Storage::Dynamic(contents) => contents,
        };
        let end = offset + data.len() as u64;
        if end > self.desc.size {
            engine_bail!(SOURCE, "Buffer update out of range ({} > {} bytes)", end, self.desc.size);
        }
        let mut contents = contents
            .lock()
            .map_err(|_| engine_err!(SOURCE, "Buffer contents lock poisoned"))?;
        contents.shadow[offset as usize..end as usize].copy_from_slice(data);
        contents.version += 1;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Storage::Device { buffer, allocation } = &mut self.storage {
            if let Some(allocation) = allocation.take() {
                self.ctx.free(allocation);
            }
            unsafe {
                self.ctx.device.destroy_buffer(*buffer, None);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;
