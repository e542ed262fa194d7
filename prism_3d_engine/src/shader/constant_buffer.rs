/// CPU-mirrored constant buffers
///
/// Each reflected uniform block gets one `ConstantBuffer`: a CPU byte
/// array per field, the GPU buffer they are flushed into, and a dirty
/// flag. The flag is raised only when a write actually changes bytes and
/// is cleared by `flush`, which performs the single upload.

use std::sync::Arc;
use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::Buffer;
use super::reflection::CBufferLayout;

const SOURCE: &str = "prism3d::ConstantBuffer";

/// CPU copy of one field
#[derive(Debug, Clone, PartialEq)]
pub struct CpuConstant {
    name: String,
    offset: u32,
    data: Vec<u8>,
}

impl CpuConstant {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset inside the GPU buffer
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Slot size in bytes (field plus trailing padding)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

pub struct ConstantBuffer {
    layout: CBufferLayout,
    constants: Vec<CpuConstant>,
    gpu: Arc<dyn Buffer>,
    dirty: bool,
}

impl ConstantBuffer {
    /// Zero-initialised mirror for `layout`, flushed into `gpu`
    ///
    /// The GPU buffer must start zero-filled and be exactly `layout.size`
    /// bytes, so a fresh buffer is clean.
    pub fn new(layout: CBufferLayout, gpu: Arc<dyn Buffer>) -> Result<Self> {
        if gpu.desc().size != layout.size as u64 {
            engine_bail!(SOURCE, "Constant buffer '{}' is {} bytes, GPU buffer is {}",
                layout.name, layout.size, gpu.desc().size);
        }
        let constants = layout
            .fields
            .iter()
            .map(|field| CpuConstant {
                name: field.name.clone(),
                offset: field.offset,
                data: vec![0; field.size as usize],
            })
            .collect();
        Ok(Self { layout, constants, gpu, dirty: false })
    }

    pub fn layout(&self) -> &CBufferLayout {
        &self.layout
    }

    pub fn constants(&self) -> &[CpuConstant] {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&CpuConstant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn gpu_buffer(&self) -> &Arc<dyn Buffer> {
        &self.gpu
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force the next flush to upload
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Write `bytes` into the named field
    ///
    /// Returns `Ok(None)` when the buffer has no such field, `Ok(Some(changed))`
    /// otherwise. Values shorter than the slot leave the rest untouched;
    /// longer values are rejected.
    pub fn write(&mut self, name: &str, bytes: &[u8]) -> Result<Option<bool>> {
        let Some(constant) = self.constants.iter_mut().find(|c| c.name == name) else {
            return Ok(None);
        };
        if bytes.len() > constant.data.len() {
            engine_bail!(SOURCE, "Value for '{}' is {} bytes, its slot in '{}' holds {}",
                name, bytes.len(), self.layout.name, constant.data.len());
        }
        let target = &mut constant.data[..bytes.len()];
        if target == bytes {
            return Ok(Some(false));
        }
        target.copy_from_slice(bytes);
        self.dirty = true;
        Ok(Some(true))
    }

    /// CPU mirror laid out as the GPU expects it
    pub fn contents(&self) -> Vec<u8> {
        let mut contents = Vec::with_capacity(self.layout.size as usize);
        for constant in &self.constants {
            contents.extend_from_slice(&constant.data);
        }
        contents
    }

    /// Upload the mirror if dirty; returns whether an upload happened
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.gpu.update(0, &self.contents())?;
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "constant_buffer_tests.rs"]
mod tests;
