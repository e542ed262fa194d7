/// Texture and sampler traits with their descriptors

use std::any::Any;
use bitflags::bitflags;
use super::pipeline::CompareOp;

/// Texel formats understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized (loaded images, back buffer)
    R8G8B8A8_UNORM,
    /// 16-bit float RGBA (HDR render targets)
    R16G16B16A16_FLOAT,
    /// 32-bit float RGBA (G-buffer normals)
    R32G32B32A32_FLOAT,
    /// 32-bit float depth
    D32_FLOAT,
    /// 24-bit depth + 8-bit stencil
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_UNORM => 4,
            TextureFormat::R16G16B16A16_FLOAT => 8,
            TextureFormat::R32G32B32A32_FLOAT => 16,
            TextureFormat::D32_FLOAT => 4,
            TextureFormat::D24_UNORM_S8_UINT => 4,
        }
    }

    /// Whether this is a depth(/stencil) format
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT)
    }
}

bitflags! {
    /// How a texture may be bound
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Readable from shaders (shader resource view)
        const SAMPLED = 1 << 0;
        /// Writable as a color render target
        const RENDER_TARGET = 1 << 1;
        /// Writable as a depth/stencil target
        const DEPTH_STENCIL = 1 << 2;
    }
}

/// Descriptor for creating a 2D texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub mip_levels: u32,
}

impl TextureDesc {
    /// Single-mip sampled texture
    pub fn sampled(width: u32, height: u32, format: TextureFormat) -> Self {
        Self { width, height, format, usage: TextureUsage::SAMPLED, mip_levels: 1 }
    }

    /// Color render target that can be sampled by later passes
    pub fn render_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET,
            mip_levels: 1,
        }
    }

    /// Depth target that can be sampled by later passes
    pub fn depth_target(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsage::SAMPLED | TextureUsage::DEPTH_STENCIL,
            mip_levels: 1,
        }
    }

    /// Bytes needed for the top mip level
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// Texture resource trait
pub trait Texture: Send + Sync {
    /// Creation descriptor
    fn desc(&self) -> &TextureDesc;

    fn as_any(&self) -> &dyn Any;
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Point,
    Linear,
    Anisotropic,
}

/// Texture coordinate addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Clamp,
    Mirror,
    Border,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_mode: AddressMode,
    pub max_anisotropy: u32,
    /// Comparison sampler (shadow map lookups)
    pub compare: Option<CompareOp>,
}

impl SamplerDesc {
    pub fn new(filter: Filter, address_mode: AddressMode) -> Self {
        Self { filter, address_mode, max_anisotropy: 1, compare: None }
    }
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {
    fn desc(&self) -> &SamplerDesc;

    fn as_any(&self) -> &dyn Any;
}
