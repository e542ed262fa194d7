/// Sampler - Vulkan implementation of the Sampler trait
///
/// The renderer already shares samplers by descriptor, so each
/// `SamplerDesc` it asks for maps to exactly one `VkSampler`.

use ash::vk;
use prism_3d_engine::prism3d::device::{Sampler, SamplerDesc};
use prism_3d_engine::prism3d::Result;
use prism_3d_engine::engine_err;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{address_mode_to_vk, compare_op_to_vk, filter_to_vk};

pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    desc: SamplerDesc,
    pub(crate) sampler: vk::Sampler,
}

impl VulkanSampler {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: SamplerDesc) -> Result<Self> {
        let create_info = sampler_create_info(&desc, ctx.max_anisotropy);
        let sampler = unsafe {
            ctx.device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create sampler {:?}: {:?}", desc, e))?
        };
        Ok(Self { ctx, desc, sampler })
    }
}

/// Create info for `desc`, anisotropy clamped to `device_max_anisotropy`
pub(crate) fn sampler_create_info(desc: &SamplerDesc, device_max_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    let (filter, mipmap_mode, anisotropic) = filter_to_vk(desc.filter);
    let address = address_mode_to_vk(desc.address_mode);
    let anisotropy = (desc.max_anisotropy.max(1) as f32).min(device_max_anisotropy);

    // Outside a shadow map counts as lit
    let border = if desc.compare.is_some() {
        vk::BorderColor::FLOAT_OPAQUE_WHITE
    } else {
        vk::BorderColor::FLOAT_OPAQUE_BLACK
    };

    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(mipmap_mode)
        .address_mode_u(address)
        .address_mode_v(address)
        .address_mode_w(address)
        .min_lod(0.0)
        .max_lod(vk::LOD_CLAMP_NONE)
        .border_color(border)
        .anisotropy_enable(anisotropic && anisotropy > 1.0)
        .max_anisotropy(if anisotropic { anisotropy } else { 1.0 });

    match desc.compare {
        Some(op) => create_info.compare_enable(true).compare_op(compare_op_to_vk(op)),
        None => create_info.compare_enable(false).compare_op(vk::CompareOp::ALWAYS),
    }
}

impl Sampler for VulkanSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_sampler_tests.rs"]
mod tests;
