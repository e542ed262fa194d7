/// Texture - Vulkan implementation of the Texture trait
///
/// Optimal-tiling image in device memory. The layout the image was last
/// left in is tracked on the texture itself; the command list reads it to
/// emit transitions when a texture switches between attachment, sampled
/// and transfer use.

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use prism_3d_engine::prism3d::device::{Texture, TextureDesc, TextureUsage};
use prism_3d_engine::prism3d::Result;
use prism_3d_engine::{engine_bail, engine_err};
use std::any::Any;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{format_aspects, sampled_aspect, texture_format_to_vk, texture_usage_to_vk};

pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    desc: TextureDesc,
    pub(crate) image: vk::Image,
    pub(crate) format: vk::Format,
    /// View read by shaders (depth aspect only for depth/stencil)
    pub(crate) view: vk::ImageView,
    /// View bound as an attachment; equal to `view` for color and D32
    pub(crate) attachment_view: vk::ImageView,
    allocation: Option<Allocation>,
    layout: AtomicI32,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: TextureDesc, data: Option<&[u8]>) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!(SOURCE, "Texture size must be non-zero ({}x{})", desc.width, desc.height);
        }
        let mip_levels = desc.mip_levels.max(1);
        let format = texture_format_to_vk(desc.format);

        let image = unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(mip_levels)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage, mip_levels))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            ctx.device.create_image(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {}x{} {:?} image: {:?}", desc.width, desc.height, desc.format, e))?
        };

        // From here on Drop releases whatever has been created
        let mut texture = Self {
            ctx: Arc::clone(&ctx),
            desc: TextureDesc { mip_levels, ..desc },
            image,
            format,
            view: vk::ImageView::null(),
            attachment_view: vk::ImageView::null(),
            allocation: None,
            layout: AtomicI32::new(vk::ImageLayout::UNDEFINED.as_raw()),
        };

        unsafe {
            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx.allocate("texture", requirements, MemoryLocation::GpuOnly, false)?;
            let bound = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset());
            texture.allocation = Some(allocation);
            bound.map_err(|e| engine_err!(SOURCE, "Failed to bind texture memory: {:?}", e))?;

            texture.view = texture.create_view(sampled_aspect(desc.format))?;
            texture.attachment_view = if format_aspects(desc.format) == sampled_aspect(desc.format) {
                texture.view
            } else {
                texture.create_view(format_aspects(desc.format))?
            };
        }

        if let Some(data) = data {
            texture.upload(data)?;
        }
        Ok(texture)
    }

    unsafe fn create_view(&self, aspect_mask: vk::ImageAspectFlags) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: self.desc.mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });
        self.ctx.device.create_image_view(&create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create texture image view: {:?}", e))
    }

    pub(crate) fn layout(&self) -> vk::ImageLayout {
        vk::ImageLayout::from_raw(self.layout.load(Ordering::Relaxed))
    }

    pub(crate) fn set_layout(&self, layout: vk::ImageLayout) {
        self.layout.store(layout.as_raw(), Ordering::Relaxed);
    }

    pub(crate) fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: format_aspects(self.desc.format),
            base_mip_level: 0,
            level_count: self.desc.mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        }
    }

    /// Copy top-mip texels through a staging buffer, then generate the
    /// remaining mips by successive blits
    fn upload(&self, data: &[u8]) -> Result<()> {
        if !self.desc.usage.contains(TextureUsage::SAMPLED) || self.desc.format.is_depth() {
            engine_bail!(SOURCE, "Initial data is only accepted for sampled color textures");
        }
        let expected = self.desc.byte_size();
        if data.len() as u64 != expected {
            engine_bail!(SOURCE, "Texture data is {} bytes, expected {}", data.len(), expected);
        }

        let (staging, mut staging_allocation) = self.ctx.create_buffer(
            "texture staging",
            expected,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
        )?;
        let result = match staging_allocation.mapped_slice_mut() {
            Some(mapped) => {
                mapped[..data.len()].copy_from_slice(data);
                self.ctx.submit_one_shot(|cb| unsafe { self.record_upload(cb, staging) })
            }
            None => Err(engine_err!(SOURCE, "Staging buffer is not mapped")),
        };

        self.ctx.free(staging_allocation);
        unsafe { self.ctx.device.destroy_buffer(staging, None) };
        result?;
        self.set_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        Ok(())
    }

    unsafe fn record_upload(&self, cb: vk::CommandBuffer, staging: vk::Buffer) {
        let device = &self.ctx.device;
        let mip_levels = self.desc.mip_levels;
        let mip_range = |level: u32| vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let mip_layers = |level: u32| vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: level,
            base_array_layer: 0,
            layer_count: 1,
        };
        let barrier = |range, old, new, src_access, dst_access| {
            vk::ImageMemoryBarrier::default()
                .old_layout(old)
                .new_layout(new)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(range)
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
        };

        let to_transfer = barrier(
            self.full_range(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        );
        device.cmd_pipeline_barrier(
            cb,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[], &[], &[to_transfer],
        );

        let region = vk::BufferImageCopy::default()
            .image_subresource(mip_layers(0))
            .image_extent(vk::Extent3D { width: self.desc.width, height: self.desc.height, depth: 1 });
        device.cmd_copy_buffer_to_image(cb, staging, self.image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);

        for level in 1..mip_levels {
            let source = level - 1;
            let to_source = barrier(
                mip_range(source),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            );
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[], &[], &[to_source],
            );

            let extent = |mip: u32| vk::Offset3D {
                x: (self.desc.width >> mip).max(1) as i32,
                y: (self.desc.height >> mip).max(1) as i32,
                z: 1,
            };
            let blit = vk::ImageBlit::default()
                .src_subresource(mip_layers(source))
                .src_offsets([vk::Offset3D::default(), extent(source)])
                .dst_subresource(mip_layers(level))
                .dst_offsets([vk::Offset3D::default(), extent(level)]);
            device.cmd_blit_image(
                cb,
                self.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );

            let done = barrier(
                mip_range(source),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::SHADER_READ,
            );
            device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[], &[], &[done],
            );
        }

        let last = barrier(
            mip_range(mip_levels - 1),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
        );
        device.cmd_pipeline_barrier(
            cb,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[], &[], &[last],
        );
    }
}

impl Texture for VulkanTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.attachment_view != self.view {
                self.ctx.device.destroy_image_view(self.attachment_view, None);
            }
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
