/// CommandList - Vulkan implementation of the immediate command list
///
/// The engine drives an immediate, D3D11-style context: state calls
/// change a CPU-side copy and take effect at the next draw. Each draw
///
/// 1. moves the textures its shaders read to `SHADER_READ_ONLY_OPTIMAL`,
/// 2. opens a dynamic-rendering instance on the bound targets if none is
///    open (transitions happen outside rendering),
/// 3. binds the cached pipeline for the current state,
/// 4. writes a fresh descriptor set from the bound resources, falling
///    back to a white texture, a default sampler or zeroed constants for
///    slots the shaders read but nothing was bound to.
///
/// Command buffers, descriptor pools and upload memory exist once per
/// frame in flight and are recycled after the frame's fence signals.
/// Every resource a frame references is kept alive until then.

use ash::vk;
use prism_3d_engine::prism3d::device::{
    Buffer, BufferDesc, BufferKind, BufferUsage, CommandList, CompareOp, CullMode,
    DepthStencilDesc, FillMode, Filter, AddressMode, IndexType, PrimitiveTopology,
    RasterizerDesc, Sampler, SamplerDesc, ShaderModule, ShaderStage, Texture, TextureDesc,
    TextureFormat, TextureUsage, VertexLayout, Viewport,
};
use prism_3d_engine::prism3d::{Error, Result};
use prism_3d_engine::{engine_bail, engine_err, engine_error};
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_buffer::{UploadRing, VulkanBuffer};
use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_format::{format_aspects, index_type_to_vk};
use crate::vulkan_pipeline::{PipelineCache, PipelineKey};
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_shader::{stage_index, ResourceKind, VulkanShaderModule, SLOTS_PER_KIND};
use crate::vulkan_texture::VulkanTexture;

pub(crate) const FRAMES_IN_FLIGHT: usize = 2;

const SETS_PER_POOL: u32 = 256;
/// Zeroed constants bound to unbound slots; the guaranteed minimum of
/// `maxUniformBufferRange`
const FALLBACK_CONSTANTS_SIZE: u64 = 16 * 1024;

// ============================================================================
// DOWNCASTS
// ============================================================================

pub(crate) fn vk_texture(texture: &Arc<dyn Texture>) -> Result<&VulkanTexture> {
    texture
        .as_any()
        .downcast_ref::<VulkanTexture>()
        .ok_or_else(|| engine_err!(SOURCE, "Texture was not created by the Vulkan device"))
}

fn vk_buffer(buffer: &Arc<dyn Buffer>) -> Result<&VulkanBuffer> {
    buffer
        .as_any()
        .downcast_ref::<VulkanBuffer>()
        .ok_or_else(|| engine_err!(SOURCE, "Buffer was not created by the Vulkan device"))
}

fn vk_sampler(sampler: &Arc<dyn Sampler>) -> Result<&VulkanSampler> {
    sampler
        .as_any()
        .downcast_ref::<VulkanSampler>()
        .ok_or_else(|| engine_err!(SOURCE, "Sampler was not created by the Vulkan device"))
}

fn vk_shader(module: &Arc<dyn ShaderModule>) -> Result<&VulkanShaderModule> {
    module
        .as_any()
        .downcast_ref::<VulkanShaderModule>()
        .ok_or_else(|| engine_err!(SOURCE, "Shader module was not created by the Vulkan device"))
}

/// Viewport with negative height: y-up clip space onto the y-down framebuffer
pub(crate) fn flipped_viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y + viewport.height,
        width: viewport.width,
        height: -viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let per_set = 2 * SLOTS_PER_KIND;
    let pool_sizes = [
        vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: per_set * SETS_PER_POOL },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLED_IMAGE, descriptor_count: per_set * SETS_PER_POOL },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLER, descriptor_count: per_set * SETS_PER_POOL },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(SETS_PER_POOL);
    unsafe {
        device.create_descriptor_pool(&info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))
    }
}

// ============================================================================
// PER-FRAME RESOURCES
// ============================================================================

#[derive(Default)]
struct InUse {
    textures: Vec<Arc<dyn Texture>>,
    buffers: Vec<Arc<dyn Buffer>>,
    samplers: Vec<Arc<dyn Sampler>>,
}

impl InUse {
    fn clear(&mut self) {
        self.textures.clear();
        self.buffers.clear();
        self.samplers.clear();
    }
}

struct FrameResources {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    descriptor_pools: Vec<vk::DescriptorPool>,
    pool_index: usize,
    uploads: UploadRing,
    in_use: InUse,
}

impl FrameResources {
    fn new(ctx: &Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let command_pool = ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create frame command pool: {:?}", e))?;

            let mut frame = Self {
                command_pool,
                command_buffer: vk::CommandBuffer::null(),
                fence: vk::Fence::null(),
                descriptor_pools: Vec::new(),
                pool_index: 0,
                uploads: UploadRing::new(Arc::clone(ctx)),
                in_use: InUse::default(),
            };

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => frame.command_buffer = buffers[0],
                Err(e) => {
                    frame.destroy(&ctx.device);
                    engine_bail!(SOURCE, "Failed to allocate frame command buffer: {:?}", e);
                }
            }

            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            match ctx.device.create_fence(&fence_info, None) {
                Ok(fence) => frame.fence = fence,
                Err(e) => {
                    frame.destroy(&ctx.device);
                    engine_bail!(SOURCE, "Failed to create frame fence: {:?}", e);
                }
            }
            Ok(frame)
        }
    }

    /// Raw handles only; the upload ring releases its memory on drop
    unsafe fn destroy(&mut self, device: &ash::Device) {
        for pool in self.descriptor_pools.drain(..) {
            device.destroy_descriptor_pool(pool, None);
        }
        device.destroy_fence(self.fence, None);
        device.destroy_command_pool(self.command_pool, None);
        self.fence = vk::Fence::null();
        self.command_pool = vk::CommandPool::null();
    }
}

// ============================================================================
// BOUND STATE
// ============================================================================

struct StageResources {
    constants: [Option<Arc<dyn Buffer>>; SLOTS_PER_KIND as usize],
    textures: [Option<Arc<dyn Texture>>; SLOTS_PER_KIND as usize],
    samplers: [Option<Arc<dyn Sampler>>; SLOTS_PER_KIND as usize],
}

impl Default for StageResources {
    fn default() -> Self {
        Self {
            constants: std::array::from_fn(|_| None),
            textures: std::array::from_fn(|_| None),
            samplers: std::array::from_fn(|_| None),
        }
    }
}

fn check_slot(slot: u32, what: &str) -> Result<usize> {
    if slot >= SLOTS_PER_KIND {
        engine_bail!(SOURCE, "{} slot {} out of range (max {})", what, slot, SLOTS_PER_KIND - 1);
    }
    Ok(slot as usize)
}

struct Fallbacks {
    texture: Arc<dyn Texture>,
    sampler: Arc<dyn Sampler>,
    constants: Arc<dyn Buffer>,
}

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    pipelines: PipelineCache,
    frames: Vec<FrameResources>,
    frame: usize,
    serial: u64,
    recording: bool,
    fallbacks: Fallbacks,

    colors: Vec<Arc<dyn Texture>>,
    depth: Option<Arc<dyn Texture>>,
    rendering: Option<vk::Extent2D>,
    viewport: Viewport,
    rasterizer: RasterizerDesc,
    depth_stencil: DepthStencilDesc,
    topology: PrimitiveTopology,
    input_layout: VertexLayout,
    shaders: [Option<Arc<dyn ShaderModule>>; 2],
    vertex_buffer: Option<(Arc<dyn Buffer>, u32)>,
    index_buffer: Option<(Arc<dyn Buffer>, IndexType)>,
    stages: [StageResources; 2],
    bound_pipeline: vk::Pipeline,
    event_depth: u32,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pipelines = PipelineCache::new(Arc::clone(&ctx))?;

        let mut frames: Vec<FrameResources> = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for _ in 0..FRAMES_IN_FLIGHT {
            match FrameResources::new(&ctx) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    for frame in &mut frames {
                        unsafe { frame.destroy(&ctx.device) };
                    }
                    return Err(e);
                }
            }
        }

        let texture = VulkanTexture::new(
            Arc::clone(&ctx),
            TextureDesc::sampled(1, 1, TextureFormat::R8G8B8A8_UNORM),
            Some(&[255u8; 4][..]),
        );
        let sampler = VulkanSampler::new(Arc::clone(&ctx), SamplerDesc::new(Filter::Linear, AddressMode::Wrap));
        let constants = VulkanBuffer::new(
            Arc::clone(&ctx),
            BufferDesc { size: FALLBACK_CONSTANTS_SIZE, kind: BufferKind::Constant, usage: BufferUsage::Immutable },
            Some(vec![0u8; FALLBACK_CONSTANTS_SIZE as usize].as_slice()),
        );
        let fallbacks = match (texture, sampler, constants) {
            (Ok(texture), Ok(sampler), Ok(constants)) => Fallbacks {
                texture: Arc::new(texture),
                sampler: Arc::new(sampler),
                constants: Arc::new(constants),
            },
            (texture, sampler, constants) => {
                for frame in &mut frames {
                    unsafe { frame.destroy(&ctx.device) };
                }
                let message = [texture.err(), sampler.err(), constants.err()]
                    .into_iter()
                    .flatten()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(Error::InitializationFailed(format!("Failed to create fallback resources: {}", message)));
            }
        };

        Ok(Self {
            ctx,
            pipelines,
            frames,
            // The first begin_frame moves to frame 0
            frame: FRAMES_IN_FLIGHT - 1,
            serial: 0,
            recording: false,
            fallbacks,
            colors: Vec::new(),
            depth: None,
            rendering: None,
            viewport: Viewport::from_size(1, 1),
            rasterizer: RasterizerDesc::new(CullMode::Back, FillMode::Solid, true),
            depth_stencil: DepthStencilDesc::new(true, true, CompareOp::Less),
            topology: PrimitiveTopology::TriangleList,
            input_layout: VertexLayout::default(),
            shaders: [None, None],
            vertex_buffer: None,
            index_buffer: None,
            stages: [StageResources::default(), StageResources::default()],
            bound_pipeline: vk::Pipeline::null(),
            event_depth: 0,
        })
    }

    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.frames[self.frame].command_buffer
    }

    pub(crate) fn frame_index(&self) -> usize {
        self.frame
    }

    pub(crate) fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    // ===== FRAME LIFECYCLE =====

    /// Move to the next frame in flight and start recording into it
    ///
    /// Waits until the GPU is done with that frame's previous use, then
    /// recycles its command buffer, descriptor sets and upload memory.
    pub(crate) fn begin_frame(&mut self) -> Result<()> {
        self.frame = (self.frame + 1) % FRAMES_IN_FLIGHT;
        self.serial += 1;
        let device = &self.ctx.device;
        let frame = &mut self.frames[self.frame];

        unsafe {
            device.wait_for_fences(&[frame.fence], true, u64::MAX)
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for frame fence: {:?}", e))?;

            frame.in_use.clear();
            for &pool in &frame.descriptor_pools {
                device.reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| engine_err!(SOURCE, "Failed to reset descriptor pool: {:?}", e))?;
            }
            frame.pool_index = 0;
            frame.uploads.reset(self.serial);

            device.reset_command_pool(frame.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset frame command pool: {:?}", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(frame.command_buffer, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin frame command buffer: {:?}", e))?;
        }

        self.recording = true;
        self.rendering = None;
        self.bound_pipeline = vk::Pipeline::null();
        Ok(())
    }

    /// Close the frame's command buffer and submit it
    ///
    /// `wait` / `signal` are the swap-chain semaphores when an image was
    /// acquired for this frame.
    pub(crate) fn submit(
        &mut self,
        wait: Option<vk::Semaphore>,
        signal: Option<vk::Semaphore>,
    ) -> Result<()> {
        if !self.recording {
            engine_bail!(SOURCE, "submit without a frame being recorded");
        }
        self.end_rendering();
        self.recording = false;

        let frame = &self.frames[self.frame];
        unsafe {
            self.ctx.device.end_command_buffer(frame.command_buffer)
                .map_err(|e| engine_err!(SOURCE, "Failed to end frame command buffer: {:?}", e))?;

            let command_buffers = [frame.command_buffer];
            let wait_semaphores: Vec<vk::Semaphore> = wait.into_iter().collect();
            let wait_stages = vec![vk::PipelineStageFlags::TRANSFER; wait_semaphores.len()];
            let signal_semaphores: Vec<vk::Semaphore> = signal.into_iter().collect();
            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            // Reset only now, so a failed frame never leaves an unsignalled fence behind
            self.ctx.device.reset_fences(&[frame.fence])
                .map_err(|e| engine_err!(SOURCE, "Failed to reset frame fence: {:?}", e))?;
            if let Err(e) = self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], frame.fence) {
                // Keep the fence waitable for the next use of this frame
                self.ctx.device.queue_submit(self.ctx.graphics_queue, &[], frame.fence).ok();
                engine_bail!(SOURCE, "Failed to submit frame: {:?}", e);
            }
            Ok(())
        }
    }

    // ===== LAYOUTS =====

    /// Close the open dynamic-rendering instance, if any
    pub(crate) fn end_rendering(&mut self) {
        if self.rendering.take().is_some() {
            unsafe { self.ctx.device.cmd_end_rendering(self.command_buffer()) };
        }
    }

    /// Move `texture` to `layout`, making all earlier writes visible
    ///
    /// Must be called outside a rendering instance.
    pub(crate) fn transition(&self, texture: &VulkanTexture, layout: vk::ImageLayout) {
        let old_layout = texture.layout();
        if old_layout == layout {
            return;
        }
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(texture.full_range())
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer(),
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[], &[], &[barrier],
            );
        }
        texture.set_layout(layout);
    }

    /// Order everything recorded so far before what follows
    fn memory_barrier(&self) {
        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer(),
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier], &[], &[],
            );
        }
    }

    fn check_recording(&self) -> Result<()> {
        if !self.recording {
            engine_bail!(SOURCE, "No frame is being recorded");
        }
        Ok(())
    }

    // ===== DRAW PREPARATION =====

    /// Open rendering on the bound targets unless already open
    fn ensure_rendering(&mut self) -> Result<vk::Extent2D> {
        if let Some(extent) = self.rendering {
            return Ok(extent);
        }
        if self.colors.is_empty() && self.depth.is_none() {
            engine_bail!(SOURCE, "Draw without render targets bound");
        }

        let colors = self.colors.clone();
        let depth = self.depth.clone();
        let mut extent = vk::Extent2D { width: u32::MAX, height: u32::MAX };
        let mut color_attachments = Vec::with_capacity(colors.len());
        for target in &colors {
            let texture = vk_texture(target)?;
            self.transition(texture, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
            extent.width = extent.width.min(texture.desc().width);
            extent.height = extent.height.min(texture.desc().height);
            color_attachments.push(
                vk::RenderingAttachmentInfo::default()
                    .image_view(texture.attachment_view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(vk::AttachmentLoadOp::LOAD)
                    .store_op(vk::AttachmentStoreOp::STORE),
            );
        }

        let mut depth_attachment = None;
        let mut has_stencil = false;
        if let Some(target) = &depth {
            let texture = vk_texture(target)?;
            self.transition(texture, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
            extent.width = extent.width.min(texture.desc().width);
            extent.height = extent.height.min(texture.desc().height);
            has_stencil = format_aspects(texture.desc().format).contains(vk::ImageAspectFlags::STENCIL);
            depth_attachment = Some(
                vk::RenderingAttachmentInfo::default()
                    .image_view(texture.attachment_view)
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(vk::AttachmentLoadOp::LOAD)
                    .store_op(vk::AttachmentStoreOp::STORE),
            );
        }

        // Loads must see the stores of earlier rendering instances
        self.memory_barrier();

        let render_area = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent };
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(attachment);
            if has_stencil {
                rendering_info = rendering_info.stencil_attachment(attachment);
            }
        }
        unsafe { self.ctx.device.cmd_begin_rendering(self.command_buffer(), &rendering_info) };

        let frame = &mut self.frames[self.frame];
        frame.in_use.textures.extend(colors);
        frame.in_use.textures.extend(depth);
        self.rendering = Some(extent);
        Ok(extent)
    }

    fn allocate_set(&mut self) -> Result<vk::DescriptorSet> {
        let set_layouts = [self.pipelines.set_layout];
        let frame = &mut self.frames[self.frame];
        loop {
            if frame.pool_index == frame.descriptor_pools.len() {
                frame.descriptor_pools.push(create_descriptor_pool(&self.ctx.device)?);
            }
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(frame.descriptor_pools[frame.pool_index])
                .set_layouts(&set_layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    frame.pool_index += 1;
                }
                Err(e) => engine_bail!(SOURCE, "Failed to allocate descriptor set: {:?}", e),
            }
        }
    }

    /// Everything a draw needs except the draw call itself
    fn prepare_draw(&mut self) -> Result<()> {
        self.check_recording()?;
        let vertex_shader = match &self.shaders[0] {
            Some(module) => Arc::clone(module),
            None => engine_bail!(SOURCE, "Draw without a vertex shader bound"),
        };
        let pixel_shader = self.shaders[1].clone();
        let (vertex_buffer, stride) = match &self.vertex_buffer {
            Some((buffer, stride)) => (Arc::clone(buffer), *stride),
            None => engine_bail!(SOURCE, "Draw without a vertex buffer bound"),
        };

        let mut modules = vec![(ShaderStage::Vertex, vk_shader(&vertex_shader)?)];
        if let Some(module) = &pixel_shader {
            modules.push((ShaderStage::Pixel, vk_shader(module)?));
        }

        // 1. Sampled textures leave attachment / transfer layouts
        let mut sampled: Vec<Arc<dyn Texture>> = Vec::new();
        for (stage, module) in &modules {
            let bound = &self.stages[stage_index(*stage)];
            for resource in module.resources.iter().filter(|r| r.kind == ResourceKind::Texture) {
                if let Some(texture) = &bound.textures[resource.slot as usize] {
                    sampled.push(Arc::clone(texture));
                }
            }
        }
        let mut pending = Vec::new();
        for texture in &sampled {
            let is_target = self.colors.iter().chain(self.depth.iter()).any(|t| Arc::ptr_eq(t, texture));
            if is_target {
                engine_bail!(SOURCE, "Texture bound both as render target and shader resource");
            }
            let texture = vk_texture(texture)?;
            if texture.layout() != vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL {
                pending.push(texture);
            }
        }
        if !pending.is_empty() {
            self.end_rendering();
            for texture in pending {
                self.transition(texture, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            }
        }

        // 2. Rendering instance
        let extent = self.ensure_rendering()?;
        let cb = self.command_buffer();

        // 3. Pipeline
        let color_formats = self
            .colors
            .iter()
            .map(|t| vk_texture(t).map(|t| t.format))
            .collect::<Result<Vec<_>>>()?;
        let depth_format = match &self.depth {
            Some(target) => vk_texture(target)?.format,
            None => vk::Format::UNDEFINED,
        };
        let pixel_module = modules.get(1).map(|(_, module)| *module);
        let mut key = PipelineKey::new(
            modules[0].1.id,
            pixel_module.map(|m| m.id),
            &self.input_layout,
            self.topology,
            &self.rasterizer,
            &self.depth_stencil,
            color_formats,
            depth_format,
            self.ctx.depth_clamp,
        );
        if stride != 0 {
            key.stride = stride;
        }
        let pipeline = self.pipelines.get_or_create(&key, modules[0].1.module, pixel_module.map(|m| m.module))?;
        unsafe {
            if pipeline != self.bound_pipeline {
                self.ctx.device.cmd_bind_pipeline(cb, vk::PipelineBindPoint::GRAPHICS, pipeline);
                self.bound_pipeline = pipeline;
            }
            self.ctx.device.cmd_set_viewport(cb, 0, &[flipped_viewport(&self.viewport)]);
            self.ctx.device.cmd_set_scissor(cb, 0, &[vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent }]);
        }

        // 4. Descriptors
        let set = self.allocate_set()?;
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        let mut entries = Vec::new();
        for (stage, module) in &modules {
            let index = stage_index(*stage);
            for resource in &module.resources {
                let slot = resource.slot as usize;
                match resource.kind {
                    ResourceKind::Constant => {
                        let buffer = self.stages[index].constants[slot]
                            .clone()
                            .unwrap_or_else(|| Arc::clone(&self.fallbacks.constants));
                        let (handle, offset) = vk_buffer(&buffer)?.resolve(&mut self.frames[self.frame].uploads)?;
                        buffer_infos.push(vk::DescriptorBufferInfo { buffer: handle, offset, range: buffer.desc().size });
                        entries.push((resource.binding, resource.kind, buffer_infos.len() - 1));
                        self.frames[self.frame].in_use.buffers.push(buffer);
                    }
                    ResourceKind::Texture => {
                        let texture = self.stages[index].textures[slot]
                            .clone()
                            .unwrap_or_else(|| Arc::clone(&self.fallbacks.texture));
                        image_infos.push(vk::DescriptorImageInfo {
                            sampler: vk::Sampler::null(),
                            image_view: vk_texture(&texture)?.view,
                            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        });
                        entries.push((resource.binding, resource.kind, image_infos.len() - 1));
                        self.frames[self.frame].in_use.textures.push(texture);
                    }
                    ResourceKind::Sampler => {
                        let sampler = self.stages[index].samplers[slot]
                            .clone()
                            .unwrap_or_else(|| Arc::clone(&self.fallbacks.sampler));
                        image_infos.push(vk::DescriptorImageInfo {
                            sampler: vk_sampler(&sampler)?.sampler,
                            image_view: vk::ImageView::null(),
                            image_layout: vk::ImageLayout::UNDEFINED,
                        });
                        entries.push((resource.binding, resource.kind, image_infos.len() - 1));
                        self.frames[self.frame].in_use.samplers.push(sampler);
                    }
                }
            }
        }
        let writes: Vec<vk::WriteDescriptorSet> = entries
            .iter()
            .map(|&(binding, kind, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(kind.descriptor_type());
                match kind {
                    ResourceKind::Constant => write.buffer_info(std::slice::from_ref(&buffer_infos[info])),
                    _ => write.image_info(std::slice::from_ref(&image_infos[info])),
                }
            })
            .collect();

        // 5. Vertex input
        let (vertex_handle, vertex_offset) = vk_buffer(&vertex_buffer)?.resolve(&mut self.frames[self.frame].uploads)?;
        unsafe {
            self.ctx.device.update_descriptor_sets(&writes, &[]);
            self.ctx.device.cmd_bind_descriptor_sets(
                cb,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipelines.layout,
                0,
                &[set],
                &[],
            );
            self.ctx.device.cmd_bind_vertex_buffers(cb, 0, &[vertex_handle], &[vertex_offset]);
        }

        self.frames[self.frame].in_use.buffers.push(vertex_buffer);
        Ok(())
    }
}

impl CommandList for VulkanCommandList {
    fn set_render_targets(
        &mut self,
        colors: &[Arc<dyn Texture>],
        depth: Option<&Arc<dyn Texture>>,
    ) -> Result<()> {
        for target in colors {
            if !target.desc().usage.contains(TextureUsage::RENDER_TARGET) {
                engine_bail!(SOURCE, "Texture bound as color target without RENDER_TARGET usage");
            }
        }
        if let Some(target) = depth {
            if !target.desc().usage.contains(TextureUsage::DEPTH_STENCIL) {
                engine_bail!(SOURCE, "Texture bound as depth target without DEPTH_STENCIL usage");
            }
        }
        self.end_rendering();
        self.colors = colors.to_vec();
        self.depth = depth.cloned();
        Ok(())
    }

    fn clear_color(&mut self, target: &Arc<dyn Texture>, color: [f32; 4]) -> Result<()> {
        self.check_recording()?;
        let texture = vk_texture(target)?;
        if texture.desc().format.is_depth() {
            engine_bail!(SOURCE, "clear_color on a depth texture");
        }
        self.end_rendering();
        self.transition(texture, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        unsafe {
            self.ctx.device.cmd_clear_color_image(
                self.command_buffer(),
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearColorValue { float32: color },
                &[texture.full_range()],
            );
        }
        self.frames[self.frame].in_use.textures.push(Arc::clone(target));
        Ok(())
    }

    fn clear_depth(&mut self, target: &Arc<dyn Texture>, depth: f32, stencil: u8) -> Result<()> {
        self.check_recording()?;
        let texture = vk_texture(target)?;
        if !texture.desc().format.is_depth() {
            engine_bail!(SOURCE, "clear_depth on a color texture");
        }
        self.end_rendering();
        self.transition(texture, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        unsafe {
            self.ctx.device.cmd_clear_depth_stencil_image(
                self.command_buffer(),
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &vk::ClearDepthStencilValue { depth, stencil: stencil as u32 },
                &[texture.full_range()],
            );
        }
        self.frames[self.frame].in_use.textures.push(Arc::clone(target));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            engine_bail!(SOURCE, "Viewport must have a positive size ({}x{})", viewport.width, viewport.height);
        }
        self.viewport = viewport;
        Ok(())
    }

    fn set_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<()> {
        self.rasterizer = *desc;
        Ok(())
    }

    fn set_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> Result<()> {
        self.depth_stencil = *desc;
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.topology = topology;
        Ok(())
    }

    fn set_input_layout(&mut self, layout: &VertexLayout) -> Result<()> {
        self.input_layout = layout.clone();
        Ok(())
    }

    fn bind_shader(&mut self, stage: ShaderStage, module: Option<&Arc<dyn ShaderModule>>) -> Result<()> {
        if let Some(module) = module {
            if module.stage() != stage {
                engine_bail!(SOURCE, "{:?} module bound to the {:?} stage", module.stage(), stage);
            }
            vk_shader(module)?;
        }
        self.shaders[stage_index(stage)] = module.cloned();
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, stride: u32) -> Result<()> {
        if buffer.desc().kind != BufferKind::Vertex {
            engine_bail!(SOURCE, "{:?} buffer bound as vertex buffer", buffer.desc().kind);
        }
        vk_buffer(buffer)?;
        self.vertex_buffer = Some((Arc::clone(buffer), stride));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, index_type: IndexType) -> Result<()> {
        if buffer.desc().kind != BufferKind::Index {
            engine_bail!(SOURCE, "{:?} buffer bound as index buffer", buffer.desc().kind);
        }
        vk_buffer(buffer)?;
        self.index_buffer = Some((Arc::clone(buffer), index_type));
        Ok(())
    }

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: &Arc<dyn Buffer>) -> Result<()> {
        let slot = check_slot(slot, "Constant buffer")?;
        if buffer.desc().kind != BufferKind::Constant {
            engine_bail!(SOURCE, "{:?} buffer bound as constant buffer", buffer.desc().kind);
        }
        vk_buffer(buffer)?;
        self.stages[stage_index(stage)].constants[slot] = Some(Arc::clone(buffer));
        Ok(())
    }

    fn bind_texture(&mut self, stage: ShaderStage, slot: u32, texture: Option<&Arc<dyn Texture>>) -> Result<()> {
        let slot = check_slot(slot, "Texture")?;
        if let Some(texture) = texture {
            if !texture.desc().usage.contains(TextureUsage::SAMPLED) {
                engine_bail!(SOURCE, "Texture without SAMPLED usage bound to slot {}", slot);
            }
            vk_texture(texture)?;
        }
        self.stages[stage_index(stage)].textures[slot] = texture.cloned();
        Ok(())
    }

    fn bind_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: &Arc<dyn Sampler>) -> Result<()> {
        let slot = check_slot(slot, "Sampler")?;
        vk_sampler(sampler)?;
        self.stages[stage_index(stage)].samplers[slot] = Some(Arc::clone(sampler));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        let (index_buffer, index_type) = match &self.index_buffer {
            Some((buffer, index_type)) => (Arc::clone(buffer), *index_type),
            None => engine_bail!(SOURCE, "draw_indexed without an index buffer bound"),
        };
        let capacity = index_buffer.desc().size / index_type.size_bytes() as u64;
        if first_index as u64 + index_count as u64 > capacity {
            engine_bail!(SOURCE, "draw_indexed reads indices {}..{} of {}", first_index, first_index + index_count, capacity);
        }

        self.prepare_draw()?;
        let (handle, offset) = vk_buffer(&index_buffer)?.resolve(&mut self.frames[self.frame].uploads)?;
        let cb = self.command_buffer();
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(cb, handle, offset, index_type_to_vk(index_type));
            self.ctx.device.cmd_draw_indexed(cb, index_count, 1, first_index, base_vertex, 0);
        }
        self.frames[self.frame].in_use.buffers.push(index_buffer);
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.prepare_draw()?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer(), vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn begin_event(&mut self, name: &str) {
        self.event_depth += 1;
        if let (Some(debug_utils), true) = (&self.ctx.debug_utils, self.recording) {
            if let Ok(label) = CString::new(name) {
                let info = vk::DebugUtilsLabelEXT::default().label_name(&label);
                unsafe { debug_utils.cmd_begin_debug_utils_label(self.command_buffer(), &info) };
            }
        }
    }

    fn end_event(&mut self) {
        if self.event_depth == 0 {
            engine_error!(SOURCE, "end_event without a matching begin_event");
            return;
        }
        self.event_depth -= 1;
        if let (Some(debug_utils), true) = (&self.ctx.debug_utils, self.recording) {
            unsafe { debug_utils.cmd_end_debug_utils_label(self.command_buffer()) };
        }
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            for frame in &mut self.frames {
                frame.in_use.clear();
                frame.destroy(&self.ctx.device);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
