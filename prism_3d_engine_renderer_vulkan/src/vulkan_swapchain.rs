/// Swapchain - presentation of the back buffer to the window surface
///
/// The renderer never draws into swapchain images directly. It renders
/// into an ordinary back-buffer texture, which is blitted to the acquired
/// image right before presentation. The swapchain can then be recreated
/// (resize, vsync toggle, out-of-date surface) without touching any
/// render target the engine holds.

use ash::vk;
use prism_3d_engine::prism3d::{Error, Result};
use prism_3d_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info};
use std::sync::Arc;

use crate::vulkan_command_list::FRAMES_IN_FLIGHT;
use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_texture::VulkanTexture;

/// Surface format preference; UNORM because the tonemap pass applies gamma itself
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_UNORM || f.format == vk::Format::R8G8B8A8_UNORM)
        .or_else(|| formats.first())
        .copied()
}

/// FIFO when vsync is on; otherwise the lowest-latency mode available
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn color_layers() -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(crate) struct Swapchain {
    ctx: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    /// Null while the window has a zero-sized client area
    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    format: vk::Format,
    extent: vk::Extent2D,

    /// Size asked for by the window; the surface may impose its own
    requested: (u32, u32),
    vsync: bool,
    /// Set on SUBOPTIMAL / OUT_OF_DATE, honoured at the next present
    stale: bool,

    /// One per frame in flight (acquire)
    image_available: Vec<vk::Semaphore>,
    /// One per swapchain image (present)
    render_finished: Vec<vk::Semaphore>,
}

impl Swapchain {
    pub fn new(
        ctx: Arc<GpuContext>,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(ctx.instance(), &ctx.device);
        let mut swapchain = Self {
            ctx,
            physical_device,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D { width: 0, height: 0 },
            requested: (width, height),
            vsync,
            stale: false,
            image_available: Vec::with_capacity(FRAMES_IN_FLIGHT),
            render_finished: Vec::new(),
        };

        unsafe {
            for _ in 0..FRAMES_IN_FLIGHT {
                let semaphore = swapchain.create_semaphore()?;
                swapchain.image_available.push(semaphore);
            }
            // Drop cleans up whatever was created if this fails
            swapchain.build()?;
        }
        Ok(swapchain)
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    unsafe fn create_semaphore(&self) -> Result<vk::Semaphore> {
        self.ctx.device
            .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create swapchain semaphore: {:?}", e);
                Error::InitializationFailed(format!("Failed to create semaphore: {:?}", e))
            })
    }

    /// (Re)create the swapchain for the requested size and vsync mode
    ///
    /// The previous swapchain, if any, is handed over as `old_swapchain`
    /// and destroyed afterwards. The caller guarantees the device is idle.
    unsafe fn build(&mut self) -> Result<()> {
        let capabilities = self.surface_loader
            .get_physical_device_surface_capabilities(self.physical_device, self.surface)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to get surface capabilities: {:?}", e);
                Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
            })?;
        if !capabilities.supported_usage_flags.contains(vk::ImageUsageFlags::TRANSFER_DST) {
            engine_error!(SOURCE, "Surface images cannot be blit destinations");
            return Err(Error::InitializationFailed("Surface does not support TRANSFER_DST images".to_string()));
        }

        let extent = choose_extent(&capabilities, self.requested.0, self.requested.1);
        let old_swapchain = self.swapchain;

        if extent.width == 0 || extent.height == 0 {
            // Minimized: nothing to present until the next resize
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = vk::SwapchainKHR::null();
            self.images.clear();
            self.extent = extent;
            self.stale = false;
            engine_debug!(SOURCE, "Surface has zero extent, swapchain released");
            return Ok(());
        }

        let formats = self.surface_loader
            .get_physical_device_surface_formats(self.physical_device, self.surface)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to query surface formats: {:?}", e);
                Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
            })?;
        let surface_format = choose_surface_format(&formats).ok_or_else(|| {
            engine_error!(SOURCE, "Surface reports no formats");
            Error::InitializationFailed("Surface reports no formats".to_string())
        })?;
        let present_modes = self.surface_loader
            .get_physical_device_surface_present_modes(self.physical_device, self.surface)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to query present modes: {:?}", e);
                Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
            })?;
        let present_mode = choose_present_mode(&present_modes, self.vsync);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = self.swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create swapchain: {:?}", e);
                Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
            })?;
        if old_swapchain != vk::SwapchainKHR::null() {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = swapchain;
        self.format = surface_format.format;
        self.extent = extent;
        self.stale = false;

        self.images = self.swapchain_loader
            .get_swapchain_images(swapchain)
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to get swapchain images: {:?}", e);
                Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
            })?;

        while self.render_finished.len() < self.images.len() {
            let semaphore = self.create_semaphore()?;
            self.render_finished.push(semaphore);
        }
        while self.render_finished.len() > self.images.len() {
            if let Some(semaphore) = self.render_finished.pop() {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
        }

        engine_info!(SOURCE, "Swapchain {}x{}, {} images, {:?}, {:?}",
            extent.width, extent.height, self.images.len(), surface_format.format, present_mode);
        Ok(())
    }

    /// Rebuild for a new window size and/or vsync mode
    pub fn recreate(&mut self, width: u32, height: u32, vsync: bool) -> Result<()> {
        self.requested = (width, height);
        self.vsync = vsync;
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!(SOURCE, "Failed to wait idle before swapchain recreate: {:?}", e))?;
            self.build()
        }
    }

    /// Whether the next present should be preceded by a rebuild
    pub fn needs_recreate(&self, vsync: bool) -> bool {
        self.stale || vsync != self.vsync
    }

    pub fn image_available(&self, frame: usize) -> vk::Semaphore {
        self.image_available[frame]
    }

    pub fn render_finished(&self, image_index: u32) -> vk::Semaphore {
        self.render_finished[image_index as usize]
    }

    /// Acquire the next image, signalling `image_available(frame)`
    ///
    /// `None` when there is nothing to present to: zero-sized surface, or
    /// an out-of-date swapchain (flagged for recreation).
    pub fn acquire(&mut self, frame: usize) -> Result<Option<u32>> {
        if self.swapchain == vk::SwapchainKHR::null() {
            return Ok(None);
        }
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available[frame],
                vk::Fence::null(),
            )
        };
        match result {
            Ok((image_index, suboptimal)) => {
                self.stale |= suboptimal;
                Ok(Some(image_index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!(SOURCE, "Swapchain out of date during acquire");
                self.stale = true;
                Ok(None)
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    /// Blit `src` (already in TRANSFER_SRC_OPTIMAL) onto image `image_index`
    /// and leave that image ready to present
    pub fn record_blit(&self, cb: vk::CommandBuffer, src: &VulkanTexture, image_index: u32) -> Result<()> {
        let dst_image = match self.images.get(image_index as usize) {
            Some(&image) => image,
            None => engine_bail!(SOURCE,
                "record_blit: image_index {} out of range (count: {})", image_index, self.images.len()),
        };
        if src.layout() != vk::ImageLayout::TRANSFER_SRC_OPTIMAL {
            engine_bail!(SOURCE, "record_blit: source texture is not in TRANSFER_SRC_OPTIMAL");
        }
        let src_desc = prism_3d_engine::prism3d::device::Texture::desc(src);

        unsafe {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(dst_image)
                .subresource_range(color_range())
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            self.ctx.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[], &[], &[to_transfer],
            );

            let region = vk::ImageBlit {
                src_subresource: color_layers(),
                src_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: src_desc.width as i32, y: src_desc.height as i32, z: 1 },
                ],
                dst_subresource: color_layers(),
                dst_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D { x: self.extent.width as i32, y: self.extent.height as i32, z: 1 },
                ],
            };
            self.ctx.device.cmd_blit_image(
                cb,
                src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                vk::Filter::LINEAR,
            );

            let to_present = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(dst_image)
                .subresource_range(color_range())
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::empty());
            self.ctx.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[], &[], &[to_present],
            );
        }
        Ok(())
    }

    /// Queue image `image_index` for presentation once rendering finished
    pub fn present(&mut self, image_index: u32) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_finished(image_index)];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(self.ctx.graphics_queue, &present_info) } {
            Ok(suboptimal) => {
                self.stale |= suboptimal;
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!(SOURCE, "Swapchain out of date during present");
                self.stale = true;
                Ok(())
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to present swapchain image: {:?}", e)),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            for &semaphore in self.image_available.iter().chain(self.render_finished.iter()) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
