/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the swapchain for the window it was created on, the immediate
/// command list and the back buffer. A frame is recorded between two
/// `present` calls: present closes the frame, blits the back buffer into
/// an acquired swapchain image, submits, presents and opens the next one.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use prism_3d_engine::prism3d::device::{
    Buffer, BufferDesc, CommandList, GraphicsDevice, Sampler, SamplerDesc, ShaderModule,
    ShaderStage, Texture, TextureDesc, TextureFormat, TextureUsage,
};
use prism_3d_engine::prism3d::{Error, Result};
use prism_3d_engine::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{vk_texture, VulkanCommandList};
use crate::vulkan_context::{GpuContext, GpuContextDesc, SOURCE};
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_shader::VulkanShaderModule;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::VulkanTexture;

type DebugMessenger = (ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT);

fn init_failed(what: &str, detail: impl std::fmt::Debug) -> Error {
    engine_error!(SOURCE, "{}: {:?}", what, detail);
    Error::InitializationFailed(format!("{}: {:?}", what, detail))
}

/// Instance-level objects, destroyed in reverse order unless handed over
struct InstanceGuard {
    entry: ash::Entry,
    instance: Option<ash::Instance>,
    messenger: Option<DebugMessenger>,
    surface: Option<(ash::khr::surface::Instance, vk::SurfaceKHR)>,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, surface)) = self.surface.take() {
                loader.destroy_surface(surface, None);
            }
            if let Some((loader, messenger)) = self.messenger.take() {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

/// What device selection found out about the chosen GPU
struct Adapter {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
}

/// Ranking of a GPU; `None` when it cannot run the renderer at all
pub(crate) fn adapter_score(
    api_version: u32,
    device_type: vk::PhysicalDeviceType,
    dynamic_rendering: bool,
    has_queue_family: bool,
) -> Option<u32> {
    let version_ok = vk::api_version_major(api_version) > 1
        || (vk::api_version_major(api_version) == 1 && vk::api_version_minor(api_version) >= 3);
    if !version_ok || !dynamic_rendering || !has_queue_family {
        return None;
    }
    Some(match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
        _ => 0,
    })
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Result<Option<DebugMessenger>> {
    use crate::debug::{self, ValidationSeverity};

    if !debug::has_debug_config() {
        debug::init_debug_config(debug::Config::default());
    }
    let severity = debug::current_severity();
    let mut severity_flags = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    if severity != ValidationSeverity::ErrorsOnly {
        severity_flags |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    }
    if severity == ValidationSeverity::All {
        severity_flags |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }

    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags)
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug::vulkan_debug_callback));
    let messenger = loader
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| init_failed("Failed to create debug messenger", e))?;
    Ok(Some((loader, messenger)))
}

#[cfg(not(feature = "vulkan-validation"))]
unsafe fn create_messenger(_entry: &ash::Entry, _instance: &ash::Instance) -> Result<Option<DebugMessenger>> {
    Ok(None)
}

unsafe fn pick_adapter(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<Adapter> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;

    let mut best: Option<(u32, Adapter)> = None;
    for physical_device in physical_devices {
        let properties = instance.get_physical_device_properties(physical_device);

        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut features13);
        instance.get_physical_device_features2(physical_device, &mut features2);
        let features = features2.features;
        let dynamic_rendering = features13.dynamic_rendering == vk::TRUE;

        // Graphics and present on one queue keeps submission single-queue
        let queue_family = instance
            .get_physical_device_queue_family_properties(physical_device)
            .iter()
            .enumerate()
            .find(|(index, family)| {
                family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                    && surface_loader
                        .get_physical_device_surface_support(physical_device, *index as u32, surface)
                        .unwrap_or(false)
            })
            .map(|(index, _)| index as u32);

        let name = properties.device_name_as_c_str().map(CStr::to_string_lossy).unwrap_or_default().into_owned();
        match adapter_score(properties.api_version, properties.device_type, dynamic_rendering, queue_family.is_some()) {
            Some(score) => {
                engine_debug!(SOURCE, "GPU candidate '{}' ({:?}), score {}", name, properties.device_type, score);
                if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                    if let Some(queue_family) = queue_family {
                        best = Some((score, Adapter { physical_device, queue_family, properties, features }));
                    }
                }
            }
            None => engine_debug!(SOURCE, "GPU '{}' skipped: needs Vulkan 1.3, dynamic rendering and a presentable graphics queue", name),
        }
    }

    best.map(|(_, adapter)| adapter).ok_or_else(|| {
        engine_error!(SOURCE, "No suitable Vulkan GPU found");
        Error::InitializationFailed("No Vulkan 1.3 GPU with dynamic rendering and presentation found".to_string())
    })
}

unsafe fn create_logical_device(instance: &ash::Instance, adapter: &Adapter) -> Result<ash::Device> {
    let queue_priorities = [1.0];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(adapter.queue_family)
        .queue_priorities(&queue_priorities)];

    let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

    let supported = &adapter.features;
    if supported.fill_mode_non_solid != vk::TRUE {
        engine_warn!(SOURCE, "GPU has no line fill mode, wireframe pipelines will fail");
    }
    let device_features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .depth_clamp(supported.depth_clamp == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE);
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extension_names)
        .enabled_features(&device_features)
        .push_next(&mut features13);

    instance
        .create_device(adapter.physical_device, &device_create_info, None)
        .map_err(|e| init_failed("Failed to create logical device", e))
}

fn back_buffer_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc {
        width: width.max(1),
        height: height.max(1),
        format: TextureFormat::R8G8B8A8_UNORM,
        usage: TextureUsage::RENDER_TARGET,
        mip_levels: 1,
    }
}

pub struct VulkanDevice {
    // Field order is drop order: command list and swapchain go before the context
    command_list: VulkanCommandList,
    back_buffer: Arc<dyn Texture>,
    swapchain: Swapchain,
    ctx: Arc<GpuContext>,
    name: String,
}

impl VulkanDevice {
    /// Create a device presenting to `window`, a `width` x `height` client area
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, width: u32, height: u32) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            let display_handle = window
                .display_handle()
                .map_err(|e| init_failed("Failed to get display handle", e))?;
            let window_handle = window
                .window_handle()
                .map_err(|e| init_failed("Failed to get window handle", e))?;

            #[allow(unused_mut)]
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_failed("Failed to get required instance extensions", e))?
                .to_vec();
            #[allow(unused_mut)]
            let mut layer_names: Vec<*const std::os::raw::c_char> = Vec::new();
            #[cfg(feature = "vulkan-validation")]
            {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let app_info = vk::ApplicationInfo::default()
                .application_name(c"Prism3D Application")
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Prism3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);
            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed("Failed to create Vulkan instance", e))?;

            let mut guard = InstanceGuard { entry, instance: Some(instance), messenger: None, surface: None };
            let instance = match guard.instance.as_ref() {
                Some(instance) => instance.clone(),
                None => return Err(Error::InitializationFailed("Vulkan instance missing".to_string())),
            };

            guard.messenger = create_messenger(&guard.entry, &instance)?;

            let surface = ash_window::create_surface(
                &guard.entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_failed("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&guard.entry, &instance);
            guard.surface = Some((surface_loader.clone(), surface));

            let adapter = pick_adapter(&instance, &surface_loader, surface)?;
            let name = adapter
                .properties
                .device_name_as_c_str()
                .map(CStr::to_string_lossy)
                .unwrap_or_default()
                .into_owned();
            engine_info!(SOURCE, "Using GPU '{}' ({:?})", name, adapter.properties.device_type);

            let device = create_logical_device(&instance, &adapter)?;
            let graphics_queue = device.get_device_queue(adapter.queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: adapter.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            });
            let allocator = match allocator {
                Ok(allocator) => allocator,
                Err(e) => {
                    device.destroy_device(None);
                    return Err(init_failed("Failed to create GPU allocator", e));
                }
            };

            let upload_pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(adapter.queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = match device.create_command_pool(&upload_pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    drop(allocator);
                    device.destroy_device(None);
                    return Err(init_failed("Failed to create upload command pool", e));
                }
            };

            #[cfg(feature = "vulkan-validation")]
            let debug_utils = Some(ash::ext::debug_utils::Device::new(&instance, &device));
            #[cfg(not(feature = "vulkan-validation"))]
            let debug_utils = None;

            let limits = &adapter.properties.limits;
            let max_anisotropy = if adapter.features.sampler_anisotropy == vk::TRUE {
                limits.max_sampler_anisotropy
            } else {
                1.0
            };

            // From here on GpuContext owns device, instance and messenger
            let (surface_loader, surface) = match guard.surface.take() {
                Some(surface) => surface,
                None => return Err(Error::InitializationFailed("Vulkan surface missing".to_string())),
            };
            let ctx = Arc::new(GpuContext::new(GpuContextDesc {
                entry: guard.entry.clone(),
                instance,
                device,
                allocator,
                graphics_queue,
                graphics_queue_family: adapter.queue_family,
                upload_command_pool,
                uniform_alignment: limits.min_uniform_buffer_offset_alignment,
                max_anisotropy,
                depth_clamp: adapter.features.depth_clamp == vk::TRUE,
                debug_utils,
                debug_messenger: guard.messenger.take(),
            }));
            guard.instance = None;
            drop(guard);

            // The swapchain owns the surface from here, even on failure
            let swapchain = Swapchain::new(
                Arc::clone(&ctx),
                adapter.physical_device,
                surface,
                surface_loader,
                width,
                height,
                true,
            )?;
            let back_buffer: Arc<dyn Texture> =
                Arc::new(VulkanTexture::new(Arc::clone(&ctx), back_buffer_desc(width, height), None)?);
            let mut command_list = VulkanCommandList::new(Arc::clone(&ctx))?;
            command_list.begin_frame()?;

            let extent = swapchain.extent();
            engine_info!(SOURCE, "Vulkan device ready ({}x{} swapchain, {:?})",
                extent.width, extent.height, swapchain.format());

            Ok(Self { command_list, back_buffer, swapchain, ctx, name: format!("Vulkan ({})", name) })
        }
    }

    /// Pipelines built so far
    pub fn pipeline_count(&self) -> usize {
        self.command_list.pipeline_count()
    }

    /// Blit into the acquired image (if any), submit and present
    fn finish_frame(&mut self) -> Result<()> {
        let frame = self.command_list.frame_index();
        let image_index = self.swapchain.acquire(frame)?;

        match image_index {
            Some(image_index) => {
                self.command_list.end_rendering();
                let back_buffer = Arc::clone(&self.back_buffer);
                let source = vk_texture(&back_buffer)?;
                self.command_list.transition(source, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
                self.swapchain.record_blit(self.command_list.command_buffer(), source, image_index)?;

                self.command_list.submit(
                    Some(self.swapchain.image_available(frame)),
                    Some(self.swapchain.render_finished(image_index)),
                )?;
                self.swapchain.present(image_index)
            }
            // Nothing to show: the frame's work still runs
            None => self.command_list.submit(None, None),
        }
    }
}

impl GraphicsDevice for VulkanDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_buffer(&mut self, desc: BufferDesc, data: Option<&[u8]>) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(Arc::clone(&self.ctx), desc, data)?))
    }

    fn create_texture(&mut self, desc: TextureDesc, data: Option<&[u8]>) -> Result<Arc<dyn Texture>> {
        if desc.usage.is_empty() {
            engine_bail!(SOURCE, "Texture usage must not be empty");
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) != desc.format.is_depth() {
            engine_bail!(SOURCE, "Format {:?} does not match usage {:?}", desc.format, desc.usage);
        }
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), desc, data)?))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>> {
        if desc.max_anisotropy == 0 || desc.max_anisotropy > 16 {
            engine_bail!(SOURCE, "max_anisotropy must be in 1..=16 (got {})", desc.max_anisotropy);
        }
        Ok(Arc::new(VulkanSampler::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_shader_module(&mut self, stage: ShaderStage, spirv: &[u32]) -> Result<Arc<dyn ShaderModule>> {
        Ok(Arc::new(VulkanShaderModule::new(Arc::clone(&self.ctx), stage, spirv)?))
    }

    fn command_list(&mut self) -> &mut dyn CommandList {
        &mut self.command_list
    }

    fn back_buffer(&self) -> Arc<dyn Texture> {
        Arc::clone(&self.back_buffer)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_bail!(SOURCE, "Cannot resize swap chain to {}x{}", width, height);
        }
        let vsync = self.swapchain.vsync();
        self.swapchain.recreate(width, height, vsync)?;
        // The old back buffer stays alive until the frames using it retire
        self.back_buffer = Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), back_buffer_desc(width, height), None)?);
        engine_debug!(SOURCE, "Resized to {}x{}", width, height);
        Ok(())
    }

    fn present(&mut self, vsync: bool) -> Result<()> {
        let result = self.finish_frame();

        if result.is_ok() && self.swapchain.needs_recreate(vsync) {
            let desc = self.back_buffer.desc();
            let (width, height) = (desc.width, desc.height);
            if let Err(e) = self.swapchain.recreate(width, height, vsync) {
                engine_error!(SOURCE, "Swapchain recreation failed: {}", e);
            }
        }

        // Always reopen a frame so the command list stays usable after an error
        let next = self.command_list.begin_frame();
        result.and(next)
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
