/// GpuContext - device state shared by every Vulkan object
///
/// Resources hold an `Arc<GpuContext>`, so the logical device, the
/// allocator and the instance are destroyed only after the last buffer,
/// texture, sampler or shader module referring to them is gone, whatever
/// order the renderer drops things in.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use prism_3d_engine::prism3d::{Error, Result};
use prism_3d_engine::{engine_err, engine_error};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

pub(crate) const SOURCE: &str = "prism3d::Vulkan";

pub(crate) struct GpuContext {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    /// Alignment of uniform buffer offsets, also used for ring suballocation
    pub uniform_alignment: u64,
    /// Device limit for anisotropic samplers; 1.0 when unsupported
    pub max_anisotropy: f32,
    pub depth_clamp: bool,
    /// Debug labels on command buffers (validation builds only)
    pub debug_utils: Option<ash::ext::debug_utils::Device>,

    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// One-shot upload commands (texture data, mip generation)
    upload_command_pool: Mutex<vk::CommandPool>,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    _entry: ash::Entry,
}

pub(crate) struct GpuContextDesc {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub device: ash::Device,
    pub allocator: Allocator,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub upload_command_pool: vk::CommandPool,
    pub uniform_alignment: u64,
    pub max_anisotropy: f32,
    pub depth_clamp: bool,
    pub debug_utils: Option<ash::ext::debug_utils::Device>,
    pub debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    pub fn new(desc: GpuContextDesc) -> Self {
        Self {
            device: desc.device,
            graphics_queue: desc.graphics_queue,
            graphics_queue_family: desc.graphics_queue_family,
            uniform_alignment: desc.uniform_alignment.max(16),
            max_anisotropy: desc.max_anisotropy,
            depth_clamp: desc.depth_clamp,
            debug_utils: desc.debug_utils,
            allocator: ManuallyDrop::new(Mutex::new(desc.allocator)),
            upload_command_pool: Mutex::new(desc.upload_command_pool),
            debug_messenger: desc.debug_messenger,
            instance: desc.instance,
            _entry: desc.entry,
        }
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!(SOURCE, "GPU allocator lock poisoned"))
    }

    /// Create a buffer and bind it to fresh memory at `location`
    pub fn create_buffer(
        &self,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<(vk::Buffer, Allocation)> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size.max(1))
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = self.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {} buffer of {} bytes: {:?}", name, size, e))?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let allocation = self.allocate(name, requirements, location, true);
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.free(allocation);
                self.device.destroy_buffer(buffer, None);
                return Err(engine_err!(SOURCE, "Failed to bind {} buffer memory: {:?}", name, e));
            }
            Ok((buffer, allocation))
        }
    }

    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.allocator()?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(SOURCE, "Out of GPU memory for {} ({:.2} MB): {}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    /// Return memory to the allocator; failures are only logged
    pub fn free(&self, allocation: Allocation) {
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    engine_error!(SOURCE, "Failed to free GPU memory: {}", e);
                }
            }
            Err(_) => engine_error!(SOURCE, "GPU allocator lock poisoned, leaking an allocation"),
        }
    }

    /// Record commands into a throwaway command buffer, submit and wait
    pub fn submit_one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self.upload_command_pool
            .lock()
            .map_err(|_| engine_err!(SOURCE, "Upload command pool lock poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device.begin_command_buffer(command_buffer, &begin_info)
                    .map_err(|e| engine_err!(SOURCE, "Failed to begin upload command buffer: {:?}", e))?;

                record(command_buffer);

                self.device.end_command_buffer(command_buffer)
                    .map_err(|e| engine_err!(SOURCE, "Failed to end upload command buffer: {:?}", e))?;

                let command_buffers = [command_buffer];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                self.device.queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                    .map_err(|e| engine_err!(SOURCE, "Failed to submit upload commands: {:?}", e))?;
                self.device.queue_wait_idle(self.graphics_queue)
                    .map_err(|e| engine_err!(SOURCE, "Failed to wait for upload commands: {:?}", e))
            })();

            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }

            // Allocator pages go back before the device disappears
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let Some((loader, messenger)) = self.debug_messenger.take() {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
