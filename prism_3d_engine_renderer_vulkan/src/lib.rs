/*!
# Prism 3D Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` / `CommandList` seam of
prism_3d_engine, built on Ash for the bindings, ash-window for surface
creation and gpu-allocator for memory management.

The engine's immediate, slot-based command model is mapped onto Vulkan 1.3
dynamic rendering: pipelines are built from the current state on demand,
every draw gets a freshly written descriptor set, and image layouts are
tracked per texture.

```no_run
use prism_3d_engine_renderer_vulkan::VulkanDevice;
# fn demo(window: &winit::window::Window) -> prism_3d_engine::prism3d::Result<()> {
let size = window.inner_size();
let device = VulkanDevice::new(window, size.width, size.height)?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_device;
mod vulkan_format;
mod vulkan_pipeline;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_texture;

pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_command_list::VulkanCommandList;
pub use vulkan_device::VulkanDevice;
pub use vulkan_sampler::VulkanSampler;
pub use vulkan_shader::VulkanShaderModule;
pub use vulkan_texture::VulkanTexture;

// Validation layer reporting (active with the `vulkan-validation` feature)
pub use debug::{
    get_validation_stats, init_debug_config, print_validation_stats_report, Config as ValidationConfig,
    ValidationSeverity, ValidationStats,
};
