/// Graphics device module - the backend seam
///
/// Traits a native backend implements, the descriptors passed through
/// them, and the headless implementation used by tests and by the demo
/// when no native backend is available.

pub mod graphics_device;
pub mod buffer;
pub mod texture;
pub mod pipeline;
pub mod command_list;
pub mod headless;

pub use graphics_device::*;
pub use buffer::*;
pub use texture::*;
pub use pipeline::*;
pub use command_list::*;
pub use headless::{HeadlessDevice, HeadlessRecorder};
