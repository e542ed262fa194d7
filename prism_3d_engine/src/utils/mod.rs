//! Small helpers shared across the engine: slot allocation and the colour palette

mod slot_allocator;
mod color;

pub use slot_allocator::SlotAllocator;
pub use color::LinearColor;
