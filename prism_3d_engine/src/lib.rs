/*!
# Prism 3D Engine

Core of a real-time 3D renderer: handle-addressed resource tables, WGSL
shaders compiled to SPIR-V and reflected into CPU-mirrored constant
buffers, a set / apply / draw renderer facade and the frame passes built
on it (shadow map, forward or deferred lighting, bloom and tonemapping).

## Architecture

- **GraphicsDevice / CommandList**: backend traits; `HeadlessDevice` records
  commands instead of submitting them
- **Renderer**: owns the device and every resource table, tracks the draw
  protocol and uploads only dirty constant buffers
- **Shader**: compile + reflect, with file-timestamp hot reload
- **MaterialPool**: fixed-capacity BRDF / Blinn-Phong material tables
- **Scene**: game objects, lights and camera, loaded from `.scn` files
- **Engine**: per-frame orchestration of the passes
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod utils;
pub mod graphics_device;
pub mod resource;
pub mod shader;
pub mod renderer;
pub mod material;
pub mod scene;
pub mod settings;
pub mod passes;
pub mod input;

#[cfg(test)]
mod test_support;

// Main prism3d namespace module
pub mod prism3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Frame orchestrator
    pub use crate::engine::{Engine, EngineConfig, FrameStats};

    // Renderer facade
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, MemoryLogger};
    }

    // Backend traits and the headless device
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Render sub-module: facade, states and passes
    pub mod render {
        pub use crate::renderer::*;
        pub use crate::passes::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod shader {
        pub use crate::shader::*;
    }

    pub mod material {
        pub use crate::material::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }

    pub mod settings {
        pub use crate::settings::*;
    }

    pub mod input {
        pub use crate::input::*;
    }
}

// Re-export math library at crate root
pub use glam;
