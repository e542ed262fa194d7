//! Render passes
//!
//! Each pass is a fixed sequence of renderer calls: bind its targets and
//! states, draw, and `reset` the renderer before returning so nothing leaks
//! into the next pass. Passes own the targets they write; later passes read
//! them through their texture handles.
//!
//! Frame order: shadow depth, geometry (forward, or deferred with optional
//! ambient occlusion), skybox, overlays, post-process.

mod shader_library;
mod shadow_pass;
mod geometry_pass;
mod ambient_occlusion;
mod post_process;

pub use shader_library::ShaderLibrary;
pub use shadow_pass::ShadowPass;
pub use ambient_occlusion::AmbientOcclusionPass;
pub use geometry_pass::{GeometryPass, GBuffer, sort_by_material};
pub use post_process::PostProcessPass;

use crate::renderer::Renderer;
use crate::scene::{Scene, SceneLightingData, SceneView};
use crate::settings::RenderingSettings;

/// Everything a pass reads for one frame
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub scene: &'a Scene,
    pub view: &'a SceneView,
    pub lighting: &'a SceneLightingData,
    pub settings: &'a RenderingSettings,
}

/// Upload the packed lights to the active shader
///
/// Full arrays are written every time; the dirty flag keeps unchanged
/// lighting from being uploaded again.
pub(crate) fn set_light_constants(renderer: &mut Renderer, lighting: &SceneLightingData) {
    renderer.set_constant("light_counts", &lighting.counts());
    renderer.set_constant("directional_light", &lighting.directional);
    renderer.set_constant_bytes("point_lights", bytemuck::cast_slice(&lighting.point_lights));
    renderer.set_constant_bytes("spot_lights", bytemuck::cast_slice(&lighting.spot_lights));
    renderer.set_constant("light_space_matrix", &lighting.light_space_matrix());
}

#[cfg(test)]
#[path = "passes_tests.rs"]
mod tests;
