/// Shared fixtures for unit tests

use std::path::PathBuf;
use crate::graphics_device::{HeadlessDevice, HeadlessRecorder};
use crate::renderer::{Renderer, RendererConfig};

/// Vertex stage over the standard layout with two uniform blocks
pub const BASIC_VS: &str = r#"
struct PerFrame {
    view_proj: mat4x4<f32>,
}

struct PerObject {
    world: mat4x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> per_object: PerObject;
@group(0) @binding(1) var<uniform> per_frame: PerFrame;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    let world = per_object.world * vec4<f32>(position, 1.0);
    out.clip = per_frame.view_proj * world;
    out.uv = uv;
    out.normal = normal + tangent * 0.0 + per_object.color.xyz * 0.0;
    return out;
}
"#;

/// Pixel stage linking with `BASIC_VS`
pub const BASIC_PS: &str = r#"
struct Surface {
    diffuse: vec3<f32>,
    alpha: f32,
}

@group(0) @binding(0) var<uniform> surface: Surface;
@group(1) @binding(0) var diffuse_map: texture_2d<f32>;
@group(2) @binding(0) var linear_sampler: sampler;

@fragment
fn ps_main(@location(0) uv: vec2<f32>, @location(1) normal: vec3<f32>) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuse_map, linear_sampler, uv).rgb * surface.diffuse;
    return vec4<f32>(albedo + normal * 0.0, surface.alpha);
}
"#;

/// Vertex stage writing four interpolants
pub const FOUR_OUTPUT_VS: &str = r#"
struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) tangent: vec3<f32>,
    @location(2) world_position: vec3<f32>,
    @location(3) uv: vec2<f32>,
}

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    out.clip = vec4<f32>(position, 1.0);
    out.normal = normal;
    out.tangent = tangent;
    out.world_position = position;
    out.uv = uv;
    return out;
}
"#;

/// Pixel stage reading only three of `FOUR_OUTPUT_VS`'s interpolants
pub const THREE_INPUT_PS: &str = r#"
@fragment
fn ps_main(
    @location(0) normal: vec3<f32>,
    @location(1) tangent: vec3<f32>,
    @location(2) world_position: vec3<f32>,
) -> @location(0) vec4<f32> {
    return vec4<f32>(normal + tangent + world_position, 1.0);
}
"#;

/// Empty scratch directory unique to one test
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("prism3d_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Directory of the engine's built-in WGSL shaders
pub fn builtin_shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders")
}

/// Renderer over a fresh headless device, with the device's recorder
pub fn headless_renderer(width: u32, height: u32) -> (Renderer, HeadlessRecorder) {
    let device = HeadlessDevice::new(width, height);
    let recorder = device.recorder();
    let renderer = Renderer::new(Box::new(device), RendererConfig::default()).unwrap();
    (renderer, recorder)
}
