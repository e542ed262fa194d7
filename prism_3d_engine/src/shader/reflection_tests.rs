/// Unit tests for reflection.rs
///
/// Stages are compiled from WGSL with the real compiler, then reflected.

use super::*;
use crate::shader::compile_wgsl;

const VS: &str = r#"
struct PerFrame {
    view_proj: mat4x4<f32>,
    camera_position: vec3<f32>,
    time: f32,
}

struct PerObject {
    world: mat4x4<f32>,
    tint: vec3<f32>,
}

@group(0) @binding(0) var<uniform> per_frame: PerFrame;
@group(0) @binding(1) var<uniform> per_object: PerObject;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    let world = per_object.world * vec4<f32>(position + normal * 0.0 + tangent * 0.0, 1.0);
    out.clip = per_frame.view_proj * world;
    out.world_position = world.xyz + per_object.tint * per_frame.time;
    out.uv = uv;
    return out;
}
"#;

const PS: &str = r#"
struct Surface {
    diffuse: vec3<f32>,
    alpha: f32,
}

@group(0) @binding(2) var<uniform> surface: Surface;
@group(1) @binding(0) var diffuse_map: texture_2d<f32>;
@group(1) @binding(3) var normal_map: texture_2d<f32>;
@group(2) @binding(0) var linear_sampler: sampler;

@fragment
fn ps_main(@location(0) world_position: vec3<f32>, @location(1) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuse_map, linear_sampler, uv).rgb;
    let n = textureSample(normal_map, linear_sampler, uv).rgb;
    return vec4<f32>(albedo * surface.diffuse + n * 0.0 + world_position * 0.0, surface.alpha);
}
"#;

fn reflect(source: &str, stage: ShaderStage) -> StageReflection {
    let words = compile_wgsl(source, stage, "reflection_test").unwrap();
    reflect_stage(&words, stage).unwrap()
}

#[test]
fn test_vertex_signature() {
    let vs = reflect(VS, ShaderStage::Vertex);
    assert_eq!(vs.inputs.len(), 4);
    assert_eq!(vs.inputs.iter().map(|p| p.location).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(vs.inputs[0].ty, Some(SignatureType { scalar: ScalarKind::Float, components: 3 }));
    assert_eq!(vs.inputs[3].ty, Some(SignatureType { scalar: ScalarKind::Float, components: 2 }));

    // The builtin position output is not part of the signature
    assert_eq!(vs.outputs.len(), 2);
    assert_eq!(vs.outputs[1].ty, Some(SignatureType { scalar: ScalarKind::Float, components: 2 }));
}

#[test]
fn test_cbuffer_layouts() {
    let vs = reflect(VS, ShaderStage::Vertex);
    assert_eq!(vs.cbuffers.len(), 2);

    let per_frame = &vs.cbuffers[0];
    assert_eq!(per_frame.name, "per_frame");
    assert_eq!(per_frame.slot, 0);
    assert_eq!(per_frame.stage, ShaderStage::Vertex);
    assert_eq!(per_frame.size, 80);
    let names: Vec<_> = per_frame.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["view_proj", "camera_position", "time"]);
    assert_eq!(per_frame.fields[0].size, 64);
    assert_eq!(per_frame.fields[1].offset, 64);
    assert_eq!(per_frame.fields[1].size, 12);
    assert_eq!(per_frame.fields[2].offset, 76);
    assert_eq!(per_frame.fields[2].size, 4);

    // Padding after the last field belongs to it
    let per_object = &vs.cbuffers[1];
    assert_eq!(per_object.size, 80);
    assert_eq!(per_object.fields[1].name, "tint");
    assert_eq!(per_object.fields[1].size, 16);
}

#[test]
fn test_field_sizes_cover_the_buffer() {
    for source_stage in [(VS, ShaderStage::Vertex), (PS, ShaderStage::Pixel)] {
        let reflection = reflect(source_stage.0, source_stage.1);
        for cbuffer in &reflection.cbuffers {
            let total: u32 = cbuffer.fields.iter().map(|f| f.size).sum();
            assert_eq!(total, cbuffer.size, "cbuffer {}", cbuffer.name);
            assert_eq!(cbuffer.size % CBUFFER_ALIGNMENT, 0);
        }
    }
}

#[test]
fn test_texture_and_sampler_slots() {
    let ps = reflect(PS, ShaderStage::Pixel);
    assert_eq!(ps.inputs.len(), 2);
    assert_eq!(ps.cbuffers.len(), 1);
    assert_eq!(ps.cbuffers[0].slot, 2);

    let diffuse = ps.textures.iter().find(|t| t.name == "diffuse_map").unwrap();
    assert_eq!(diffuse.slot, 0);
    assert_eq!(diffuse.stage, ShaderStage::Pixel);
    let normal = ps.textures.iter().find(|t| t.name == "normal_map").unwrap();
    assert_eq!(normal.slot, 3);

    assert_eq!(ps.samplers.len(), 1);
    assert_eq!(ps.samplers[0].name, "linear_sampler");
}

#[test]
fn test_garbage_is_rejected() {
    assert!(reflect_stage(&[0x0723_0203, 0, 0], ShaderStage::Vertex).is_err());
}
