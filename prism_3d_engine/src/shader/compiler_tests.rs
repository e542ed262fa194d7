use super::*;
use crate::error::Error;

const VS: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
"#;

#[test]
fn test_compile_emits_spirv() {
    let words = compile_wgsl(VS, ShaderStage::Vertex, "test_vs").unwrap();
    assert!(words.len() > 5);
    assert_eq!(words[0], 0x0723_0203);
}

#[test]
fn test_parse_error_names_the_source() {
    let err = compile_wgsl("fn vs_main( {", ShaderStage::Vertex, "broken_vs").unwrap_err();
    match err {
        Error::ShaderCompilation(message) => {
            assert!(message.starts_with("broken_vs"));
            assert!(message.contains("parse error"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_entry_point() {
    // A vertex entry point compiled as the pixel stage is not found
    let err = compile_wgsl(VS, ShaderStage::Pixel, "test_ps").unwrap_err();
    assert!(format!("{}", err).contains("ps_main"));
}

#[test]
fn test_validation_error() {
    let source = r#"
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    let x: f32 = 1u;
    return vec4<f32>(x);
}
"#;
    assert!(compile_wgsl(source, ShaderStage::Vertex, "bad_types").is_err());
}

#[test]
fn test_validation_error_carries_source_context() {
    // Parses, but the exact level given to the depth sample fails validation
    let source = r#"
@group(1) @binding(0) var depth_map: texture_depth_2d;
@group(2) @binding(0) var point_sampler: sampler;

@fragment
fn ps_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let depth = textureSampleLevel(depth_map, point_sampler, uv, 0);
    return vec4<f32>(depth);
}
"#;
    let message = match compile_wgsl(source, ShaderStage::Pixel, "depth_ps") {
        Err(Error::ShaderCompilation(message)) => message,
        other => panic!("unexpected result: {:?}", other.map(|w| w.len())),
    };
    assert!(message.starts_with("depth_ps"));
    assert!(message.lines().count() > 2, "diagnostic without context: {}", message);
}
