//! End-to-end scenarios through the public API
//!
//! Run with: cargo test --test scenario_integration_tests


use prism_3d_engine::glam::{Mat4, Vec3};
use prism_3d_engine::prism3d::device::{HeadlessDevice, VertexLayout};
use prism_3d_engine::prism3d::input::KeyboardState;
use prism_3d_engine::prism3d::material::{MaterialKind, MaterialPool};
use prism_3d_engine::prism3d::resource::BuiltinMesh;
use prism_3d_engine::prism3d::scene::{parse_scene, Scene};
use prism_3d_engine::prism3d::shader::{Shader, ShaderDesc, ShaderState};
use prism_3d_engine::prism3d::Error;
use test_utils::{headless_renderer, shader_dir};

// ============================================================================
// SCENARIO A: LIGHT GATHER
// ============================================================================

#[test]
fn test_point_light_reaches_gpu_data() {
    let description = parse_scene("\
camera 0.1 1000 60  0 10 -30  0 0
light p orange false 300 50  -8 10 0
");
    assert!(description.problems.is_empty());
    let mut scene = Scene::from_description(&description, 16.0 / 9.0, 64).unwrap();
    scene.update(0.0, &KeyboardState::new());

    let lighting = scene.gather_lights();
    assert_eq!(lighting.point_light_count, 1);
    assert_eq!(lighting.counts().point_count, 1);
    let point = lighting.point_lights[0];
    assert_eq!(point.position, [-8.0, 10.0, 0.0]);
    assert_eq!(point.color, [1.0, 0.5, 0.0]);
}

// ============================================================================
// SCENARIO B: UNCHANGED CONSTANT
// ============================================================================

#[test]
fn test_same_world_matrix_uploads_once() {
    let (mut renderer, recorder) = headless_renderer(128, 128);
    let unlit = renderer.create_shader(ShaderDesc::new("unlit", shader_dir(), VertexLayout::standard()));
    assert!(unlit.is_valid());

    renderer.set_shader(unlit).unwrap();
    renderer.set_buffer_obj(renderer.builtin_mesh(BuiltinMesh::Cube)).unwrap();
    renderer.set_constant("world", &Mat4::IDENTITY);
    renderer.apply().unwrap();
    let uploads = recorder.buffer_uploads();

    renderer.set_constant("world", &Mat4::IDENTITY);
    renderer.apply().unwrap();
    assert_eq!(recorder.buffer_uploads(), uploads);

    renderer.set_constant("world", &Mat4::from_translation(Vec3::X));
    renderer.apply().unwrap();
    assert_eq!(recorder.buffer_uploads(), uploads + 1);
}

// ============================================================================
// SCENARIO C: STAGE SIGNATURE MISMATCH
// ============================================================================

const FOUR_OUTPUTS: &str = r#"
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

const THREE_INPUTS: &str = r#"
@fragment
fn ps_main(
    @location(0) normal: vec3<f32>,
    @location(1) tangent: vec3<f32>,
    @location(2) world_position: vec3<f32>,
) -> @location(0) vec4<f32> {
    return vec4<f32>(normal + tangent + world_position, 1.0);
}
"#;

#[test]
fn test_signature_mismatch_fails_compile() {
    let mut device = HeadlessDevice::new(64, 64);
    let mut shader = Shader::new(ShaderDesc::new("mismatch", "", VertexLayout::standard()));
    let result = shader.compile_sources(&mut device, FOUR_OUTPUTS, Some(THREE_INPUTS), None);

    assert!(matches!(result, Err(Error::ShaderCompilation(_))));
    assert_eq!(shader.state(), ShaderState::CompileFailed);
    assert_ne!(shader.state(), ShaderState::Compiled);
}

#[test]
fn test_signature_mismatch_yields_invalid_handle() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let count = renderer.shader_ids().len();
    let id = renderer.create_shader_from_source(
        ShaderDesc::new("mismatch", "", VertexLayout::standard()),
        FOUR_OUTPUTS,
        Some(THREE_INPUTS),
    );
    assert!(!id.is_valid());
    assert_eq!(renderer.shader_ids().len(), count);
}

// ============================================================================
// MATERIAL IDS
// ============================================================================

#[test]
fn test_material_id_round_trip() {
    let mut pool = MaterialPool::new(8).unwrap();
    for kind in MaterialKind::ALL {
        let first = pool.create(kind);
        let second = pool.create(kind);
        assert_eq!(first.kind(), Some(kind));
        assert_eq!((first.index(), second.index()), (Some(0), Some(1)));
    }
}

// ============================================================================
// SHADOW MATRIX
// ============================================================================

#[test]
fn test_light_space_matrix_is_deterministic() {
    let description = parse_scene("light s white true 800 40  3 30 -2  80 10 0\n");
    let light = &description.lights[0];
    let first = light.light_space_matrix();
    for _ in 0..4 {
        assert_eq!(light.light_space_matrix().to_cols_array(), first.to_cols_array());
    }
}
