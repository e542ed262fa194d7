/// Unit tests for renderer.rs
///
/// The headless device's recorder observes what actually reaches the device.

use super::*;
use std::time::{Duration, SystemTime};
use glam::Mat4;
use serial_test::serial;
use crate::graphics_device::{AddressMode, Filter, HeadlessDevice, HeadlessRecorder, VertexLayout};
use crate::log::MemoryLogger;
use crate::prism3d::Engine;
use crate::resource::{GeometryGenerator, ResourceHandle};
use crate::test_support::{scratch_dir, BASIC_PS, BASIC_VS};

// ============================================================================
// HELPERS
// ============================================================================

fn setup() -> (Renderer, HeadlessRecorder) {
    let device = HeadlessDevice::new(320, 240);
    let recorder = device.recorder();
    let renderer = Renderer::new(Box::new(device), RendererConfig::default()).unwrap();
    (renderer, recorder)
}

fn basic_shader(renderer: &mut Renderer) -> ShaderId {
    let desc = ShaderDesc::new("basic", "", VertexLayout::standard());
    let id = renderer.create_shader_from_source(desc, BASIC_VS, Some(BASIC_PS));
    assert!(id.is_valid());
    id
}

fn ready_to_draw(renderer: &mut Renderer) -> ShaderId {
    let shader = basic_shader(renderer);
    renderer.set_shader(shader).unwrap();
    renderer.set_buffer_obj(renderer.builtin_mesh(BuiltinMesh::Cube)).unwrap();
    shader
}

fn is_dirty(renderer: &Renderer, shader: ShaderId, cbuffer: &str) -> bool {
    renderer
        .shader(shader)
        .unwrap()
        .cbuffers()
        .iter()
        .find(|cb| cb.layout().name == cbuffer)
        .map(|cb| cb.is_dirty())
        .unwrap()
}

// ============================================================================
// CREATION
// ============================================================================

#[test]
fn test_defaults_are_created() {
    let (renderer, _) = setup();
    assert_eq!(renderer.size(), (320, 240));
    assert_eq!(renderer.draw_state(), DrawState::Idle);

    for mesh in BuiltinMesh::ALL {
        let id = renderer.builtin_mesh(mesh);
        assert!(renderer.buffer_object(id).is_some(), "{:?}", mesh);
    }
    let cull_front = renderer.default_rasterizer_state(DefaultRasterizerState::CullFront);
    assert_eq!(renderer.rasterizer_state(cull_front).unwrap().cull_mode, CullMode::Front);
    let depth_test = renderer.default_depth_stencil_state(DefaultDepthStencilState::DepthTestOnly);
    assert!(!renderer.depth_stencil_state(depth_test).unwrap().depth_write);
    let shadow = renderer.default_sampler(DefaultSampler::ShadowCompare);
    assert!(renderer.sampler(shadow).unwrap().desc().compare.is_some());

    let back_buffer = renderer.render_target(renderer.back_buffer()).unwrap();
    assert_eq!(back_buffer.size(), (320, 240));
    assert_eq!(renderer.render_target_texture(renderer.back_buffer()), TextureId::INVALID);
}

#[test]
fn test_failed_creation_returns_invalid_handles() {
    let (mut renderer, _) = setup();
    let desc = ShaderDesc::new("broken", "", VertexLayout::standard());
    assert_eq!(renderer.create_shader_from_source(desc, "fn vs_main(", None), ShaderId::INVALID);
    assert_eq!(renderer.create_render_target(0, 16, TextureFormat::R8G8B8A8_UNORM), RenderTargetId::INVALID);
    assert_eq!(renderer.create_buffer_object(&MeshData::default(), false), BufferId::INVALID);

    let mut bad_sampler = SamplerDesc::new(Filter::Anisotropic, AddressMode::Wrap);
    bad_sampler.max_anisotropy = 64;
    assert_eq!(renderer.create_sampler(bad_sampler), SamplerId::INVALID);
}

#[test]
fn test_find_shader_by_name() {
    let (mut renderer, _) = setup();
    let id = basic_shader(&mut renderer);
    assert_eq!(renderer.find_shader("basic"), id);
    assert_eq!(renderer.find_shader("other"), ShaderId::INVALID);
    assert_eq!(renderer.shader_ids(), vec![id]);
}

// ============================================================================
// HANDLE VALIDATION
// ============================================================================

#[test]
fn test_invalid_handles_are_rejected() {
    let (mut renderer, _) = setup();
    let shader = basic_shader(&mut renderer);

    assert!(renderer.set_shader(ShaderId::INVALID).is_err());
    assert!(renderer.set_shader(ShaderId::from_slot(42)).is_err());
    assert!(renderer.set_buffer_obj(BufferId::from_slot(999)).is_err());
    assert_eq!(renderer.active_shader(), ShaderId::INVALID);

    renderer.set_shader(shader).unwrap();
    assert!(!renderer.set_texture("diffuse_map", TextureId::from_slot(77)));
    assert!(!renderer.set_sampler("linear_sampler", SamplerId::INVALID));
    assert!(renderer.set_rasterizer_state(RasterizerStateId::from_slot(99)).is_err());
    assert!(renderer.bind_render_targets(&[RenderTargetId::from_slot(50)], DepthTargetId::INVALID).is_err());
}

#[test]
fn test_destroyed_texture_handle_goes_stale() {
    let (mut renderer, _) = setup();
    let desc = TextureDesc::sampled(4, 4, TextureFormat::R8G8B8A8_UNORM);
    let first = renderer.create_texture_2d(desc, None);
    let second = renderer.create_texture_2d(desc, None);
    assert!(renderer.texture(first).is_some());

    assert!(renderer.destroy_texture(first));
    assert!(renderer.texture(first).is_none());
    assert!(!renderer.destroy_texture(first));
    assert!(renderer.texture(second).is_some());

    // The slot is recycled only after the explicit destroy
    let third = renderer.create_texture_2d(desc, None);
    assert_eq!(third, first);
}

// ============================================================================
// CONSTANTS AND APPLY
// ============================================================================

#[test]
fn test_dirty_flag_only_on_real_change() {
    let (mut renderer, _) = setup();
    let shader = ready_to_draw(&mut renderer);

    // Zero is what the mirror already holds
    assert!(renderer.set_constant("world", &Mat4::ZERO));
    assert!(!is_dirty(&renderer, shader, "per_object"));

    assert!(renderer.set_constant("world", &Mat4::IDENTITY));
    assert!(is_dirty(&renderer, shader, "per_object"));
    assert!(!is_dirty(&renderer, shader, "per_frame"));

    renderer.apply().unwrap();
    assert!(!is_dirty(&renderer, shader, "per_object"));

    assert!(renderer.set_constant("world", &Mat4::IDENTITY));
    assert!(!is_dirty(&renderer, shader, "per_object"));
}

#[test]
fn test_apply_twice_uploads_once() {
    let (mut renderer, recorder) = setup();
    ready_to_draw(&mut renderer);
    renderer.set_constant("view_proj", &Mat4::from_scale(glam::Vec3::splat(2.0)));
    renderer.set_constant("diffuse", &[1.0f32, 0.5, 0.0]);

    let before = recorder.buffer_uploads();
    renderer.apply().unwrap();
    assert_eq!(recorder.buffer_uploads() - before, 2);
    assert_eq!(renderer.stats().cbuffer_uploads, 2);

    renderer.apply().unwrap();
    assert_eq!(recorder.buffer_uploads() - before, 2);
    assert_eq!(renderer.stats().cbuffer_uploads, 2);
}

#[test]
fn test_same_value_twice_uploads_nothing_the_second_time() {
    let (mut renderer, recorder) = setup();
    ready_to_draw(&mut renderer);

    renderer.set_constant("world", &Mat4::IDENTITY);
    renderer.apply().unwrap();
    let after_first = recorder.buffer_uploads();

    renderer.set_constant("world", &Mat4::IDENTITY);
    renderer.apply().unwrap();
    assert_eq!(recorder.buffer_uploads(), after_first);
}

#[test]
fn test_apply_binds_every_cbuffer_and_stage() {
    let (mut renderer, recorder) = setup();
    ready_to_draw(&mut renderer);
    renderer.apply().unwrap();

    let commands = recorder.commands();
    assert_eq!(recorder.count_commands("bind_constant_buffer"), 3);
    assert!(commands.contains(&"bind_constant_buffer(Vertex, 0)".to_string()));
    assert!(commands.contains(&"bind_constant_buffer(Vertex, 1)".to_string()));
    assert!(commands.contains(&"bind_constant_buffer(Pixel, 0)".to_string()));
    assert!(commands.contains(&"bind_shader(Vertex, set)".to_string()));
    assert!(commands.contains(&"bind_shader(Pixel, set)".to_string()));
    assert!(commands.contains(&"set_input_layout(4 attributes)".to_string()));
    assert!(commands.contains(&"bind_vertex_buffer(stride=44)".to_string()));
    assert!(commands.contains(&"bind_index_buffer(U32)".to_string()));
    assert_eq!(renderer.draw_state(), DrawState::Applied);
}

#[test]
fn test_apply_without_shader_fails() {
    let (mut renderer, _) = setup();
    assert!(renderer.apply().is_err());
}

#[test]
fn test_constant_too_large_is_rejected() {
    let (mut renderer, _) = setup();
    let shader = ready_to_draw(&mut renderer);
    // "diffuse" is a 12-byte vec3 followed by "alpha"
    assert!(!renderer.set_constant("diffuse", &[1.0f32; 4]));
    assert!(!is_dirty(&renderer, shader, "surface"));
}

#[test]
#[serial]
fn test_missing_constant_warns_once() {
    let logger = MemoryLogger::new();
    Engine::set_logger(logger.clone());

    let (mut renderer, _) = setup();
    ready_to_draw(&mut renderer);
    assert!(!renderer.set_constant("missing_fog_density", &0.5f32));
    assert!(!renderer.set_constant("missing_fog_density", &0.7f32));

    let warnings = logger
        .entries_from("prism3d::Renderer")
        .into_iter()
        .filter(|e| e.message.contains("missing_fog_density"))
        .count();
    assert_eq!(warnings, 1);

    Engine::reset_logger();
}

// ============================================================================
// DRAW PROTOCOL
// ============================================================================

#[test]
fn test_draw_state_transitions() {
    let (mut renderer, _) = setup();
    let shader = basic_shader(&mut renderer);

    renderer.set_shader(shader).unwrap();
    assert_eq!(renderer.draw_state(), DrawState::ShaderBound);
    renderer.set_buffer_obj(renderer.builtin_mesh(BuiltinMesh::Quad)).unwrap();
    assert_eq!(renderer.draw_state(), DrawState::BufferBound);
    renderer.apply().unwrap();
    assert_eq!(renderer.draw_state(), DrawState::Applied);
    renderer.draw_indexed().unwrap();
    assert_eq!(renderer.draw_state(), DrawState::Drawn);

    // A real change after apply requires another apply
    renderer.set_constant("world", &Mat4::IDENTITY);
    assert_eq!(renderer.draw_state(), DrawState::BufferBound);

    renderer.reset().unwrap();
    assert_eq!(renderer.draw_state(), DrawState::Idle);
    assert_eq!(renderer.active_shader(), ShaderId::INVALID);
    assert_eq!(renderer.active_buffer(), BufferId::INVALID);
}

#[test]
fn test_draw_indexed_uses_buffer_counts() {
    let (mut renderer, recorder) = setup();
    ready_to_draw(&mut renderer);
    renderer.apply().unwrap();
    renderer.draw_indexed().unwrap();
    renderer.draw_indexed().unwrap();

    assert_eq!(recorder.draw_calls(), 2);
    assert_eq!(recorder.count_commands("draw_indexed(36, 0, 0)"), 2);
    assert_eq!(renderer.stats().draw_calls, 2);
    assert_eq!(renderer.stats().indices, 72);
    assert_eq!(renderer.stats().vertices, 48);

    renderer.begin_frame();
    assert_eq!(renderer.stats().draw_calls, 0);
}

#[test]
fn test_draw_without_buffer_fails() {
    let (mut renderer, _) = setup();
    let shader = basic_shader(&mut renderer);
    renderer.set_shader(shader).unwrap();
    renderer.apply().unwrap();
    assert!(renderer.draw_indexed().is_err());
}

#[test]
fn test_textures_bind_on_apply_and_unbind_on_reset() {
    let (mut renderer, recorder) = setup();
    ready_to_draw(&mut renderer);
    let texture = renderer.create_texture_2d(TextureDesc::sampled(2, 2, TextureFormat::R8G8B8A8_UNORM), None);

    assert!(renderer.set_texture("diffuse_map", texture));
    assert!(renderer.set_sampler("linear_sampler", renderer.default_sampler(DefaultSampler::LinearWrap)));
    assert_eq!(recorder.count_commands("bind_texture"), 0);

    renderer.apply().unwrap();
    assert!(recorder.commands().contains(&"bind_texture(Pixel, 0, set)".to_string()));
    assert!(recorder.commands().contains(&"bind_sampler(Pixel, 0)".to_string()));
    assert_eq!(renderer.stats().texture_binds, 1);

    renderer.reset().unwrap();
    assert!(recorder.commands().contains(&"bind_texture(Pixel, 0, none)".to_string()));
}

#[test]
fn test_unknown_texture_name_is_a_miss() {
    let (mut renderer, _) = setup();
    ready_to_draw(&mut renderer);
    let texture = renderer.create_texture_2d(TextureDesc::sampled(2, 2, TextureFormat::R8G8B8A8_UNORM), None);
    assert!(!renderer.set_texture("height_map", texture));
}

#[test]
fn test_switching_shader_drops_pending_bindings() {
    let (mut renderer, recorder) = setup();
    let first = ready_to_draw(&mut renderer);
    let texture = renderer.create_texture_2d(TextureDesc::sampled(2, 2, TextureFormat::R8G8B8A8_UNORM), None);
    renderer.set_texture("diffuse_map", texture);

    let desc = ShaderDesc::new("vertex_only", "", VertexLayout::standard());
    let second = renderer.create_shader_from_source(desc, BASIC_VS, None);
    assert_ne!(first, second);
    renderer.set_shader(second).unwrap();
    renderer.apply().unwrap();
    assert_eq!(recorder.count_commands("bind_texture"), 0);
    assert!(recorder.commands().contains(&"bind_shader(Pixel, none)".to_string()));
}

// ============================================================================
// TARGETS AND FRAME
// ============================================================================

#[test]
fn test_render_target_views_are_sampleable() {
    let (mut renderer, _) = setup();
    let target = renderer.create_render_target(64, 32, TextureFormat::R16G16B16A16_FLOAT);
    let view = renderer.render_target_texture(target);
    assert!(renderer.texture(view).is_some());
    assert_eq!(renderer.render_target(target).unwrap().size(), (64, 32));

    let depth = renderer.create_depth_target(16, 16);
    assert!(renderer.texture(renderer.depth_target_texture(depth)).is_some());

    // Views are owned by their target
    assert!(!renderer.destroy_texture(view));
    assert!(renderer.destroy_render_target(target));
    assert!(renderer.texture(view).is_none());
    assert!(!renderer.destroy_render_target(renderer.back_buffer()));
}

#[test]
fn test_binding_a_target_unbinds_its_view() {
    let (mut renderer, recorder) = setup();
    ready_to_draw(&mut renderer);
    let target = renderer.create_render_target(64, 64, TextureFormat::R8G8B8A8_UNORM);
    renderer.set_texture("diffuse_map", renderer.render_target_texture(target));
    renderer.apply().unwrap();

    renderer.bind_render_targets(&[target], DepthTargetId::INVALID).unwrap();
    let commands = recorder.commands();
    let unbind = commands.iter().position(|c| c == "bind_texture(Pixel, 0, none)").unwrap();
    let bind = commands.iter().position(|c| c.starts_with("set_render_targets")).unwrap();
    assert!(unbind < bind);
    assert_eq!(renderer.viewport(), Viewport::from_size(64, 64));
    assert_eq!(renderer.bound_render_targets(), &[target]);
}

#[test]
fn test_begin_clears_and_end_presents_back_buffer_only() {
    let (mut renderer, recorder) = setup();
    let offscreen = renderer.create_render_target(32, 32, TextureFormat::R8G8B8A8_UNORM);
    let depth = renderer.create_depth_target(32, 32);

    renderer.bind_render_targets(&[offscreen], depth).unwrap();
    renderer.begin([0.0, 0.0, 0.0, 1.0], 1.0).unwrap();
    assert_eq!(recorder.count_commands("clear_color"), 1);
    assert_eq!(recorder.count_commands("clear_depth(1, 0)"), 1);
    assert!(!renderer.end().unwrap());
    assert_eq!(recorder.presents(), 0);

    renderer.bind_render_targets(&[renderer.back_buffer()], DepthTargetId::INVALID).unwrap();
    assert!(renderer.end().unwrap());
    assert_eq!(recorder.presents(), 1);
}

#[test]
fn test_resize_swaps_back_buffer() {
    let (mut renderer, _) = setup();
    renderer.resize(800, 600).unwrap();
    assert_eq!(renderer.size(), (800, 600));
    assert_eq!(renderer.render_target(renderer.back_buffer()).unwrap().size(), (800, 600));
    assert!((renderer.aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
    assert!(renderer.resize(0, 600).is_err());
}

// ============================================================================
// BUFFER OBJECTS AND TEXTURE FILES
// ============================================================================

#[test]
fn test_dynamic_buffer_objects_accept_updates() {
    let (mut renderer, recorder) = setup();
    let mesh = GeometryGenerator::quad(1.0);
    let dynamic = renderer.create_buffer_object(&mesh, true);
    let fixed = renderer.create_buffer_object(&mesh, false);

    let mut vertices = mesh.vertices.clone();
    vertices[0].position = [5.0, 5.0, 5.0];
    let before = recorder.buffer_uploads();
    renderer.update_buffer_object(dynamic, &vertices).unwrap();
    assert_eq!(recorder.buffer_uploads(), before + 1);

    assert!(renderer.update_buffer_object(fixed, &vertices).is_err());
    assert!(renderer.update_buffer_object(dynamic, &vertices[..3]).is_err());

    assert!(renderer.destroy_buffer_object(dynamic));
    assert!(renderer.update_buffer_object(dynamic, &vertices).is_err());
    assert!(!renderer.destroy_buffer_object(renderer.builtin_mesh(BuiltinMesh::Sphere)));
}

#[test]
#[serial]
fn test_tangent_frame_lines_are_cached_until_the_mesh_changes() {
    let (mut renderer, _) = setup();
    let mesh = GeometryGenerator::quad(1.0);
    let dynamic = renderer.create_buffer_object(&mesh, true);

    let lines = renderer.tangent_frame_lines(dynamic, 0.5).unwrap();
    assert_eq!(renderer.tangent_frame_lines(dynamic, 0.5).unwrap(), lines);
    for line in lines {
        let object = renderer.buffer_object(line).unwrap();
        assert_eq!(object.topology(), PrimitiveTopology::LineList);
        assert_eq!(object.index_count(), 2 * mesh.vertices.len() as u32);
    }

    let mut vertices = mesh.vertices.clone();
    vertices[0].position = [2.0, 0.0, 0.0];
    renderer.update_buffer_object(dynamic, &vertices).unwrap();
    assert!(lines.iter().all(|&line| renderer.buffer_object(line).is_none()));
    let rebuilt = renderer.tangent_frame_lines(dynamic, 0.5).unwrap();
    let normals = renderer.buffer_object(rebuilt[2]).unwrap().vertices();
    assert_eq!(normals[0].position, [2.0, 0.0, 0.0]);

    // line lists have no tangent frame of their own
    assert!(renderer.tangent_frame_lines(rebuilt[0], 0.5).is_err());

    assert!(renderer.destroy_buffer_object(dynamic));
    assert!(rebuilt.iter().all(|&line| renderer.buffer_object(line).is_none()));
}

#[test]
fn test_texture_files_are_cached_by_path() {
    let (mut renderer, recorder) = setup();
    let dir = scratch_dir("texture_cache");
    let path = dir.join("checker.png");
    image::RgbaImage::from_pixel(8, 4, image::Rgba([255, 0, 0, 255])).save(&path).unwrap();

    let created_before = recorder.textures_created();
    let first = renderer.create_texture_from_file(&path);
    assert!(first.is_valid());
    let desc = *renderer.texture(first).unwrap().desc();
    assert_eq!((desc.width, desc.height), (8, 4));

    // Same file through a different spelling of the path
    let second = renderer.create_texture_from_file(dir.join(".").join("checker.png"));
    assert_eq!(first, second);
    assert_eq!(recorder.textures_created(), created_before + 1);

    // Destroying drops the cache entry
    assert!(renderer.destroy_texture(first));
    let third = renderer.create_texture_from_file(&path);
    assert!(third.is_valid());
    assert_eq!(recorder.textures_created(), created_before + 2);
}

#[test]
fn test_bad_texture_files_return_invalid() {
    let (mut renderer, _) = setup();
    let dir = scratch_dir("bad_textures");
    std::fs::write(dir.join("garbage.png"), b"not a png").unwrap();

    assert_eq!(renderer.create_texture_from_file(""), TextureId::INVALID);
    assert_eq!(renderer.create_texture_from_file(dir.join("missing.png")), TextureId::INVALID);
    assert_eq!(renderer.create_texture_from_file(dir.join("garbage.png")), TextureId::INVALID);
}

// ============================================================================
// HOT-RELOAD
// ============================================================================

fn touch(path: &Path) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(30)).unwrap();
}

#[test]
fn test_reload_changed_shader_swaps_and_dirties() {
    let (mut renderer, _) = setup();
    let dir = scratch_dir("renderer_reload");
    std::fs::write(dir.join("basic_vs.wgsl"), BASIC_VS).unwrap();
    std::fs::write(dir.join("basic_ps.wgsl"), BASIC_PS).unwrap();
    let id = renderer.create_shader(ShaderDesc::new("basic", &dir, VertexLayout::standard()));
    assert!(id.is_valid());
    assert_eq!(renderer.reload_changed_shaders(), 0);

    touch(&dir.join("basic_ps.wgsl"));
    assert_eq!(renderer.reload_changed_shaders(), 1);
    let shader = renderer.shader(id).unwrap();
    assert!(shader.cbuffers().iter().all(|cb| cb.is_dirty()));
    assert_eq!(renderer.reload_changed_shaders(), 0);
}

#[test]
fn test_failed_reload_keeps_running_program() {
    let (mut renderer, _) = setup();
    let dir = scratch_dir("renderer_failed_reload");
    std::fs::write(dir.join("basic_vs.wgsl"), BASIC_VS).unwrap();
    std::fs::write(dir.join("basic_ps.wgsl"), BASIC_PS).unwrap();
    let id = renderer.create_shader(ShaderDesc::new("basic", &dir, VertexLayout::standard()));

    std::fs::write(dir.join("basic_ps.wgsl"), "fn ps_main( {").unwrap();
    touch(&dir.join("basic_ps.wgsl"));
    assert_eq!(renderer.reload_changed_shaders(), 0);

    let shader = renderer.shader(id).unwrap();
    assert!(shader.is_compiled());
    assert!(shader.pixel_module().is_some());
    // Not retried until the file changes again
    assert!(!shader.sources_changed());
    assert!(renderer.reload_shader(id).is_err());
}

#[test]
fn test_reload_all_skips_in_memory_shaders() {
    let (mut renderer, _) = setup();
    basic_shader(&mut renderer);
    assert_eq!(renderer.reload_all_shaders(), 0);
}
