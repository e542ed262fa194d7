/// Unit tests for geometry_pass.rs

use super::*;
use crate::graphics_device::{TextureDesc, TextureFormat};
use crate::material::{Material, MaterialKind};
use crate::passes::ShadowPass;
use crate::scene::{GameObjectKey, Light, MeshRef, Scene, SceneView, Transform};
use crate::settings::RenderingSettings;
use crate::test_support::{builtin_shader_dir, headless_renderer};
use crate::utils::LinearColor;

fn request(material: MaterialId, x: f32) -> DrawRequest {
    DrawRequest {
        key: GameObjectKey::default(),
        world: Mat4::from_translation(Vec3::X * x),
        normal: Mat4::IDENTITY,
        mesh: MeshRef::Builtin(BuiltinMesh::Cube),
        material,
        render_settings: RenderSettings::RENDER,
    }
}

/// Three objects, two markers (the directional light has none)
fn lit_scene() -> Scene {
    let mut scene = Scene::new(1.0, 16).unwrap();
    let red = scene.materials_mut().insert(Material::brdf(LinearColor::RED, 0.4, 0.0));
    let gold = scene.materials_mut().insert(Material::blinn_phong(LinearColor::ORANGE, Vec3::ONE, 40.0));
    scene.spawn(Transform::IDENTITY, BuiltinMesh::Grid, red);
    scene.spawn(Transform::from_position(Vec3::Y), BuiltinMesh::Sphere, gold);
    scene.spawn(Transform::from_position(Vec3::X), BuiltinMesh::Cube, red);
    scene.add_light(Light::point(Vec3::new(0.0, 5.0, 0.0), 30.0));
    scene.add_light(Light::spot(Vec3::new(0.0, 20.0, 0.0), 45.0).with_shadow(true));
    scene.add_light(Light::directional());
    scene
}

fn render_frame(deferred: bool) -> (usize, u32, crate::graphics_device::HeadlessRecorder) {
    let (mut renderer, recorder) = headless_renderer(320, 240);
    let shaders = ShaderLibrary::load(&mut renderer, &builtin_shader_dir()).unwrap();
    let shadow = ShadowPass::new(&mut renderer, 256).unwrap();
    let pass = GeometryPass::new(&mut renderer, 320, 240).unwrap();
    let mut scene = lit_scene();
    let lighting = scene.gather_lights();
    let view = SceneView::new(scene.camera(), deferred, renderer.size());
    let settings = RenderingSettings::default();
    let frame = FrameContext { scene: &scene, view: &view, lighting: &lighting, settings: &settings };

    let shadow_map = shadow.shadow_map(&renderer);
    renderer.begin_frame();
    let drawn = pass.render(&mut renderer, &shaders, &frame, shadow_map).unwrap();
    (drawn, renderer.stats().draw_calls, recorder)
}

#[test]
fn test_sort_groups_materials_and_keeps_submission_order() {
    let brdf = MaterialId::new(MaterialKind::Brdf, 3);
    let phong = MaterialId::new(MaterialKind::BlinnPhong, 0);
    let other = MaterialId::new(MaterialKind::Brdf, 1);
    let draws = vec![
        request(brdf, 0.0),
        request(phong, 1.0),
        request(other, 2.0),
        request(brdf, 3.0),
        request(phong, 4.0),
    ];

    let sorted = sort_by_material(draws);
    let order: Vec<(MaterialId, f32)> = sorted.iter().map(|d| (d.material, d.world.w_axis.x)).collect();
    assert_eq!(
        order,
        vec![(other, 2.0), (brdf, 0.0), (brdf, 3.0), (phong, 1.0), (phong, 4.0)]
    );
}

#[test]
fn test_sort_empty() {
    assert!(sort_by_material(Vec::new()).is_empty());
}

#[test]
fn test_forward_draws_objects_and_markers() {
    let (drawn, draw_calls, recorder) = render_frame(false);
    assert_eq!(drawn, 3);
    assert_eq!(draw_calls, 3 + 2);
    assert_eq!(recorder.count_commands("set_render_targets(3"), 0);
    assert_eq!(recorder.count_commands("clear_color"), 1);
}

#[test]
fn test_deferred_adds_lighting_quad() {
    let (drawn, draw_calls, recorder) = render_frame(true);
    assert_eq!(drawn, 3);
    assert_eq!(draw_calls, 3 + 1 + 2);
    assert_eq!(recorder.count_commands("set_render_targets(3, depth)"), 1);
    assert_eq!(recorder.count_commands("set_render_targets(1, no depth)"), 1);
    // three G-buffer targets, then the lit colour target
    assert_eq!(recorder.count_commands("clear_color"), 4);
}

fn single_cube_frame(
    deferred: bool,
    configure: impl FnOnce(&mut Renderer, &mut Scene, &mut RenderingSettings),
) -> (u32, crate::graphics_device::HeadlessRecorder) {
    let (mut renderer, recorder) = headless_renderer(64, 64);
    let shaders = ShaderLibrary::load(&mut renderer, &builtin_shader_dir()).unwrap();
    let pass = GeometryPass::new(&mut renderer, 64, 64).unwrap();
    let mut scene = Scene::new(1.0, 16).unwrap();
    let material = scene.default_material();
    scene.spawn(Transform::IDENTITY, BuiltinMesh::Cube, material);
    let mut settings = RenderingSettings::default();
    configure(&mut renderer, &mut scene, &mut settings);
    let lighting = scene.gather_lights();
    let view = SceneView::new(scene.camera(), deferred, (64, 64));
    let frame = FrameContext { scene: &scene, view: &view, lighting: &lighting, settings: &settings };

    renderer.begin_frame();
    pass.render(&mut renderer, &shaders, &frame, TextureId::INVALID).unwrap();
    (renderer.stats().draw_calls, recorder)
}

#[test]
fn test_tbn_overlay_draws_three_line_lists() {
    let (draw_calls, recorder) = single_cube_frame(false, |_, scene, _| {
        let key = scene.objects().map(|(key, _)| key).next().unwrap();
        scene.object_mut(key).unwrap().render_settings |= RenderSettings::RENDER_TBN;
    });
    // the cube, then tangents, bitangents and normals
    assert_eq!(draw_calls, 1 + 3);
    assert_eq!(recorder.count_commands("set_primitive_topology(LineList)"), 3);
    assert!(recorder.commands().iter().all(|c| !c.ends_with("Wireframe)")));
    // 24 cube vertices, two line ends each
    assert_eq!(recorder.count_commands("draw_indexed(48, 0, 0)"), 3);
}

#[test]
fn test_skybox_drawn_after_opaques_with_depth_test_only() {
    let (draw_calls, recorder) = single_cube_frame(false, |renderer, scene, _| {
        let sky = renderer.create_texture_2d(TextureDesc::sampled(4, 2, TextureFormat::R8G8B8A8_UNORM), None);
        scene.set_skybox(sky);
    });
    assert_eq!(draw_calls, 1 + 1);
    let frame = recorder.commands();
    let first_draw = frame.iter().position(|c| c.starts_with("draw_indexed")).unwrap();
    let skybox = frame.iter().position(|c| c == "begin_event(Skybox)").unwrap();
    assert!(first_draw < skybox);
    assert!(frame[skybox..].iter().any(|c| c == "set_depth_stencil_state(test=true, write=false)"));
}

#[test]
fn test_no_skybox_event_without_texture() {
    let (draw_calls, recorder) = single_cube_frame(false, |_, _, _| {});
    assert_eq!(draw_calls, 1);
    assert_eq!(recorder.count_commands("begin_event(Skybox)"), 0);
}

#[test]
fn test_deferred_ambient_occlusion_adds_two_quads() {
    let (draw_calls, recorder) = single_cube_frame(true, |_, _, settings| settings.ambient_occlusion = true);
    // G-buffer cube, occlusion, blur, lighting quad
    assert_eq!(draw_calls, 1 + 2 + 1);
    let frame = recorder.commands();
    let occlusion = frame.iter().position(|c| c == "begin_event(Ambient occlusion)").unwrap();
    let lighting = frame.iter().position(|c| c == "begin_event(Deferred lighting)").unwrap();
    assert!(occlusion < lighting);
}

#[test]
fn test_forward_ignores_ambient_occlusion() {
    let (draw_calls, recorder) = single_cube_frame(false, |_, _, settings| settings.ambient_occlusion = true);
    assert_eq!(draw_calls, 1);
    assert_eq!(recorder.count_commands("begin_event(Ambient occlusion)"), 0);
}

#[test]
fn test_resize_recreates_targets() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let mut pass = GeometryPass::new(&mut renderer, 64, 64).unwrap();
    let old_world = pass.world_target();
    let old_gbuffer = *pass.gbuffer();

    pass.resize(&mut renderer, 64, 64).unwrap();
    assert_eq!(pass.world_target(), old_world);

    pass.resize(&mut renderer, 128, 96).unwrap();
    assert_eq!(pass.size(), (128, 96));
    assert!(renderer.render_target(old_world).is_none());
    assert!(renderer.render_target(old_gbuffer.normal).is_none());
    assert_eq!(renderer.render_target(pass.world_target()).unwrap().size(), (128, 96));
    assert_eq!(renderer.depth_target(pass.depth_target()).unwrap().size(), (128, 96));
}
