/// Unit tests for the built-in shader set and the shared light upload

use super::*;
use glam::Vec3;
use crate::error::Error;
use crate::renderer::Renderer;
use crate::resource::BuiltinMesh;
use crate::scene::Light;
use crate::test_support::{builtin_shader_dir, headless_renderer, scratch_dir};

fn library(renderer: &mut Renderer) -> ShaderLibrary {
    ShaderLibrary::load(renderer, &builtin_shader_dir()).unwrap()
}

#[test]
fn test_builtin_shaders_compile() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let shaders = library(&mut renderer);
    for name in ShaderLibrary::NAMES {
        let id = renderer.find_shader(name);
        assert!(id.is_valid(), "{} missing", name);
        assert!(renderer.shader(id).unwrap().is_compiled());
    }
    assert_eq!(renderer.shader_ids().len(), ShaderLibrary::NAMES.len());
    assert!(renderer.shader(shaders.shadow_depth).unwrap().pixel_module().is_none());
    assert!(renderer.shader(shaders.tonemapping).unwrap().pixel_module().is_some());
}

#[test]
fn test_lighting_shaders_declare_frame_constants() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let shaders = library(&mut renderer);
    for id in [shaders.forward_brdf, shaders.forward_phong, shaders.deferred_lighting] {
        let shader = renderer.shader(id).unwrap();
        for name in ["light_counts", "point_lights", "spot_lights", "directional_light", "light_space_matrix", "camera_position"] {
            assert!(shader.has_constant(name), "{} lacks {}", shader.name(), name);
        }
    }
    let forward = renderer.shader(shaders.forward_brdf).unwrap();
    assert!(forward.has_constant("surface_material"));
    assert!(forward.texture_slots("shadow_map").next().is_some());
    let geometry = renderer.shader(shaders.deferred_geometry).unwrap();
    assert!(geometry.has_constant("brdf_or_phong"));
}

#[test]
fn test_environment_and_occlusion_shaders_declare_inputs() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let shaders = library(&mut renderer);
    let skybox = renderer.shader(shaders.skybox).unwrap();
    assert!(skybox.has_constant("view_proj"));
    assert!(skybox.has_constant("camera_position"));
    assert!(skybox.texture_slots("skybox_texture").next().is_some());

    let ssao = renderer.shader(shaders.ssao).unwrap();
    for name in ["view_proj", "inv_view_proj", "radius", "intensity", "kernel"] {
        assert!(ssao.has_constant(name), "ssao lacks {}", name);
    }
    for name in ["gbuffer_normal", "gbuffer_depth", "noise_texture"] {
        assert!(ssao.texture_slots(name).next().is_some(), "ssao lacks {}", name);
    }
    let blur = renderer.shader(shaders.ssao_blur).unwrap();
    assert!(blur.texture_slots("occlusion").next().is_some());
    let lighting = renderer.shader(shaders.deferred_lighting).unwrap();
    assert!(lighting.texture_slots("ambient_occlusion").next().is_some());
}

#[test]
fn test_missing_shaders_fail_initialization() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let result = ShaderLibrary::load(&mut renderer, &scratch_dir("no_shaders"));
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_forward_shader_follows_lighting_model() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let shaders = library(&mut renderer);
    assert_eq!(shaders.forward(true), shaders.forward_brdf);
    assert_eq!(shaders.forward(false), shaders.forward_phong);
}

#[test]
fn test_unchanged_lights_are_not_uploaded_again() {
    let (mut renderer, recorder) = headless_renderer(64, 64);
    let shaders = library(&mut renderer);
    let lights = [
        Light::point(Vec3::new(-8.0, 10.0, 0.0), 50.0),
        Light::spot(Vec3::Y * 20.0, 40.0).with_shadow(true),
    ];
    let lighting = SceneLightingData::gather(&lights);

    renderer.set_shader(shaders.deferred_lighting).unwrap();
    renderer.set_buffer_obj(renderer.builtin_mesh(BuiltinMesh::FullscreenQuad)).unwrap();
    set_light_constants(&mut renderer, &lighting);
    renderer.apply().unwrap();
    let uploads = recorder.buffer_uploads();
    assert!(uploads > 0);

    set_light_constants(&mut renderer, &lighting);
    renderer.apply().unwrap();
    assert_eq!(recorder.buffer_uploads(), uploads);
}
