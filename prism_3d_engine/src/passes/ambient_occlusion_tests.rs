/// Unit tests for ambient_occlusion.rs

use super::*;
use crate::passes::GeometryPass;
use crate::scene::{Camera, CameraSettings};
use crate::test_support::{builtin_shader_dir, headless_renderer};

#[test]
fn test_kernel_stays_in_the_unit_hemisphere() {
    let kernel = sample_kernel();
    let mut previous = 0.0;
    for sample in kernel.iter() {
        let v = Vec3::new(sample[0], sample[1], sample[2]);
        assert!(v.z > 0.0, "{:?} below the surface", v);
        assert!(v.length() <= 1.0 + 1e-5);
        assert!(v.length() + 1e-5 >= previous, "samples must not get shorter");
        assert_eq!(sample[3], 0.0);
        previous = v.length();
    }
    assert!((Vec3::from_slice(&kernel[0][..3]).length() - 0.1).abs() < 1e-5);
}

#[test]
fn test_noise_is_unit_length_in_the_plane() {
    for texel in noise_texels() {
        assert_eq!(texel[2], 0.0);
        assert!((texel[0].hypot(texel[1]) - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_render_blurs_into_its_own_target() {
    let (mut renderer, recorder) = headless_renderer(64, 48);
    let shaders = ShaderLibrary::load(&mut renderer, &builtin_shader_dir()).unwrap();
    let geometry = GeometryPass::new(&mut renderer, 64, 48).unwrap();
    let camera = Camera::new(CameraSettings::default(), 64.0 / 48.0);
    let view = SceneView::new(&camera, true, (64, 48));

    renderer.begin_frame();
    let pass = geometry.ambient_occlusion();
    let result = pass
        .render(&mut renderer, &shaders, &view, geometry.gbuffer(), geometry.depth_target())
        .unwrap();

    assert_eq!(renderer.stats().draw_calls, 2);
    assert_eq!(result, renderer.render_target_texture(pass.blurred));
    assert_ne!(result, pass.white_texture());
    assert_eq!(recorder.count_commands("set_render_targets(1, no depth)"), 2);
    assert_eq!(recorder.count_commands("begin_event(Ambient occlusion)"), 1);
}

#[test]
fn test_resize_keeps_textures() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let mut pass = AmbientOcclusionPass::new(&mut renderer, 64, 64).unwrap();
    let (occlusion, white) = (pass.occlusion, pass.white_texture());

    pass.resize(&mut renderer, 64, 64).unwrap();
    assert_eq!(pass.occlusion, occlusion);

    pass.resize(&mut renderer, 32, 16).unwrap();
    assert!(renderer.render_target(occlusion).is_none());
    assert_eq!(renderer.render_target(pass.blurred).unwrap().size(), (32, 16));
    assert_eq!(pass.white_texture(), white);
    assert!(renderer.texture(white).is_some());
}
