/// Unit tests for post_process.rs

use super::*;
use crate::test_support::{builtin_shader_dir, headless_renderer};

fn run(settings: &RenderingSettings) -> (u32, bool, crate::graphics_device::HeadlessRecorder) {
    let (mut renderer, recorder) = headless_renderer(160, 90);
    let shaders = ShaderLibrary::load(&mut renderer, &builtin_shader_dir()).unwrap();
    let pass = PostProcessPass::new(&mut renderer, 160, 90).unwrap();
    let scene = renderer.create_render_target(160, 90, HDR_FORMAT);
    let scene_texture = renderer.render_target_texture(scene);

    renderer.begin_frame();
    pass.render(&mut renderer, &shaders, settings, scene_texture).unwrap();
    assert_eq!(renderer.bound_render_targets(), &[renderer.back_buffer()]);
    let draw_calls = renderer.stats().draw_calls;
    let presented = renderer.end().unwrap();
    (draw_calls, presented, recorder)
}

#[test]
fn test_bloom_chain_draw_count() {
    let settings = RenderingSettings::default();
    assert_eq!(settings.bloom.blur_pass_count, 10);
    let (draws, presented, recorder) = run(&settings);
    // bright pass, blur passes, combine, tonemap
    assert_eq!(draws, 1 + 10 + 1 + 1);
    assert!(presented);
    assert_eq!(recorder.presents(), 1);
    let frame = recorder.last_frame_commands();
    assert_eq!(frame.iter().filter(|c| c.as_str() == "set_render_targets(2, no depth)").count(), 1);
}

#[test]
fn test_bloom_disabled_only_tonemaps() {
    let mut settings = RenderingSettings::default();
    settings.bloom.enabled = false;
    let (draws, presented, recorder) = run(&settings);
    assert_eq!(draws, 1);
    assert!(presented);
    let frame = recorder.last_frame_commands();
    assert!(frame.iter().all(|c| !c.starts_with("begin_event(Bloom")));
}

#[test]
fn test_zero_blur_passes_combines_bright_target() {
    let mut settings = RenderingSettings::default();
    settings.bloom.blur_pass_count = 0;
    let (draws, _, _) = run(&settings);
    assert_eq!(draws, 3);
}

#[test]
fn test_resize_recreates_targets() {
    let (mut renderer, _) = headless_renderer(64, 64);
    let mut pass = PostProcessPass::new(&mut renderer, 64, 64).unwrap();
    let old = pass.combined;
    pass.resize(&mut renderer, 32, 32).unwrap();
    assert_eq!(pass.size(), (32, 32));
    assert!(renderer.render_target(old).is_none());
    assert_eq!(renderer.render_target(pass.combined).unwrap().size(), (32, 32));
}
