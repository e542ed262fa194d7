//! Integration tests for the frame orchestrator on the headless device
//!
//! Run with: cargo test --test engine_integration_tests


use prism_3d_engine::prism3d::device::HeadlessDevice;
use prism_3d_engine::prism3d::input::{Key, KeyboardState};
use prism_3d_engine::prism3d::settings::{parse_settings, EngineSettings};
use prism_3d_engine::prism3d::{Engine, EngineConfig};
use test_utils::{shader_dir, temp_dir};

const LEVEL: &str = "\
// three objects under a shadowing spot light
camera 0.1 1000 60  0 15 -50  0 10
light s white true 800 45  0 40 0  90 0 0
light p red false 200 30  10 5 0
light p blue false 200 30  -10 5 0
light d sun false 1 0  0 0 0  50 30 0

object begin
mesh grid
transform 0 0 0  0 0 0  30
object end

object begin
mesh cube
transform 0 4 0  0 30 0  3
brdf 0.9 0.9 0.9  0.4 0.1
object end

object begin
mesh sphere
transform 8 4 0  0 0 0  2
blinnphong ruby
object end
";

fn engine(name: &str, settings: EngineSettings) -> (Engine, prism_3d_engine::prism3d::device::HeadlessRecorder) {
    let dir = temp_dir(name);
    std::fs::write(dir.join("level.scn"), LEVEL).unwrap();
    let device = HeadlessDevice::new(400, 300);
    let recorder = device.recorder();
    let config = EngineConfig {
        shader_dir: shader_dir(),
        scene_dir: dir,
        levels: vec!["level.scn".to_string()],
        shader_poll_interval: 0,
        ..EngineConfig::default()
    };
    (Engine::new(Box::new(device), settings, config).unwrap(), recorder)
}

#[test]
fn test_integration_forward_frame() {
    let (mut engine, recorder) = engine("forward_frame", EngineSettings::default());
    engine.tick(1.0 / 60.0, &KeyboardState::new()).unwrap();

    assert_eq!(recorder.presents(), 1);
    assert_eq!(engine.stats().objects_drawn, 3);
    let stats = engine.renderer().stats();
    // shadow casters + objects + three markers + bright + 10 blurs + combine + tonemap
    assert_eq!(stats.draw_calls, 3 + 3 + 3 + 1 + 10 + 1 + 1);
}

#[test]
fn test_integration_deferred_frame_without_bloom() {
    let mut settings = parse_settings("deferredRendering yes\nbloom 1.2 0.6 4\n");
    assert!(settings.rendering.deferred_rendering);
    assert_eq!(settings.rendering.bloom.blur_pass_count, 4);
    settings.rendering.bloom.enabled = false;

    let (mut engine, recorder) = engine("deferred_frame", settings);
    engine.tick(1.0 / 60.0, &KeyboardState::new()).unwrap();

    let frame = recorder.last_frame_commands();
    assert!(frame.iter().any(|c| c == "begin_event(Deferred lighting)"));
    assert!(frame.iter().all(|c| c != "begin_event(Bloom)"));
    // shadow casters + G-buffer objects + lighting quad + markers + tonemap
    assert_eq!(engine.renderer().stats().draw_calls, 3 + 3 + 1 + 3 + 1);
}

#[test]
fn test_integration_deferred_frame_with_occlusion_and_skybox() {
    let mut settings = parse_settings("deferredRendering yes\nambientOcclusion yes\n");
    settings.rendering.bloom.enabled = false;
    let (mut engine, recorder) = engine("occlusion_skybox", settings);
    let dir = engine.config().scene_dir.clone();
    image::RgbaImage::from_pixel(16, 8, image::Rgba([40, 90, 200, 255])).save(dir.join("sky.png")).unwrap();
    std::fs::write(dir.join("level.scn"), format!("{}skybox sky.png\n", LEVEL)).unwrap();
    engine.reload_scene().unwrap();
    assert!(engine.scene().skybox().is_valid());

    engine.tick(1.0 / 60.0, &KeyboardState::new()).unwrap();
    let frame = recorder.last_frame_commands();
    assert!(frame.iter().any(|c| c == "begin_event(Ambient occlusion)"));
    assert!(frame.iter().any(|c| c == "begin_event(Skybox)"));
    // shadow casters + G-buffer objects + occlusion and blur + lighting quad + skybox + markers + tonemap
    assert_eq!(engine.renderer().stats().draw_calls, 3 + 3 + 2 + 1 + 1 + 3 + 1);

    // reloading resolves to the cached texture, which stays alive
    let skybox = engine.scene().skybox();
    engine.reload_scene().unwrap();
    assert_eq!(engine.scene().skybox(), skybox);
    assert!(engine.renderer().texture(skybox).is_some());
}

#[test]
fn test_integration_many_frames_with_toggles() {
    let (mut engine, recorder) = engine("many_frames", EngineSettings::default());
    let mut input = KeyboardState::new();
    for frame in 0..12 {
        match frame {
            3 => input.key_pressed(Key::F5),
            6 => input.key_pressed(Key::F1),
            9 => input.key_pressed(Key::F3),
            _ => {}
        }
        input.key_pressed(Key::W);
        engine.tick(0.05, &input).unwrap();
        input.end_frame();
        input.release_all();
    }
    assert_eq!(recorder.presents(), 12);
    assert_eq!(engine.stats().frame_count, 12);
    let rendering = engine.settings().rendering;
    assert!(rendering.deferred_rendering);
    assert!(!rendering.use_brdf_lighting);
    assert!(!rendering.bloom.enabled);
}

#[test]
fn test_integration_resize_between_frames() {
    let (mut engine, recorder) = engine("resize_frames", EngineSettings::default());
    engine.tick(0.016, &KeyboardState::new()).unwrap();
    engine.resize(800, 200).unwrap();
    engine.tick(0.016, &KeyboardState::new()).unwrap();
    assert_eq!(recorder.presents(), 2);
    assert!(recorder.last_frame_commands().iter().any(|c| c == "set_viewport(800x200)"));
}
