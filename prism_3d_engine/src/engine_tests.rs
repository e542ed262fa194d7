/// Unit tests for engine.rs

use super::*;
use std::path::Path;
use serial_test::serial;
use crate::graphics_device::HeadlessDevice;
use crate::input::KeyboardState;
use crate::log::MemoryLogger;
use crate::test_support::{builtin_shader_dir, scratch_dir};

const ROOM: &str = "\
camera 0.1 500 60  0 10 -40  0 0
light s white true 800 40  0 30 0  90 0 0
light p orange false 300 50  -8 10 0
object begin
mesh grid
transform 0 0 0  0 0 0  20
object end
object begin
mesh cube
transform 0 5 0  0 45 0  4
brdf 0.8 0.1 0.1  0.3 0.2
object end
";

const HALL: &str = "\
light d white true 2 0  0 0 0  60 0 0
object begin
mesh sphere
blinnphong gold
object end
";

fn config(scene_dir: &Path, levels: &[&str]) -> EngineConfig {
    EngineConfig {
        shader_dir: builtin_shader_dir(),
        scene_dir: scene_dir.to_path_buf(),
        levels: levels.iter().map(|l| l.to_string()).collect(),
        shader_poll_interval: 0,
        ..EngineConfig::default()
    }
}

fn engine_with_levels(name: &str) -> Engine {
    let dir = scratch_dir(name);
    std::fs::write(dir.join("room.scn"), ROOM).unwrap();
    std::fs::write(dir.join("hall.scn"), HALL).unwrap();
    let device = HeadlessDevice::new(320, 180);
    Engine::new(Box::new(device), EngineSettings::default(), config(&dir, &["room.scn", "hall.scn"])).unwrap()
}

fn pressed(keys: &[Key]) -> KeyboardState {
    let mut input = KeyboardState::new();
    for key in keys {
        input.key_pressed(*key);
    }
    input
}

#[test]
fn test_new_loads_selected_level() {
    let engine = engine_with_levels("engine_new");
    assert_eq!(engine.level(), 0);
    assert_eq!(engine.scene().object_count(), 2);
    assert_eq!(engine.scene().lights().len(), 2);
    assert_eq!(engine.shadow_pass().dimension(), 1024);
}

#[test]
fn test_new_without_levels_starts_empty() {
    let device = HeadlessDevice::new(64, 64);
    let engine = Engine::new(Box::new(device), EngineSettings::default(), config(&scratch_dir("engine_empty"), &[])).unwrap();
    assert_eq!(engine.scene().object_count(), 0);
}

#[test]
fn test_missing_shaders_fail_construction() {
    let dir = scratch_dir("engine_no_shaders");
    let mut config = config(&dir, &[]);
    config.shader_dir = dir.clone();
    let result = Engine::new(Box::new(HeadlessDevice::new(64, 64)), EngineSettings::default(), config);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_tick_renders_and_presents() {
    let device = HeadlessDevice::new(320, 180);
    let recorder = device.recorder();
    let dir = scratch_dir("engine_tick");
    std::fs::write(dir.join("room.scn"), ROOM).unwrap();
    let mut engine = Engine::new(Box::new(device), EngineSettings::default(), config(&dir, &["room.scn"])).unwrap();

    engine.tick(1.0 / 60.0, &KeyboardState::new()).unwrap();
    assert_eq!(recorder.presents(), 1);
    assert_eq!(engine.stats().frame_count, 1);
    assert_eq!(engine.stats().objects_drawn, 2);

    let frame = recorder.last_frame_commands();
    let position = |name: &str| frame.iter().position(|c| c == &format!("begin_event({})", name)).unwrap();
    assert!(position("Shadow map") < position("Forward"));
    assert!(position("Forward") < position("Bloom"));
    assert!(position("Bloom") < position("Tonemapping"));
    assert_eq!(frame.last().map(String::as_str), Some("present(vsync=true)"));
}

#[test]
fn test_toggles() {
    let mut engine = engine_with_levels("engine_toggles");
    let start = engine.settings().rendering;

    engine.tick(0.016, &pressed(&[Key::F1, Key::F3, Key::F5, Key::F2])).unwrap();
    let rendering = engine.settings().rendering;
    assert_eq!(rendering.use_brdf_lighting, !start.use_brdf_lighting);
    assert_eq!(rendering.bloom.enabled, !start.bloom.enabled);
    assert_eq!(rendering.deferred_rendering, !start.deferred_rendering);
    assert_eq!(rendering.ambient_occlusion, !start.ambient_occlusion);

    // deferred, no bloom, Blinn-Phong
    engine.tick(0.016, &KeyboardState::new()).unwrap();
    assert_eq!(engine.stats().objects_drawn, 2);
    assert_eq!(engine.settings().rendering, rendering);
}

#[test]
fn test_pause_freezes_simulation() {
    let mut engine = engine_with_levels("engine_pause");
    let start = engine.scene().camera().position();

    let mut input = pressed(&[Key::Backspace, Key::W]);
    engine.tick(0.1, &input).unwrap();
    assert!(engine.is_paused());
    assert_eq!(engine.scene().camera().position(), start);
    assert_eq!(engine.stats().frame_count, 1);

    input.end_frame();
    input.key_released(Key::Backspace);
    input.key_pressed(Key::Backspace);
    engine.tick(0.1, &input).unwrap();
    assert!(!engine.is_paused());
    assert_ne!(engine.scene().camera().position(), start);
}

#[test]
fn test_level_keys_and_scene_reload() {
    let mut engine = engine_with_levels("engine_levels");
    engine.tick(0.016, &pressed(&[Key::Digit2])).unwrap();
    assert_eq!(engine.level(), 1);
    assert_eq!(engine.scene().object_count(), 1);

    // no level 3 configured
    engine.tick(0.016, &pressed(&[Key::Digit3])).unwrap();
    assert_eq!(engine.level(), 1);

    let material = engine.scene().default_material();
    engine.scene_mut().spawn(crate::scene::Transform::IDENTITY, crate::resource::BuiltinMesh::Cube, material);
    assert_eq!(engine.scene().object_count(), 2);
    engine.tick(0.016, &pressed(&[Key::Shift, Key::R])).unwrap();
    assert_eq!(engine.scene().object_count(), 1);
}

#[test]
#[serial]
fn test_failed_level_keeps_scene() {
    let dir = scratch_dir("engine_bad_level");
    std::fs::write(dir.join("room.scn"), ROOM).unwrap();
    let config = config(&dir, &["room.scn", "missing.scn"]);
    let mut engine = Engine::new(Box::new(HeadlessDevice::new(64, 64)), EngineSettings::default(), config).unwrap();

    let logger = MemoryLogger::new();
    Engine::set_logger(logger.clone());
    engine.tick(0.016, &pressed(&[Key::Digit2])).unwrap();
    Engine::reset_logger();

    assert_eq!(engine.level(), 0);
    assert_eq!(engine.scene().object_count(), 2);
    assert!(logger.contains("keeping the current scene"));
}

#[test]
fn test_resize_follows_window() {
    let mut engine = engine_with_levels("engine_resize");
    let projection = engine.scene().camera().projection_matrix();
    engine.resize(640, 640).unwrap();
    assert_eq!(engine.renderer().size(), (640, 640));
    assert_eq!(engine.settings().window.width, 640);
    assert_ne!(engine.scene().camera().projection_matrix(), projection);
    engine.tick(0.016, &KeyboardState::new()).unwrap();

    // minimized windows are ignored
    engine.resize(0, 0).unwrap();
    assert_eq!(engine.renderer().size(), (640, 640));
}

#[test]
fn test_shadow_dimension_setting() {
    let mut engine = engine_with_levels("engine_shadow");
    let mut rendering = engine.settings().rendering;
    rendering.shadow_map.dimension = 512;
    engine.set_rendering_settings(rendering).unwrap();
    assert_eq!(engine.shadow_pass().dimension(), 512);

    rendering.shadow_map.dimension = 0;
    assert!(engine.set_rendering_settings(rendering).is_err());
    assert_eq!(engine.settings().rendering.shadow_map.dimension, 512);
}

#[test]
fn test_fps_is_averaged_per_second() {
    let mut stats = FrameStats::default();
    for _ in 0..3 {
        stats.record(0.25, 3);
    }
    assert_eq!(stats.fps, 0.0);
    stats.record(0.25, 3);
    assert_eq!(stats.fps, 4.0);
    assert_eq!(stats.frame_count, 4);
    assert_eq!(stats.objects_drawn, 3);
}

#[test]
#[serial]
fn test_log_routes_to_installed_logger() {
    let logger = MemoryLogger::new();
    Engine::set_logger(logger.clone());
    Engine::log(LogSeverity::Info, "test::Engine", "hello".to_string());
    Engine::log_detailed(LogSeverity::Error, "test::Engine", "boom".to_string(), "engine.rs", 7);
    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "test::Engine", "not captured".to_string());

    let entries = logger.entries_from("test::Engine");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].file, None);
    assert_eq!((entries[1].file, entries[1].line), (Some("engine.rs"), Some(7)));
}
