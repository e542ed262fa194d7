/// Unit tests for watcher.rs

use super::*;
use std::time::{Duration, SystemTime};
use crate::graphics_device::{HeadlessDevice, VertexLayout};
use crate::renderer::RendererConfig;
use crate::shader::ShaderDesc;
use crate::test_support::{scratch_dir, BASIC_PS, BASIC_VS};

#[test]
fn test_tick_fires_every_interval() {
    let mut watcher = ShaderWatcher::new(3);
    let fired: Vec<bool> = (0..7).map(|_| watcher.tick()).collect();
    assert_eq!(fired, vec![false, false, true, false, false, true, false]);
}

#[test]
fn test_zero_interval_never_fires() {
    let mut watcher = ShaderWatcher::new(0);
    assert!(!watcher.is_enabled());
    assert!((0..100).all(|_| !watcher.tick()));

    watcher.set_enabled(true);
    assert!(!watcher.is_enabled());
}

#[test]
fn test_disable_and_restart_count() {
    let mut watcher = ShaderWatcher::new(2);
    assert!(!watcher.tick());
    watcher.set_enabled(false);
    assert!(!watcher.tick());
    assert!(!watcher.tick());

    watcher.set_enabled(true);
    assert!(!watcher.tick());
    assert!(watcher.tick());
}

#[test]
fn test_poll_reloads_touched_shader() {
    let device = HeadlessDevice::new(64, 64);
    let mut renderer = Renderer::new(Box::new(device), RendererConfig::default()).unwrap();
    let dir = scratch_dir("watcher_poll");
    std::fs::write(dir.join("basic_vs.wgsl"), BASIC_VS).unwrap();
    std::fs::write(dir.join("basic_ps.wgsl"), BASIC_PS).unwrap();
    let id = renderer.create_shader(ShaderDesc::new("basic", &dir, VertexLayout::standard()));
    assert!(id.is_valid());

    let mut watcher = ShaderWatcher::new(2);
    assert_eq!(watcher.poll(&mut renderer), 0);
    assert_eq!(watcher.poll(&mut renderer), 0);

    let file = std::fs::File::options().write(true).open(dir.join("basic_vs.wgsl")).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(30)).unwrap();

    // Not due yet
    assert_eq!(watcher.poll(&mut renderer), 0);
    assert_eq!(watcher.poll(&mut renderer), 1);
    assert!(renderer.shader(id).unwrap().cbuffers().iter().all(|cb| cb.is_dirty()));
}
