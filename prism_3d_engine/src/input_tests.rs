/// Unit tests for input.rs

use super::*;

#[test]
fn test_press_triggers_once() {
    let mut keys = KeyboardState::new();
    keys.key_pressed(Key::W);
    assert!(keys.is_key_down(Key::W));
    assert!(keys.is_key_triggered(Key::W));

    keys.end_frame();
    keys.key_pressed(Key::W); // OS repeat
    assert!(keys.is_key_down(Key::W));
    assert!(!keys.is_key_triggered(Key::W));
}

#[test]
fn test_release() {
    let mut keys = KeyboardState::new();
    keys.key_pressed(Key::Shift);
    keys.key_released(Key::Shift);
    assert!(!keys.is_key_down(Key::Shift));
    keys.key_pressed(Key::Shift);
    assert!(keys.is_key_triggered(Key::Shift));
}

#[test]
fn test_mouse_delta_accumulates_per_frame() {
    let mut keys = KeyboardState::new();
    keys.add_mouse_delta(3.0, -1.0);
    keys.add_mouse_delta(2.0, 4.0);
    assert_eq!(keys.mouse_delta(), Vec2::new(5.0, 3.0));
    keys.end_frame();
    assert_eq!(keys.mouse_delta(), Vec2::ZERO);
}

#[test]
fn test_release_all() {
    let mut keys = KeyboardState::new();
    keys.key_pressed(Key::A);
    keys.add_mouse_delta(1.0, 1.0);
    keys.release_all();
    assert!(!keys.is_key_down(Key::A));
    assert!(!keys.is_key_triggered(Key::A));
    assert_eq!(keys.mouse_delta(), Vec2::ZERO);
}
