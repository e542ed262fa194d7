/// Input collaborator
///
/// The engine only asks questions about keys and mouse motion. The window
/// layer owns the event pump and feeds a `KeyboardState` (or any other
/// `Input` implementation).

use glam::Vec2;
use rustc_hash::FxHashSet;

/// Keys the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    R,
    Shift,
    Backspace,
    Backslash,
    F1,
    F2,
    F3,
    F5,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Escape,
}

impl Key {
    /// Level keys in order (`1` loads level 0)
    pub const LEVELS: [Key; 4] = [Key::Digit1, Key::Digit2, Key::Digit3, Key::Digit4];
}

pub trait Input {
    /// Key is held this frame
    fn is_key_down(&self, key: Key) -> bool;

    /// Key went down this frame
    fn is_key_triggered(&self, key: Key) -> bool;

    /// Mouse motion accumulated this frame, in pixels
    fn mouse_delta(&self) -> Vec2;
}

/// Frame-based key tracker
///
/// `end_frame` clears the per-frame data (triggers and mouse motion); held
/// keys persist until released.
#[derive(Debug, Default, Clone)]
pub struct KeyboardState {
    down: FxHashSet<Key>,
    triggered: FxHashSet<Key>,
    mouse_delta: Vec2,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_pressed(&mut self, key: Key) {
        // OS key repeat must not re-trigger
        if self.down.insert(key) {
            self.triggered.insert(key);
        }
    }

    pub fn key_released(&mut self, key: Key) {
        self.down.remove(&key);
    }

    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_delta += Vec2::new(dx, dy);
    }

    pub fn end_frame(&mut self) {
        self.triggered.clear();
        self.mouse_delta = Vec2::ZERO;
    }

    /// Forget everything, e.g. on focus loss
    pub fn release_all(&mut self) {
        self.down.clear();
        self.end_frame();
    }
}

impl Input for KeyboardState {
    fn is_key_down(&self, key: Key) -> bool {
        self.down.contains(&key)
    }

    fn is_key_triggered(&self, key: Key) -> bool {
        self.triggered.contains(&key)
    }

    fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }
}

#[cfg(test)]
#[path = "input_tests.rs"]
mod tests;
