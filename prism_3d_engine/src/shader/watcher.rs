/// Shader hot-reload polling
///
/// Each `Shader` remembers the modification times of its stage files when
/// it is compiled. The watcher only decides when to look: every
/// `interval_frames` frames it asks the renderer to rebuild the shaders
/// whose files changed. Swaps happen inside `poll`, between frames.

use crate::engine_debug;
use crate::renderer::Renderer;

const SOURCE: &str = "prism3d::ShaderWatcher";

#[derive(Debug, Clone)]
pub struct ShaderWatcher {
    interval_frames: u32,
    frames_since_poll: u32,
    enabled: bool,
}

impl ShaderWatcher {
    /// Poll every `interval_frames` frames; 0 disables polling
    pub fn new(interval_frames: u32) -> Self {
        Self {
            interval_frames,
            frames_since_poll: 0,
            enabled: interval_frames > 0,
        }
    }

    pub fn interval_frames(&self) -> u32 {
        self.interval_frames
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.interval_frames > 0;
        self.frames_since_poll = 0;
    }

    /// Advance one frame; true when a poll is due
    pub fn tick(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        self.frames_since_poll += 1;
        if self.frames_since_poll >= self.interval_frames {
            self.frames_since_poll = 0;
            return true;
        }
        false
    }

    /// Advance one frame and reload changed shaders when due
    ///
    /// Returns the number of shaders swapped in.
    pub fn poll(&mut self, renderer: &mut Renderer) -> usize {
        if !self.tick() {
            return 0;
        }
        let reloaded = renderer.reload_changed_shaders();
        if reloaded > 0 {
            engine_debug!(SOURCE, "{} shader(s) reloaded", reloaded);
        }
        reloaded
    }
}

impl Default for ShaderWatcher {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
