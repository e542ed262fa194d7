//! # Prism3D Demo
//!
//! Opens a window, loads `settings.ini` and the level list from the data
//! directory and drives the engine once per redraw.
//!
//! Keys: WASD/QE move, Shift runs, Backspace pauses, F1 lighting model,
//! F2 ambient occlusion, F3 bloom, F5 forward/deferred, `\` reload shaders,
//! Shift+R reload the level, 1..4 switch level, Escape quits.
//!
//! Usage: `prism_3d_demo [data_dir]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use prism_3d_engine::prism3d::device::{GraphicsDevice, HeadlessDevice};
use prism_3d_engine::prism3d::input::{Key, KeyboardState};
use prism_3d_engine::prism3d::settings::{load_settings, EngineSettings};
use prism_3d_engine::prism3d::{Engine, EngineConfig};
use prism_3d_engine::{engine_error, engine_info, engine_warn};
use prism_3d_engine_renderer_vulkan::VulkanDevice;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

const SOURCE: &str = "prism3d::Demo";
const TITLE: &str = "Prism3D";

/// Longest simulated step; longer frames (debugger, window drag) are clamped
const MAX_FRAME_TIME: f32 = 0.1;

struct DemoApp {
    settings: EngineSettings,
    config: EngineConfig,
    // Dropped before the window: the device's surface refers to it
    engine: Option<Engine>,
    window: Option<Window>,
    input: KeyboardState,
    last_frame: Instant,
    /// Set when start-up failed; turned into the exit code
    failure: Option<String>,
}

impl DemoApp {
    fn new(settings: EngineSettings, config: EngineConfig) -> Self {
        Self {
            settings,
            config,
            engine: None,
            window: None,
            input: KeyboardState::new(),
            last_frame: Instant::now(),
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, message: String) {
        engine_error!(SOURCE, "{}", message);
        self.failure = Some(message);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(MAX_FRAME_TIME);
        self.last_frame = now;

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if let Err(e) = engine.tick(dt, &self.input) {
            self.fail(event_loop, format!("Frame failed: {}", e));
            return;
        }
        self.input.end_frame();

        let stats = *engine.stats();
        if let Some(window) = &self.window {
            if stats.frame_count % 60 == 0 {
                let rendering = engine.settings().rendering;
                window.set_title(&format!(
                    "{} - {:.0} fps - {} objects - {} {}",
                    TITLE,
                    stats.fps,
                    stats.objects_drawn,
                    if rendering.deferred_rendering { "deferred" } else { "forward" },
                    if rendering.use_brdf_lighting { "BRDF" } else { "Blinn-Phong" },
                ));
            }
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_settings = self.settings.window;
        let mut attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(window_settings.width, window_settings.height));
        if window_settings.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => return self.fail(event_loop, format!("Cannot create the window: {}", e)),
        };
        let size = window.inner_size();
        let device = create_device(&window, size.width.max(1), size.height.max(1));
        match Engine::new(device, self.settings, self.config.clone()) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.last_frame = Instant::now();
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, format!("Cannot start the engine: {}", e)),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                engine_info!(SOURCE, "Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = self.engine.as_mut() {
                    if let Err(e) = engine.resize(size.width, size.height) {
                        engine_warn!(SOURCE, "Resize to {}x{} failed: {}", size.width, size.height, e);
                    }
                }
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let Some(key) = map_key(code) else {
                    return;
                };
                match event.state {
                    ElementState::Pressed if key == Key::Escape => event_loop.exit(),
                    ElementState::Pressed => self.input.key_pressed(key),
                    ElementState::Released => self.input.key_released(key),
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input.add_mouse_delta(dx as f32, dy as f32);
        }
    }
}

/// Vulkan device on the window, the headless one when Vulkan is unavailable
fn create_device(window: &Window, width: u32, height: u32) -> Box<dyn GraphicsDevice> {
    match VulkanDevice::new(window, width, height) {
        Ok(device) => Box::new(device),
        Err(e) => {
            engine_warn!(SOURCE, "Vulkan unavailable ({}), rendering headless", e);
            Box::new(HeadlessDevice::new(width, height))
        }
    }
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyR => Key::R,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Backslash => Key::Backslash,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F5 => Key::F5,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    };
    Some(key)
}

fn main() -> ExitCode {
    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data"));

    let settings = match load_settings(data_dir.join("settings.ini")) {
        Ok(settings) => settings,
        Err(e) => {
            engine_warn!(SOURCE, "Using default settings: {}", e);
            EngineSettings::default()
        }
    };
    let config = EngineConfig {
        shader_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../prism_3d_engine/shaders"),
        scene_dir: data_dir.join("scenes"),
        shader_log_dir: Some(data_dir.join("logs")),
        ..EngineConfig::default()
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            engine_error!(SOURCE, "Cannot create the event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut app = DemoApp::new(settings, config);
    if let Err(e) = event_loop.run_app(&mut app) {
        engine_error!(SOURCE, "Event loop error: {}", e);
        return ExitCode::FAILURE;
    }
    // Device teardown may still produce validation messages
    app.engine = None;
    #[cfg(feature = "vulkan-validation")]
    prism_3d_engine_renderer_vulkan::print_validation_stats_report();

    match app.failure {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    }
}
