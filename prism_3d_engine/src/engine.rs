/// Prism3D Engine - frame orchestrator and process-wide logger
///
/// The engine owns the renderer and everything that draws through it: the
/// built-in shaders, the three passes, the shader watcher and the current
/// scene. The window layer constructs it once with a graphics device and
/// calls `tick` every frame.
///
/// Logging is the only process-wide state: the logger lives in a static
/// slot so that any module can log through the `engine_*!` macros.

use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::error::{Error, Result};
use crate::graphics_device::GraphicsDevice;
use crate::input::{Input, Key};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::passes::{FrameContext, GeometryPass, PostProcessPass, ShaderLibrary, ShadowPass};
use crate::renderer::{Renderer, RendererConfig};
use crate::scene::{load_scene, Scene, SceneView, DEFAULT_MATERIAL_CAPACITY};
use crate::settings::{EngineSettings, RenderingSettings};
use crate::shader::ShaderWatcher;
use crate::{engine_err, engine_info, engine_warn};

const SOURCE: &str = "prism3d::Engine";

/// Global logger (DefaultLogger until replaced)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Where the engine finds its content, and how it watches it
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory of the built-in `<shader>_vs.wgsl` / `<shader>_ps.wgsl` files
    pub shader_dir: PathBuf,
    /// Directory of the level files
    pub scene_dir: PathBuf,
    /// Level file names, selected by `EngineSettings::level` and keys 1..4
    pub levels: Vec<String>,
    /// Frames between two shader hot-reload polls; 0 disables hot reload
    pub shader_poll_interval: u32,
    /// Materials per shading model in each scene
    pub material_capacity: u32,
    /// Where shader compile error logs are written
    pub shader_log_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
            scene_dir: PathBuf::from("data/scenes"),
            levels: ["Room.scn", "Gallery.scn", "Lights.scn", "Shadows.scn"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            shader_poll_interval: 60,
            material_capacity: DEFAULT_MATERIAL_CAPACITY,
            shader_log_dir: None,
        }
    }
}

/// Counters refreshed every tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frame_count: u64,
    /// Frames per second, averaged over the last full second
    pub fps: f32,
    /// Objects drawn by the geometry pass in the last frame
    pub objects_drawn: usize,
    window_time: f32,
    window_frames: u32,
}

impl FrameStats {
    fn record(&mut self, dt: f32, objects_drawn: usize) {
        self.frame_count += 1;
        self.objects_drawn = objects_drawn;
        self.window_time += dt;
        self.window_frames += 1;
        if self.window_time >= 1.0 {
            self.fps = self.window_frames as f32 / self.window_time;
            self.window_time = 0.0;
            self.window_frames = 0;
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    renderer: Renderer,
    settings: EngineSettings,
    config: EngineConfig,
    shaders: ShaderLibrary,
    shadow_pass: ShadowPass,
    geometry_pass: GeometryPass,
    post_process: PostProcessPass,
    watcher: ShaderWatcher,
    scene: Scene,
    level: usize,
    paused: bool,
    stats: FrameStats,
}

impl Engine {
    /// Build the renderer on `device`, compile the built-in shaders, create
    /// the passes and load the level selected by `settings.level`
    ///
    /// With an empty level list the engine starts on an empty scene.
    pub fn new(device: Box<dyn GraphicsDevice>, settings: EngineSettings, config: EngineConfig) -> Result<Self> {
        let renderer_config = RendererConfig {
            vsync: settings.window.vsync,
            shader_log_dir: config.shader_log_dir.clone(),
        };
        let mut renderer = Renderer::new(device, renderer_config)?;
        let shaders = ShaderLibrary::load(&mut renderer, &config.shader_dir)?;

        let (width, height) = renderer.size();
        let shadow_pass = ShadowPass::new(&mut renderer, settings.rendering.shadow_map.dimension)?;
        let geometry_pass = GeometryPass::new(&mut renderer, width, height)?;
        let post_process = PostProcessPass::new(&mut renderer, width, height)?;
        let scene = Scene::new(renderer.aspect_ratio(), config.material_capacity)?;
        let watcher = ShaderWatcher::new(config.shader_poll_interval);

        let mut engine = Self {
            renderer,
            settings,
            config,
            shaders,
            shadow_pass,
            geometry_pass,
            post_process,
            watcher,
            scene,
            level: settings.level,
            paused: false,
            stats: FrameStats::default(),
        };
        if !engine.config.levels.is_empty() {
            engine.load_level(settings.level)?;
        }
        engine_info!(SOURCE, "Engine ready ({}x{}, {} rendering)", width, height,
            if settings.rendering.deferred_rendering { "deferred" } else { "forward" });
        Ok(engine)
    }

    // ===== FRAME =====

    /// Run one frame: commands, simulation, shadow, geometry, post-process,
    /// present, then the shader hot-reload poll
    pub fn tick(&mut self, dt: f32, input: &dyn Input) -> Result<()> {
        self.handle_commands(input);
        if !self.paused {
            self.scene.update(dt, input);
        }

        let lighting = self.scene.gather_lights();
        let view = SceneView::new(
            self.scene.camera(),
            self.settings.rendering.deferred_rendering,
            self.renderer.size(),
        );
        let frame = FrameContext {
            scene: &self.scene,
            view: &view,
            lighting: &lighting,
            settings: &self.settings.rendering,
        };

        self.renderer.begin_frame();
        self.shadow_pass.render(&mut self.renderer, &self.shaders, &frame)?;
        let shadow_map = self.shadow_pass.shadow_map(&self.renderer);
        let drawn = self.geometry_pass.render(&mut self.renderer, &self.shaders, &frame, shadow_map)?;
        let world = self.geometry_pass.world_texture(&self.renderer);
        self.post_process.render(&mut self.renderer, &self.shaders, &self.settings.rendering, world)?;
        self.renderer.end()?;

        self.watcher.poll(&mut self.renderer);
        self.stats.record(dt, drawn);
        Ok(())
    }

    /// Key toggles; failures are logged and the frame goes on
    fn handle_commands(&mut self, input: &dyn Input) {
        let rendering = &mut self.settings.rendering;
        if input.is_key_triggered(Key::Backspace) {
            self.paused = !self.paused;
            engine_info!(SOURCE, "{}", if self.paused { "Paused" } else { "Resumed" });
        }
        if input.is_key_triggered(Key::F1) {
            rendering.use_brdf_lighting = !rendering.use_brdf_lighting;
            engine_info!(SOURCE, "Lighting model: {}",
                if rendering.use_brdf_lighting { "BRDF" } else { "Blinn-Phong" });
        }
        if input.is_key_triggered(Key::F2) {
            rendering.ambient_occlusion = !rendering.ambient_occlusion;
            engine_info!(SOURCE, "Ambient occlusion: {}", rendering.ambient_occlusion);
        }
        if input.is_key_triggered(Key::F3) {
            rendering.bloom.enabled = !rendering.bloom.enabled;
            engine_info!(SOURCE, "Bloom: {}", rendering.bloom.enabled);
        }
        if input.is_key_triggered(Key::F5) {
            rendering.deferred_rendering = !rendering.deferred_rendering;
            engine_info!(SOURCE, "{} rendering",
                if rendering.deferred_rendering { "Deferred" } else { "Forward" });
        }
        if input.is_key_triggered(Key::Backslash) {
            let reloaded = self.renderer.reload_all_shaders();
            engine_info!(SOURCE, "Reloaded {} shader(s)", reloaded);
        }
        if input.is_key_triggered(Key::R) && input.is_key_down(Key::Shift) {
            if let Err(e) = self.reload_scene() {
                engine_warn!(SOURCE, "Scene reload failed, keeping the current scene: {}", e);
            }
        }
        for (index, key) in Key::LEVELS.iter().enumerate() {
            if input.is_key_triggered(*key) && index < self.config.levels.len() {
                if let Err(e) = self.load_level(index) {
                    engine_warn!(SOURCE, "Level {} failed to load, keeping the current scene: {}", index + 1, e);
                }
            }
        }
    }

    // ===== LEVELS =====

    /// Replace the scene with level `index` of the configured list
    ///
    /// The current scene is kept when the file cannot be read.
    pub fn load_level(&mut self, index: usize) -> Result<()> {
        let Some(name) = self.config.levels.get(index) else {
            return Err(engine_err!(SOURCE, "No level {} ({} configured)", index, self.config.levels.len()));
        };
        let path = self.config.scene_dir.join(name);
        let description = load_scene(&path)?;
        for problem in &description.problems {
            engine_warn!(SOURCE, "{}: {}", path.display(), problem);
        }
        let mut scene = Scene::from_description(&description, self.renderer.aspect_ratio(), self.config.material_capacity)?;
        if let Some(file) = &description.skybox {
            let texture = self.renderer.create_texture_from_file(file);
            if texture.is_valid() {
                scene.set_skybox(texture);
            } else {
                engine_warn!(SOURCE, "{}: skybox {} not loaded, drawing without one", path.display(), file.display());
            }
        }
        self.set_scene(scene);
        self.level = index;
        engine_info!(SOURCE, "Level {} loaded from {}", index + 1, path.display());
        Ok(())
    }

    /// Reload the current level from disk
    pub fn reload_scene(&mut self) -> Result<()> {
        self.load_level(self.level)
    }

    /// Replace the scene directly (procedural content, tests)
    ///
    /// The replaced scene's skybox texture is released.
    pub fn set_scene(&mut self, scene: Scene) {
        let previous = std::mem::replace(&mut self.scene, scene);
        if previous.skybox().is_valid() && previous.skybox() != self.scene.skybox() {
            self.renderer.destroy_texture(previous.skybox());
        }
    }

    // ===== WINDOW AND SETTINGS =====

    /// Resize the back buffer and every screen-sized target
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            // minimized
            return Ok(());
        }
        self.renderer.resize(width, height)?;
        self.geometry_pass.resize(&mut self.renderer, width, height)?;
        self.post_process.resize(&mut self.renderer, width, height)?;
        self.scene.camera_mut().set_aspect(self.renderer.aspect_ratio());
        self.settings.window.width = width;
        self.settings.window.height = height;
        Ok(())
    }

    /// Replace the rendering settings; the shadow map follows its dimension
    pub fn set_rendering_settings(&mut self, rendering: RenderingSettings) -> Result<()> {
        if rendering.shadow_map.dimension == 0 {
            return Err(Error::InvalidResource("shadow map dimension must be positive".to_string()));
        }
        self.shadow_pass.set_dimension(&mut self.renderer, rendering.shadow_map.dimension)?;
        self.settings.rendering = rendering;
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow_pass
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn watcher_mut(&mut self) -> &mut ShaderWatcher {
        &mut self.watcher
    }

    // ===== LOGGING =====

    /// Install a custom logger for the whole process
    ///
    /// # Example
    ///
    /// ```no_run
    /// use prism_3d_engine::prism3d::Engine;
    /// use prism_3d_engine::prism3d::log::{DefaultLogger, LogSeverity};
    ///
    /// Engine::set_logger(DefaultLogger::new(LogSeverity::Warn));
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(logger_impl);
        }
    }

    /// Back to the colored console logger
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Entry point of engine_trace! .. engine_warn!
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Entry point of engine_error!, with the call site
    pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        if let Ok(lock) = logger().read() {
            lock.log(&entry);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
