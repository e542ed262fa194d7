/// The renderer façade
///
/// Every pass drives the GPU through one protocol:
///
/// ```text
/// set_shader(id) -> set_buffer_obj(id) -> set_constant / set_texture / set_sampler
///     -> apply() -> draw_indexed() [-> draw_indexed() ...] -> reset()
/// ```
///
/// `set_*` calls only touch CPU-side state. `apply` is the one place
/// where that state reaches the device: dirty constant buffers are
/// uploaded (clean ones are only rebound), then the stage programs, input
/// layout, buffers, fixed-function states and texture/sampler slots are
/// bound. `draw_indexed` never applies on its own.
///
/// Resource creation follows the handle contract of the tables: failures
/// are logged and return the `INVALID` handle, lookups of dead handles
/// are rejected with an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use bytemuck::Pod;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use crate::graphics_device::{
    BufferUsage, CullMode, DepthStencilDesc, FillMode, GraphicsDevice, IndexType,
    PrimitiveTopology, RasterizerDesc, Sampler, SamplerDesc, ShaderStage, Texture,
    TextureDesc, TextureFormat, Viewport,
};
use crate::resource::{
    BufferId, BuiltinMesh, DepthStencilStateId, DepthTargetId, GeometryGenerator, MeshData, RasterizerStateId,
    RenderTargetId, ResourceTable, SamplerId, ShaderId, TextureId, Vertex,
};
use crate::shader::{Shader, ShaderDesc};
use super::buffer_object::BufferObject;
use super::render_states::{DefaultDepthStencilState, DefaultRasterizerState, DefaultSampler};
use super::render_stats::RenderStats;
use super::render_target::{DepthTarget, RenderTarget};

const SOURCE: &str = "prism3d::Renderer";

// ============================================================================
// CONFIGURATION AND STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Wait for vertical blank on present
    pub vsync: bool,
    /// Where `<shader>_compile_error.log` files go
    pub shader_log_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { vsync: true, shader_log_dir: None }
    }
}

/// Position in the set / apply / draw protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    /// Nothing selected (start-up, after `reset`)
    Idle,
    /// A shader is selected, or state changed since the last apply
    ShaderBound,
    /// A shader and a buffer object are selected, not yet applied
    BufferBound,
    /// Device state matches the selection
    Applied,
    /// At least one draw since the last apply
    Drawn,
}

struct TextureEntry {
    texture: Arc<dyn Texture>,
    /// Canonical source path of file-loaded textures
    path: Option<PathBuf>,
}

// ============================================================================
// RENDERER
// ============================================================================

pub struct Renderer {
    device: Box<dyn GraphicsDevice>,
    config: RendererConfig,

    shaders: ResourceTable<ShaderId, Shader>,
    textures: ResourceTable<TextureId, TextureEntry>,
    texture_cache: FxHashMap<PathBuf, TextureId>,
    buffers: ResourceTable<BufferId, BufferObject>,
    samplers: ResourceTable<SamplerId, Arc<dyn Sampler>>,
    render_targets: ResourceTable<RenderTargetId, RenderTarget>,
    depth_targets: ResourceTable<DepthTargetId, DepthTarget>,
    rasterizer_states: ResourceTable<RasterizerStateId, RasterizerDesc>,
    depth_stencil_states: ResourceTable<DepthStencilStateId, DepthStencilDesc>,

    default_rasterizers: Vec<RasterizerStateId>,
    default_depth_stencils: Vec<DepthStencilStateId>,
    default_samplers: Vec<SamplerId>,
    builtin_meshes: FxHashMap<BuiltinMesh, BufferId>,
    /// Tangent / bitangent / normal line lists per source buffer object
    tangent_frames: FxHashMap<BufferId, [BufferId; 3]>,
    back_buffer: RenderTargetId,

    state: DrawState,
    active_shader: ShaderId,
    active_buffer: BufferId,
    rasterizer_state: RasterizerStateId,
    depth_stencil_state: DepthStencilStateId,
    viewport: Viewport,
    pending_textures: BTreeMap<(ShaderStage, u32), TextureId>,
    pending_samplers: BTreeMap<(ShaderStage, u32), SamplerId>,
    /// Texture slots currently bound on the device
    device_textures: BTreeMap<(ShaderStage, u32), TextureId>,
    bound_targets: Vec<RenderTargetId>,
    bound_depth: DepthTargetId,

    warned_names: FxHashSet<(ShaderId, String)>,
    stats: RenderStats,
}

impl Renderer {
    /// Take ownership of a device and create the default resources
    ///
    /// Default rasterizer, depth-stencil and sampler states plus the
    /// built-in meshes are created here; any failure is fatal.
    pub fn new(mut device: Box<dyn GraphicsDevice>, config: RendererConfig) -> Result<Self> {
        let back_texture = device.back_buffer();
        let (width, height) = (back_texture.desc().width, back_texture.desc().height);

        let mut rasterizer_states = ResourceTable::new();
        let default_rasterizers = DefaultRasterizerState::ALL
            .iter()
            .map(|state| rasterizer_states.insert(state.desc()))
            .collect::<Vec<_>>();

        let mut depth_stencil_states = ResourceTable::new();
        let default_depth_stencils = DefaultDepthStencilState::ALL
            .iter()
            .map(|state| depth_stencil_states.insert(state.desc()))
            .collect::<Vec<_>>();

        let mut samplers = ResourceTable::new();
        let mut default_samplers = Vec::new();
        for sampler in DefaultSampler::ALL {
            let created = device.create_sampler(sampler.desc())
                .map_err(|e| engine_err!(SOURCE, "Default sampler {:?}: {}", sampler, e))?;
            default_samplers.push(samplers.insert(created));
        }

        let mut buffers = ResourceTable::new();
        let mut builtin_meshes = FxHashMap::default();
        for mesh in BuiltinMesh::ALL {
            let object = BufferObject::create(device.as_mut(), &mesh.generate(), BufferUsage::Immutable)
                .map_err(|e| engine_err!(SOURCE, "Built-in mesh '{}': {}", mesh.name(), e))?;
            builtin_meshes.insert(mesh, buffers.insert(object));
        }

        let mut render_targets = ResourceTable::new();
        let back_buffer = render_targets.insert(RenderTarget {
            texture: back_texture,
            view: TextureId::INVALID,
        });

        engine_info!(SOURCE, "Renderer initialized on '{}' device ({}x{})", device.name(), width, height);

        Ok(Self {
            device,
            config,
            shaders: ResourceTable::new(),
            textures: ResourceTable::new(),
            texture_cache: FxHashMap::default(),
            buffers,
            samplers,
            render_targets,
            depth_targets: ResourceTable::new(),
            rasterizer_states,
            depth_stencil_states,
            rasterizer_state: default_rasterizers[DefaultRasterizerState::CullNone as usize],
            depth_stencil_state: default_depth_stencils[DefaultDepthStencilState::DepthWrite as usize],
            default_rasterizers,
            default_depth_stencils,
            default_samplers,
            builtin_meshes,
            tangent_frames: FxHashMap::default(),
            back_buffer,
            state: DrawState::Idle,
            active_shader: ShaderId::INVALID,
            active_buffer: BufferId::INVALID,
            viewport: Viewport::from_size(width, height),
            pending_textures: BTreeMap::new(),
            pending_samplers: BTreeMap::new(),
            device_textures: BTreeMap::new(),
            bound_targets: Vec::new(),
            bound_depth: DepthTargetId::INVALID,
            warned_names: FxHashSet::default(),
            stats: RenderStats::default(),
        })
    }

    // ===== DEVICE =====

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    /// Back buffer size in pixels
    pub fn size(&self) -> (u32, u32) {
        let desc = *self.device.back_buffer().desc();
        (desc.width, desc.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.size();
        width as f32 / height.max(1) as f32
    }

    pub fn vsync(&self) -> bool {
        self.config.vsync
    }

    pub fn set_vsync(&mut self, vsync: bool) {
        self.config.vsync = vsync;
    }

    /// Resize the swap chain; size-dependent targets are the caller's to recreate
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.resize(width, height)?;
        let texture = self.device.back_buffer();
        if let Some(target) = self.render_targets.get_mut(self.back_buffer) {
            target.texture = texture;
        }
        if self.bound_targets.contains(&self.back_buffer) {
            self.viewport = Viewport::from_size(width, height);
        }
        engine_debug!(SOURCE, "Resized to {}x{}", width, height);
        Ok(())
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn draw_state(&self) -> DrawState {
        self.state
    }

    // ===== SHADERS =====

    /// Compile a shader from its stage files
    pub fn create_shader(&mut self, desc: ShaderDesc) -> ShaderId {
        let mut shader = Shader::new(desc);
        match shader.compile(self.device.as_mut(), self.config.shader_log_dir.as_deref()) {
            Ok(()) => self.shaders.insert(shader),
            Err(_) => ShaderId::INVALID,
        }
    }

    /// Compile a shader from in-memory stage sources
    pub fn create_shader_from_source(&mut self, desc: ShaderDesc, vs_source: &str, ps_source: Option<&str>) -> ShaderId {
        let mut shader = Shader::new(desc);
        let log_dir = self.config.shader_log_dir.as_deref();
        match shader.compile_sources(self.device.as_mut(), vs_source, ps_source, log_dir) {
            Ok(()) => self.shaders.insert(shader),
            Err(_) => ShaderId::INVALID,
        }
    }

    pub fn shader(&self, id: ShaderId) -> Option<&Shader> {
        self.shaders.get(id)
    }

    /// Handle of the first shader called `name`
    pub fn find_shader(&self, name: &str) -> ShaderId {
        self.shaders
            .iter()
            .find(|(_, shader)| shader.name() == name)
            .map(|(id, _)| id)
            .unwrap_or(ShaderId::INVALID)
    }

    pub fn shader_ids(&self) -> Vec<ShaderId> {
        self.shaders.iter().map(|(id, _)| id).collect()
    }

    /// Recompile one shader from its files and swap it in on success
    ///
    /// A failed reload keeps the running program; the failure is not
    /// retried until the files change again.
    pub fn reload_shader(&mut self, id: ShaderId) -> Result<()> {
        let log_dir = self.config.shader_log_dir.as_deref();
        let shader = self.shaders.lookup(id)?;
        match shader.recompiled(self.device.as_mut(), log_dir) {
            Ok(fresh) => {
                if let Some(slot) = self.shaders.get_mut(id) {
                    *slot = fresh;
                }
                self.warned_names.retain(|(shader_id, _)| *shader_id != id);
                if self.active_shader == id {
                    self.invalidate_apply();
                }
                engine_info!(SOURCE, "Reloaded shader {}", id);
                Ok(())
            }
            Err(e) => {
                if let Some(slot) = self.shaders.get_mut(id) {
                    slot.refresh_source_times();
                }
                Err(e)
            }
        }
    }

    /// Reload every file-backed shader whose sources changed
    pub fn reload_changed_shaders(&mut self) -> usize {
        let changed: Vec<ShaderId> = self
            .shaders
            .iter()
            .filter(|(_, shader)| shader.sources_changed())
            .map(|(id, _)| id)
            .collect();
        changed.into_iter().filter(|&id| self.reload_shader(id).is_ok()).count()
    }

    /// Reload every file-backed shader unconditionally
    pub fn reload_all_shaders(&mut self) -> usize {
        let ids: Vec<ShaderId> = self
            .shaders
            .iter()
            .filter(|(_, shader)| shader.has_source_files())
            .map(|(id, _)| id)
            .collect();
        ids.into_iter().filter(|&id| self.reload_shader(id).is_ok()).count()
    }

    // ===== TEXTURES =====

    pub fn create_texture_2d(&mut self, desc: TextureDesc, data: Option<&[u8]>) -> TextureId {
        match self.device.create_texture(desc, data) {
            Ok(texture) => self.textures.insert(TextureEntry { texture, path: None }),
            Err(e) => {
                engine_error!(SOURCE, "Failed to create {}x{} texture: {}", desc.width, desc.height, e);
                TextureId::INVALID
            }
        }
    }

    /// Load a PNG / JPEG file; loading the same file twice returns the same handle
    pub fn create_texture_from_file(&mut self, path: impl AsRef<Path>) -> TextureId {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            engine_warn!(SOURCE, "create_texture_from_file called with an empty path");
            return TextureId::INVALID;
        }
        let key = match fs::canonicalize(path) {
            Ok(key) => key,
            Err(e) => {
                engine_error!(SOURCE, "Texture file {} not found: {}", path.display(), e);
                return TextureId::INVALID;
            }
        };
        if let Some(&id) = self.texture_cache.get(&key) {
            return id;
        }

        let image = match image::open(&key) {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                engine_error!(SOURCE, "Cannot decode {}: {}", key.display(), e);
                return TextureId::INVALID;
            }
        };
        let (width, height) = image.dimensions();
        let desc = TextureDesc::sampled(width, height, TextureFormat::R8G8B8A8_UNORM);
        match self.device.create_texture(desc, Some(image.as_raw())) {
            Ok(texture) => {
                let id = self.textures.insert(TextureEntry { texture, path: Some(key.clone()) });
                engine_debug!(SOURCE, "Loaded texture {} ({}x{}) as {}", key.display(), width, height, id);
                self.texture_cache.insert(key, id);
                id
            }
            Err(e) => {
                engine_error!(SOURCE, "Failed to create texture for {}: {}", key.display(), e);
                TextureId::INVALID
            }
        }
    }

    pub fn texture(&self, id: TextureId) -> Option<&Arc<dyn Texture>> {
        self.textures.get(id).map(|entry| &entry.texture)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Release a texture; views owned by render or depth targets are refused
    pub fn destroy_texture(&mut self, id: TextureId) -> bool {
        let owned_by_target = self.render_targets.iter().any(|(_, rt)| rt.view == id)
            || self.depth_targets.iter().any(|(_, dt)| dt.view == id);
        if owned_by_target {
            engine_error!(SOURCE, "{} belongs to a render target, destroy the target instead", id);
            return false;
        }
        match self.textures.remove(id) {
            Some(entry) => {
                if let Some(path) = entry.path {
                    self.texture_cache.remove(&path);
                }
                self.forget_texture(id);
                true
            }
            None => {
                engine_error!(SOURCE, "destroy_texture: {} is not live", id);
                false
            }
        }
    }

    fn forget_texture(&mut self, id: TextureId) {
        self.pending_textures.retain(|_, bound| *bound != id);
    }

    // ===== RENDER AND DEPTH TARGETS =====

    /// Sampleable colour target; its texture view is registered as well
    pub fn create_render_target(&mut self, width: u32, height: u32, format: TextureFormat) -> RenderTargetId {
        let desc = TextureDesc::render_target(width, height, format);
        match self.device.create_texture(desc, None) {
            Ok(texture) => {
                let view = self.textures.insert(TextureEntry { texture: Arc::clone(&texture), path: None });
                self.render_targets.insert(RenderTarget { texture, view })
            }
            Err(e) => {
                engine_error!(SOURCE, "Failed to create {}x{} {:?} render target: {}", width, height, format, e);
                RenderTargetId::INVALID
            }
        }
    }

    /// Sampleable 32-bit float depth target
    pub fn create_depth_target(&mut self, width: u32, height: u32) -> DepthTargetId {
        let desc = TextureDesc::depth_target(width, height, TextureFormat::D32_FLOAT);
        match self.device.create_texture(desc, None) {
            Ok(texture) => {
                let view = self.textures.insert(TextureEntry { texture: Arc::clone(&texture), path: None });
                self.depth_targets.insert(DepthTarget { texture, view })
            }
            Err(e) => {
                engine_error!(SOURCE, "Failed to create {}x{} depth target: {}", width, height, e);
                DepthTargetId::INVALID
            }
        }
    }

    pub fn back_buffer(&self) -> RenderTargetId {
        self.back_buffer
    }

    pub fn render_target(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.render_targets.get(id)
    }

    pub fn depth_target(&self, id: DepthTargetId) -> Option<&DepthTarget> {
        self.depth_targets.get(id)
    }

    /// Texture view of a colour target (`INVALID` for the back buffer)
    pub fn render_target_texture(&self, id: RenderTargetId) -> TextureId {
        self.render_targets.get(id).map(|rt| rt.view).unwrap_or(TextureId::INVALID)
    }

    pub fn depth_target_texture(&self, id: DepthTargetId) -> TextureId {
        self.depth_targets.get(id).map(|dt| dt.view).unwrap_or(TextureId::INVALID)
    }

    pub fn destroy_render_target(&mut self, id: RenderTargetId) -> bool {
        if id == self.back_buffer {
            engine_error!(SOURCE, "The back buffer cannot be destroyed");
            return false;
        }
        match self.render_targets.remove(id) {
            Some(target) => {
                self.textures.remove(target.view);
                self.forget_texture(target.view);
                self.bound_targets.retain(|bound| *bound != id);
                true
            }
            None => {
                engine_error!(SOURCE, "destroy_render_target: {} is not live", id);
                false
            }
        }
    }

    pub fn destroy_depth_target(&mut self, id: DepthTargetId) -> bool {
        match self.depth_targets.remove(id) {
            Some(target) => {
                self.textures.remove(target.view);
                self.forget_texture(target.view);
                if self.bound_depth == id {
                    self.bound_depth = DepthTargetId::INVALID;
                }
                true
            }
            None => {
                engine_error!(SOURCE, "destroy_depth_target: {} is not live", id);
                false
            }
        }
    }

    // ===== SAMPLERS AND FIXED-FUNCTION STATES =====

    pub fn create_sampler(&mut self, desc: SamplerDesc) -> SamplerId {
        match self.device.create_sampler(desc) {
            Ok(sampler) => self.samplers.insert(sampler),
            Err(e) => {
                engine_error!(SOURCE, "Failed to create sampler: {}", e);
                SamplerId::INVALID
            }
        }
    }

    pub fn create_rasterizer_state(&mut self, cull_mode: CullMode, fill_mode: FillMode, depth_clip: bool) -> RasterizerStateId {
        self.rasterizer_states.insert(RasterizerDesc::new(cull_mode, fill_mode, depth_clip))
    }

    pub fn create_depth_stencil_state(&mut self, desc: DepthStencilDesc) -> DepthStencilStateId {
        self.depth_stencil_states.insert(desc)
    }

    pub fn default_rasterizer_state(&self, state: DefaultRasterizerState) -> RasterizerStateId {
        self.default_rasterizers[state as usize]
    }

    pub fn default_depth_stencil_state(&self, state: DefaultDepthStencilState) -> DepthStencilStateId {
        self.default_depth_stencils[state as usize]
    }

    pub fn default_sampler(&self, sampler: DefaultSampler) -> SamplerId {
        self.default_samplers[sampler as usize]
    }

    pub fn sampler(&self, id: SamplerId) -> Option<&Arc<dyn Sampler>> {
        self.samplers.get(id)
    }

    pub fn rasterizer_state(&self, id: RasterizerStateId) -> Option<&RasterizerDesc> {
        self.rasterizer_states.get(id)
    }

    pub fn depth_stencil_state(&self, id: DepthStencilStateId) -> Option<&DepthStencilDesc> {
        self.depth_stencil_states.get(id)
    }

    // ===== BUFFER OBJECTS =====

    pub fn create_buffer_object(&mut self, mesh: &MeshData, dynamic: bool) -> BufferId {
        let usage = if dynamic { BufferUsage::Dynamic } else { BufferUsage::Immutable };
        match BufferObject::create(self.device.as_mut(), mesh, usage) {
            Ok(object) => self.buffers.insert(object),
            Err(e) => {
                engine_error!(SOURCE, "Failed to create buffer object: {}", e);
                BufferId::INVALID
            }
        }
    }

    /// Rewrite the vertices of a dynamic buffer object
    pub fn update_buffer_object(&mut self, id: BufferId, vertices: &[Vertex]) -> Result<()> {
        let object = self.buffers.lookup(id).map_err(|e| engine_err!(SOURCE, "update_buffer_object: {}", e))?;
        object.update_vertices(vertices)?;
        self.drop_tangent_frame(id);
        Ok(())
    }

    /// Line lists showing the tangent frames of a buffer object
    ///
    /// Built on first use from the object's vertices and kept until the
    /// object is updated or destroyed. Returns tangents, bitangents and
    /// normals, in that order.
    pub fn tangent_frame_lines(&mut self, id: BufferId, length: f32) -> Result<[BufferId; 3]> {
        if let Some(&lines) = self.tangent_frames.get(&id) {
            return Ok(lines);
        }
        let object = self.buffers.lookup(id).map_err(|e| engine_err!(SOURCE, "tangent_frame_lines: {}", e))?;
        if object.topology() != PrimitiveTopology::TriangleList {
            engine_bail!(SOURCE, "tangent_frame_lines: {} is not a triangle mesh", id);
        }
        let source = MeshData { vertices: object.vertices(), ..Default::default() };
        let mut lines = [BufferId::INVALID; 3];
        for (slot, mesh) in lines.iter_mut().zip(GeometryGenerator::tangent_frame_lines(&source, length)) {
            let created = BufferObject::create(self.device.as_mut(), &mesh, BufferUsage::Immutable)
                .map_err(|e| engine_err!(SOURCE, "tangent_frame_lines: {}", e))?;
            *slot = self.buffers.insert(created);
        }
        self.tangent_frames.insert(id, lines);
        Ok(lines)
    }

    fn drop_tangent_frame(&mut self, id: BufferId) {
        if let Some(lines) = self.tangent_frames.remove(&id) {
            for line in lines {
                self.buffers.remove(line);
            }
        }
    }

    pub fn buffer_object(&self, id: BufferId) -> Option<&BufferObject> {
        self.buffers.get(id)
    }

    pub fn builtin_mesh(&self, mesh: BuiltinMesh) -> BufferId {
        self.builtin_meshes.get(&mesh).copied().unwrap_or(BufferId::INVALID)
    }

    /// Release a buffer object; built-in meshes are refused
    pub fn destroy_buffer_object(&mut self, id: BufferId) -> bool {
        if self.builtin_meshes.values().any(|&builtin| builtin == id) {
            engine_error!(SOURCE, "{} is a built-in mesh and cannot be destroyed", id);
            return false;
        }
        if self.buffers.remove(id).is_none() {
            engine_error!(SOURCE, "destroy_buffer_object: {} is not live", id);
            return false;
        }
        self.drop_tangent_frame(id);
        if self.active_buffer == id {
            self.active_buffer = BufferId::INVALID;
        }
        true
    }

    // ===== DRAW PROTOCOL =====

    /// Select the shader for the next `apply`
    ///
    /// Pending texture and sampler bindings belong to the previous shader's
    /// slot table and are dropped when the shader changes.
    pub fn set_shader(&mut self, id: ShaderId) -> Result<()> {
        if let Err(e) = self.shaders.lookup(id) {
            engine_bail!(SOURCE, "set_shader: {}", e);
        }
        if self.active_shader != id {
            self.pending_textures.clear();
            self.pending_samplers.clear();
        }
        self.active_shader = id;
        self.state = DrawState::ShaderBound;
        Ok(())
    }

    pub fn active_shader(&self) -> ShaderId {
        self.active_shader
    }

    /// Select the vertex / index buffer pair for the next `apply`
    pub fn set_buffer_obj(&mut self, id: BufferId) -> Result<()> {
        if let Err(e) = self.buffers.lookup(id) {
            engine_bail!(SOURCE, "set_buffer_obj: {}", e);
        }
        self.active_buffer = id;
        self.state = DrawState::BufferBound;
        Ok(())
    }

    pub fn active_buffer(&self) -> BufferId {
        self.active_buffer
    }

    /// Write a constant of the active shader
    ///
    /// Every constant buffer declaring `name` is updated, and marked dirty
    /// only if its bytes actually change. Returns whether the name exists.
    pub fn set_constant<T: Pod>(&mut self, name: &str, value: &T) -> bool {
        self.set_constant_bytes(name, bytemuck::bytes_of(value))
    }

    pub fn set_constant_bytes(&mut self, name: &str, bytes: &[u8]) -> bool {
        let id = self.active_shader;
        let Some(shader) = self.shaders.get_mut(id) else {
            engine_error!(SOURCE, "set_constant('{}') without an active shader", name);
            return false;
        };
        match shader.set_constant(name, bytes) {
            Ok(Some(changed)) => {
                if changed {
                    self.invalidate_apply();
                }
                true
            }
            Ok(None) => {
                self.warn_missing(id, name, "constant");
                false
            }
            Err(_) => false,
        }
    }

    /// Bind a texture to every slot the active shader names `name`
    ///
    /// `TextureId::INVALID` clears the slot.
    pub fn set_texture(&mut self, name: &str, id: TextureId) -> bool {
        if id.is_valid() && !self.textures.contains(id) {
            engine_error!(SOURCE, "set_texture('{}'): {} is not live", name, id);
            return false;
        }
        let shader_id = self.active_shader;
        let Some(shader) = self.shaders.get(shader_id) else {
            engine_error!(SOURCE, "set_texture('{}') without an active shader", name);
            return false;
        };
        let slots: Vec<(ShaderStage, u32)> = shader.texture_slots(name).map(|s| (s.stage, s.slot)).collect();
        if slots.is_empty() {
            self.warn_missing(shader_id, name, "texture");
            return false;
        }
        for slot in slots {
            self.pending_textures.insert(slot, id);
        }
        self.invalidate_apply();
        true
    }

    /// Bind a sampler to every slot the active shader names `name`
    pub fn set_sampler(&mut self, name: &str, id: SamplerId) -> bool {
        if !self.samplers.contains(id) {
            engine_error!(SOURCE, "set_sampler('{}'): {} is not live", name, id);
            return false;
        }
        let shader_id = self.active_shader;
        let Some(shader) = self.shaders.get(shader_id) else {
            engine_error!(SOURCE, "set_sampler('{}') without an active shader", name);
            return false;
        };
        let slots: Vec<(ShaderStage, u32)> = shader.sampler_slots(name).map(|s| (s.stage, s.slot)).collect();
        if slots.is_empty() {
            self.warn_missing(shader_id, name, "sampler");
            return false;
        }
        for slot in slots {
            self.pending_samplers.insert(slot, id);
        }
        self.invalidate_apply();
        true
    }

    pub fn set_rasterizer_state(&mut self, id: RasterizerStateId) -> Result<()> {
        if let Err(e) = self.rasterizer_states.lookup(id) {
            engine_bail!(SOURCE, "set_rasterizer_state: {}", e);
        }
        self.rasterizer_state = id;
        self.invalidate_apply();
        Ok(())
    }

    pub fn set_depth_stencil_state(&mut self, id: DepthStencilStateId) -> Result<()> {
        if let Err(e) = self.depth_stencil_states.lookup(id) {
            engine_bail!(SOURCE, "set_depth_stencil_state: {}", e);
        }
        self.depth_stencil_state = id;
        self.invalidate_apply();
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.invalidate_apply();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Flush the selection to the device
    ///
    /// Dirty constant buffers are uploaded and cleaned; every constant
    /// buffer of the shader is (re)bound to its slot.
    pub fn apply(&mut self) -> Result<()> {
        let Some(shader) = self.shaders.get_mut(self.active_shader) else {
            engine_bail!(SOURCE, "apply() without an active shader");
        };
        let cmd = self.device.command_list();

        for cbuffer in shader.cbuffers_mut() {
            if cbuffer.flush()? {
                self.stats.cbuffer_uploads += 1;
            }
            let layout = cbuffer.layout();
            cmd.bind_constant_buffer(layout.stage, layout.slot, cbuffer.gpu_buffer())?;
        }

        cmd.set_input_layout(shader.layout())?;
        cmd.bind_shader(ShaderStage::Vertex, shader.vertex_module())?;
        cmd.bind_shader(ShaderStage::Pixel, shader.pixel_module())?;
        self.stats.shader_binds += 1;

        if let Some(object) = self.buffers.get(self.active_buffer) {
            cmd.bind_vertex_buffer(object.vertex_buffer(), object.stride())?;
            cmd.bind_index_buffer(object.index_buffer(), IndexType::U32)?;
            cmd.set_primitive_topology(object.topology())?;
        }

        if let Some(desc) = self.rasterizer_states.get(self.rasterizer_state) {
            cmd.set_rasterizer_state(desc)?;
        }
        if let Some(desc) = self.depth_stencil_states.get(self.depth_stencil_state) {
            cmd.set_depth_stencil_state(desc)?;
        }
        cmd.set_viewport(self.viewport)?;

        for (&(stage, slot), &id) in &self.pending_textures {
            let texture = self.textures.get(id).map(|entry| &entry.texture);
            cmd.bind_texture(stage, slot, texture)?;
            if texture.is_some() {
                self.device_textures.insert((stage, slot), id);
                self.stats.texture_binds += 1;
            } else {
                self.device_textures.remove(&(stage, slot));
            }
        }
        for (&(stage, slot), &id) in &self.pending_samplers {
            if let Some(sampler) = self.samplers.get(id) {
                cmd.bind_sampler(stage, slot, sampler)?;
            }
        }

        self.state = DrawState::Applied;
        Ok(())
    }

    /// Indexed draw of the whole active buffer object with the applied state
    pub fn draw_indexed(&mut self) -> Result<()> {
        if !matches!(self.state, DrawState::Applied | DrawState::Drawn) {
            engine_warn!(SOURCE, "draw_indexed() with state changes not yet applied ({:?})", self.state);
        }
        let (index_count, vertex_count) = match self.buffers.get(self.active_buffer) {
            Some(object) => (object.index_count(), object.vertex_count()),
            None => engine_bail!(SOURCE, "draw_indexed() without a buffer object"),
        };
        self.device.command_list().draw_indexed(index_count, 0, 0)?;
        self.stats.draw_calls += 1;
        self.stats.indices += index_count as u64;
        self.stats.vertices += vertex_count as u64;
        self.state = DrawState::Drawn;
        Ok(())
    }

    /// Drop the shader / buffer selection and unbind texture slots
    ///
    /// Called between passes so that nothing of the previous pass is reused
    /// by accident; also returns the fixed-function states to their defaults.
    pub fn reset(&mut self) -> Result<()> {
        let cmd = self.device.command_list();
        for &(stage, slot) in self.device_textures.keys() {
            cmd.bind_texture(stage, slot, None)?;
        }
        self.device_textures.clear();
        self.pending_textures.clear();
        self.pending_samplers.clear();
        self.active_shader = ShaderId::INVALID;
        self.active_buffer = BufferId::INVALID;
        self.rasterizer_state = self.default_rasterizer_state(DefaultRasterizerState::CullNone);
        self.depth_stencil_state = self.default_depth_stencil_state(DefaultDepthStencilState::DepthWrite);
        self.state = DrawState::Idle;
        Ok(())
    }

    // ===== FRAME AND TARGETS =====

    /// Start a frame: zero the statistics
    pub fn begin_frame(&mut self) {
        self.stats.reset();
    }

    /// Bind colour targets and an optional depth target (`INVALID` for none)
    ///
    /// Texture slots still sampling one of the targets are unbound first,
    /// and the viewport is set to the size of the first target.
    pub fn bind_render_targets(&mut self, targets: &[RenderTargetId], depth: DepthTargetId) -> Result<()> {
        let mut colors = Vec::with_capacity(targets.len());
        let mut views = Vec::with_capacity(targets.len() + 1);
        for &id in targets {
            let target = self.render_targets.lookup(id).map_err(|e| engine_err!(SOURCE, "bind_render_targets: {}", e))?;
            colors.push(Arc::clone(&target.texture));
            views.push(target.view);
        }
        let depth_texture = if depth.is_valid() {
            let target = self.depth_targets.lookup(depth).map_err(|e| engine_err!(SOURCE, "bind_render_targets: {}", e))?;
            views.push(target.view);
            Some(Arc::clone(&target.texture))
        } else {
            None
        };

        let cmd = self.device.command_list();
        let hazards: Vec<(ShaderStage, u32)> = self
            .device_textures
            .iter()
            .filter(|(_, bound)| views.contains(bound))
            .map(|(&slot, _)| slot)
            .collect();
        for (stage, slot) in hazards {
            cmd.bind_texture(stage, slot, None)?;
            self.device_textures.remove(&(stage, slot));
        }
        cmd.set_render_targets(&colors, depth_texture.as_ref())?;

        let size = colors.first().or(depth_texture.as_ref()).map(|t| (t.desc().width, t.desc().height));
        if let Some((width, height)) = size {
            self.viewport = Viewport::from_size(width, height);
        }
        self.bound_targets = targets.to_vec();
        self.bound_depth = depth;
        self.invalidate_apply();
        Ok(())
    }

    pub fn bound_render_targets(&self) -> &[RenderTargetId] {
        &self.bound_targets
    }

    pub fn bound_depth_target(&self) -> DepthTargetId {
        self.bound_depth
    }

    pub fn clear_render_target(&mut self, id: RenderTargetId, color: [f32; 4]) -> Result<()> {
        let target = self.render_targets.lookup(id).map_err(|e| engine_err!(SOURCE, "clear_render_target: {}", e))?;
        self.device.command_list().clear_color(&target.texture, color)
    }

    pub fn clear_depth_target(&mut self, id: DepthTargetId, depth: f32) -> Result<()> {
        let target = self.depth_targets.lookup(id).map_err(|e| engine_err!(SOURCE, "clear_depth_target: {}", e))?;
        self.device.command_list().clear_depth(&target.texture, depth, 0)
    }

    /// Clear every bound colour target and the bound depth target
    pub fn begin(&mut self, clear_color: [f32; 4], clear_depth: f32) -> Result<()> {
        for id in self.bound_targets.clone() {
            self.clear_render_target(id, clear_color)?;
        }
        if self.bound_depth.is_valid() {
            self.clear_depth_target(self.bound_depth, clear_depth)?;
        }
        Ok(())
    }

    /// Close a scope opened by `begin`; presents when drawing to the back buffer
    pub fn end(&mut self) -> Result<bool> {
        if self.bound_targets.contains(&self.back_buffer) {
            self.device.present(self.config.vsync)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Named region in the command stream (debuggers, captures)
    pub fn begin_event(&mut self, name: &str) {
        self.device.command_list().begin_event(name);
    }

    pub fn end_event(&mut self) {
        self.device.command_list().end_event();
    }

    // ===== INTERNAL =====

    /// State changed after an apply: the next draw needs another apply
    fn invalidate_apply(&mut self) {
        if matches!(self.state, DrawState::Applied | DrawState::Drawn) {
            self.state = if self.active_buffer.is_valid() {
                DrawState::BufferBound
            } else {
                DrawState::ShaderBound
            };
        }
    }

    fn warn_missing(&mut self, shader: ShaderId, name: &str, what: &str) {
        if self.warned_names.insert((shader, name.to_string())) {
            let shader_name = self.shaders.get(shader).map(|s| s.name().to_string()).unwrap_or_default();
            engine_warn!(SOURCE, "Shader '{}' has no {} named '{}'", shader_name, what, name);
        }
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
