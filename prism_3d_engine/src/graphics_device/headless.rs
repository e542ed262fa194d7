/// Headless graphics device
///
/// A complete in-memory implementation of the device seam. Resources keep
/// their contents in CPU memory, every command is validated the way a
/// native backend's debug layer would and recorded as a short string.
/// A cloneable `HeadlessRecorder` exposes counters and the command log after
/// the device itself has been moved into the renderer.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use crate::error::Result;
use crate::engine_bail;
use super::{
    Buffer, BufferDesc, BufferKind, BufferUsage,
    Texture, TextureDesc, TextureFormat, TextureUsage,
    Sampler, SamplerDesc, ShaderModule, ShaderStage,
    CommandList, GraphicsDevice, Viewport,
    IndexType, PrimitiveTopology, RasterizerDesc, DepthStencilDesc, VertexLayout,
};

const SOURCE: &str = "prism3d::Headless";

// ============================================================================
// RECORDER
// ============================================================================

#[derive(Default)]
struct RecorderState {
    buffer_uploads: AtomicU64,
    uploaded_bytes: AtomicU64,
    draw_calls: AtomicU64,
    presents: AtomicU64,
    buffers_created: AtomicU64,
    textures_created: AtomicU64,
    commands: Mutex<Vec<String>>,
    last_frame: Mutex<Vec<String>>,
}

impl RecorderState {
    fn record(&self, command: String) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

/// Read-only view on a headless device's activity
#[derive(Clone)]
pub struct HeadlessRecorder {
    state: Arc<RecorderState>,
}

impl HeadlessRecorder {
    /// Number of `Buffer::update` calls (map / copy / unmap) so far
    pub fn buffer_uploads(&self) -> u64 {
        self.state.buffer_uploads.load(Ordering::Relaxed)
    }

    /// Total bytes written through `Buffer::update`
    pub fn uploaded_bytes(&self) -> u64 {
        self.state.uploaded_bytes.load(Ordering::Relaxed)
    }

    pub fn draw_calls(&self) -> u64 {
        self.state.draw_calls.load(Ordering::Relaxed)
    }

    pub fn presents(&self) -> u64 {
        self.state.presents.load(Ordering::Relaxed)
    }

    pub fn buffers_created(&self) -> u64 {
        self.state.buffers_created.load(Ordering::Relaxed)
    }

    pub fn textures_created(&self) -> u64 {
        self.state.textures_created.load(Ordering::Relaxed)
    }

    /// Commands recorded since the last present
    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Commands of the most recently presented frame
    pub fn last_frame_commands(&self) -> Vec<String> {
        self.state.last_frame.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of commands since the last present starting with `prefix`
    pub fn count_commands(&self, prefix: &str) -> usize {
        self.state
            .commands
            .lock()
            .map(|c| c.iter().filter(|cmd| cmd.starts_with(prefix)).count())
            .unwrap_or(0)
    }

    /// Zero the upload / draw counters (creation counters are kept)
    pub fn reset_counters(&self) {
        self.state.buffer_uploads.store(0, Ordering::Relaxed);
        self.state.uploaded_bytes.store(0, Ordering::Relaxed);
        self.state.draw_calls.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// Resources
// ============================================================================

struct HeadlessBuffer {
    desc: BufferDesc,
    data: Mutex<Vec<u8>>,
    recorder: Arc<RecorderState>,
}

impl Buffer for HeadlessBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.desc.usage == BufferUsage::Immutable {
            engine_bail!(SOURCE, "Cannot update an immutable {:?} buffer", self.desc.kind);
        }
        let end = offset + data.len() as u64;
        if end > self.desc.size {
            engine_bail!(SOURCE, "Buffer update out of range ({} > {} bytes)", end, self.desc.size);
        }
        let mut contents = match self.data.lock() {
            Ok(contents) => contents,
            Err(_) => engine_bail!(SOURCE, "Buffer contents lock poisoned"),
        };
        contents[offset as usize..end as usize].copy_from_slice(data);
        self.recorder.buffer_uploads.fetch_add(1, Ordering::Relaxed);
        self.recorder.uploaded_bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct HeadlessTexture {
    desc: TextureDesc,
    _texels: Option<Vec<u8>>,
}

impl Texture for HeadlessTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct HeadlessSampler {
    desc: SamplerDesc,
}

impl Sampler for HeadlessSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct HeadlessShaderModule {
    stage: ShaderStage,
    words: usize,
}

impl ShaderModule for HeadlessShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn word_count(&self) -> usize {
        self.words
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Command list
// ============================================================================

struct BoundIndexBuffer {
    capacity: u64,
}

struct HeadlessCommandList {
    recorder: Arc<RecorderState>,
    index_buffer: Option<BoundIndexBuffer>,
    vertex_buffer_bound: bool,
    vertex_shader_bound: bool,
    event_depth: u32,
}

impl HeadlessCommandList {
    fn check_drawable(&self) -> Result<()> {
        if !self.vertex_shader_bound {
            engine_bail!(SOURCE, "Draw without a vertex shader bound");
        }
        if !self.vertex_buffer_bound {
            engine_bail!(SOURCE, "Draw without a vertex buffer bound");
        }
        Ok(())
    }
}

impl CommandList for HeadlessCommandList {
    fn set_render_targets(
        &mut self,
        colors: &[Arc<dyn Texture>],
        depth: Option<&Arc<dyn Texture>>,
    ) -> Result<()> {
        if let Some(bad) = colors.iter().find(|t| !t.desc().usage.contains(TextureUsage::RENDER_TARGET)) {
            engine_bail!(SOURCE, "Texture ({:?}) is not a render target", bad.desc().format);
        }
        if let Some(depth) = depth {
            if !depth.desc().usage.contains(TextureUsage::DEPTH_STENCIL) {
                engine_bail!(SOURCE, "Texture ({:?}) is not a depth target", depth.desc().format);
            }
        }
        self.recorder.record(format!(
            "set_render_targets({}, {})",
            colors.len(),
            if depth.is_some() { "depth" } else { "no depth" }
        ));
        Ok(())
    }

    fn clear_color(&mut self, target: &Arc<dyn Texture>, color: [f32; 4]) -> Result<()> {
        if !target.desc().usage.contains(TextureUsage::RENDER_TARGET) {
            engine_bail!(SOURCE, "clear_color on a non render target");
        }
        self.recorder.record(format!("clear_color({:?})", color));
        Ok(())
    }

    fn clear_depth(&mut self, target: &Arc<dyn Texture>, depth: f32, stencil: u8) -> Result<()> {
        if !target.desc().usage.contains(TextureUsage::DEPTH_STENCIL) {
            engine_bail!(SOURCE, "clear_depth on a non depth target");
        }
        self.recorder.record(format!("clear_depth({}, {})", depth, stencil));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            engine_bail!(SOURCE, "Viewport must have a positive size");
        }
        self.recorder.record(format!("set_viewport({}x{})", viewport.width, viewport.height));
        Ok(())
    }

    fn set_rasterizer_state(&mut self, desc: &RasterizerDesc) -> Result<()> {
        self.recorder.record(format!("set_rasterizer_state({:?}, {:?})", desc.cull_mode, desc.fill_mode));
        Ok(())
    }

    fn set_depth_stencil_state(&mut self, desc: &DepthStencilDesc) -> Result<()> {
        self.recorder.record(format!(
            "set_depth_stencil_state(test={}, write={})",
            desc.depth_test, desc.depth_write
        ));
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.recorder.record(format!("set_primitive_topology({:?})", topology));
        Ok(())
    }

    fn set_input_layout(&mut self, layout: &VertexLayout) -> Result<()> {
        self.recorder.record(format!("set_input_layout({} attributes)", layout.attributes.len()));
        Ok(())
    }

    fn bind_shader(&mut self, stage: ShaderStage, module: Option<&Arc<dyn ShaderModule>>) -> Result<()> {
        if let Some(module) = module {
            if module.stage() != stage {
                engine_bail!(SOURCE, "{:?} module bound to the {:?} stage", module.stage(), stage);
            }
        }
        if stage == ShaderStage::Vertex {
            self.vertex_shader_bound = module.is_some();
        }
        self.recorder.record(format!(
            "bind_shader({:?}, {})",
            stage,
            if module.is_some() { "set" } else { "none" }
        ));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, stride: u32) -> Result<()> {
        if buffer.desc().kind != BufferKind::Vertex {
            engine_bail!(SOURCE, "{:?} buffer bound as vertex buffer", buffer.desc().kind);
        }
        if stride == 0 {
            engine_bail!(SOURCE, "Vertex stride must be > 0");
        }
        self.vertex_buffer_bound = true;
        self.recorder.record(format!("bind_vertex_buffer(stride={})", stride));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, index_type: IndexType) -> Result<()> {
        if buffer.desc().kind != BufferKind::Index {
            engine_bail!(SOURCE, "{:?} buffer bound as index buffer", buffer.desc().kind);
        }
        self.index_buffer = Some(BoundIndexBuffer {
            capacity: buffer.desc().size / index_type.size_bytes() as u64,
        });
        self.recorder.record(format!("bind_index_buffer({:?})", index_type));
        Ok(())
    }

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: &Arc<dyn Buffer>) -> Result<()> {
        if buffer.desc().kind != BufferKind::Constant {
            engine_bail!(SOURCE, "{:?} buffer bound as constant buffer", buffer.desc().kind);
        }
        self.recorder.record(format!("bind_constant_buffer({:?}, {})", stage, slot));
        Ok(())
    }

    fn bind_texture(&mut self, stage: ShaderStage, slot: u32, texture: Option<&Arc<dyn Texture>>) -> Result<()> {
        if let Some(texture) = texture {
            if !texture.desc().usage.contains(TextureUsage::SAMPLED) {
                engine_bail!(SOURCE, "Texture bound to {:?} slot {} is not sampleable", stage, slot);
            }
        }
        self.recorder.record(format!(
            "bind_texture({:?}, {}, {})",
            stage,
            slot,
            if texture.is_some() { "set" } else { "none" }
        ));
        Ok(())
    }

    fn bind_sampler(&mut self, stage: ShaderStage, slot: u32, _sampler: &Arc<dyn Sampler>) -> Result<()> {
        self.recorder.record(format!("bind_sampler({:?}, {})", stage, slot));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.check_drawable()?;
        let capacity = match &self.index_buffer {
            Some(bound) => bound.capacity,
            None => engine_bail!(SOURCE, "draw_indexed without an index buffer bound"),
        };
        if first_index as u64 + index_count as u64 > capacity {
            engine_bail!(
                SOURCE,
                "draw_indexed reads {} indices past a {} index buffer",
                first_index as u64 + index_count as u64,
                capacity
            );
        }
        self.recorder.draw_calls.fetch_add(1, Ordering::Relaxed);
        self.recorder.record(format!("draw_indexed({}, {}, {})", index_count, first_index, base_vertex));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.check_drawable()?;
        self.recorder.draw_calls.fetch_add(1, Ordering::Relaxed);
        self.recorder.record(format!("draw({}, {})", vertex_count, first_vertex));
        Ok(())
    }

    fn begin_event(&mut self, name: &str) {
        self.event_depth += 1;
        self.recorder.record(format!("begin_event({})", name));
    }

    fn end_event(&mut self) {
        if self.event_depth == 0 {
            crate::engine_warn!(SOURCE, "end_event without a matching begin_event");
            return;
        }
        self.event_depth -= 1;
        self.recorder.record("end_event".to_string());
    }
}

// ============================================================================
// Device
// ============================================================================

/// In-memory graphics device
pub struct HeadlessDevice {
    recorder: Arc<RecorderState>,
    command_list: HeadlessCommandList,
    back_buffer: Arc<dyn Texture>,
}

impl HeadlessDevice {
    /// Device with a `width` x `height` swap chain
    pub fn new(width: u32, height: u32) -> Self {
        let recorder = Arc::new(RecorderState::default());
        Self {
            command_list: HeadlessCommandList {
                recorder: Arc::clone(&recorder),
                index_buffer: None,
                vertex_buffer_bound: false,
                vertex_shader_bound: false,
                event_depth: 0,
            },
            back_buffer: Self::make_back_buffer(width.max(1), height.max(1)),
            recorder,
        }
    }

    /// Counters and command log shared with this device
    pub fn recorder(&self) -> HeadlessRecorder {
        HeadlessRecorder { state: Arc::clone(&self.recorder) }
    }

    fn make_back_buffer(width: u32, height: u32) -> Arc<dyn Texture> {
        Arc::new(HeadlessTexture {
            desc: TextureDesc {
                width,
                height,
                format: TextureFormat::R8G8B8A8_UNORM,
                usage: TextureUsage::RENDER_TARGET,
                mip_levels: 1,
            },
            _texels: None,
        })
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_buffer(&mut self, desc: BufferDesc, data: Option<&[u8]>) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            engine_bail!(SOURCE, "Buffer size must be > 0");
        }
        let contents = match (desc.usage, data) {
            (BufferUsage::Immutable, None) => {
                engine_bail!(SOURCE, "Immutable {:?} buffer created without data", desc.kind)
            }
            (_, Some(bytes)) if bytes.len() as u64 != desc.size => {
                engine_bail!(
                    SOURCE,
                    "Initial data is {} bytes, buffer declared {} bytes",
                    bytes.len(),
                    desc.size
                )
            }
            (_, Some(bytes)) => bytes.to_vec(),
            (BufferUsage::Dynamic, None) => vec![0; desc.size as usize],
        };
        self.recorder.buffers_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(HeadlessBuffer {
            desc,
            data: Mutex::new(contents),
            recorder: Arc::clone(&self.recorder),
        }))
    }

    fn create_texture(&mut self, desc: TextureDesc, data: Option<&[u8]>) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!(SOURCE, "Texture size must be > 0 (got {}x{})", desc.width, desc.height);
        }
        if desc.usage.is_empty() {
            engine_bail!(SOURCE, "Texture usage must not be empty");
        }
        if desc.usage.contains(TextureUsage::DEPTH_STENCIL) != desc.format.is_depth() {
            engine_bail!(SOURCE, "Format {:?} does not match usage {:?}", desc.format, desc.usage);
        }
        if let Some(bytes) = data {
            if bytes.len() as u64 != desc.byte_size() {
                engine_bail!(
                    SOURCE,
                    "Texel data is {} bytes, expected {}",
                    bytes.len(),
                    desc.byte_size()
                );
            }
        }
        self.recorder.textures_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(HeadlessTexture { desc, _texels: data.map(|d| d.to_vec()) }))
    }

    fn create_sampler(&mut self, desc: SamplerDesc) -> Result<Arc<dyn Sampler>> {
        if desc.max_anisotropy == 0 || desc.max_anisotropy > 16 {
            engine_bail!(SOURCE, "max_anisotropy must be in 1..=16 (got {})", desc.max_anisotropy);
        }
        Ok(Arc::new(HeadlessSampler { desc }))
    }

    fn create_shader_module(&mut self, stage: ShaderStage, spirv: &[u32]) -> Result<Arc<dyn ShaderModule>> {
        const SPIRV_MAGIC: u32 = 0x0723_0203;
        if spirv.first() != Some(&SPIRV_MAGIC) {
            engine_bail!(SOURCE, "{:?} module is not SPIR-V", stage);
        }
        Ok(Arc::new(HeadlessShaderModule { stage, words: spirv.len() }))
    }

    fn command_list(&mut self) -> &mut dyn CommandList {
        &mut self.command_list
    }

    fn back_buffer(&self) -> Arc<dyn Texture> {
        Arc::clone(&self.back_buffer)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_bail!(SOURCE, "Cannot resize swap chain to {}x{}", width, height);
        }
        self.back_buffer = Self::make_back_buffer(width, height);
        self.recorder.record(format!("resize({}x{})", width, height));
        Ok(())
    }

    fn present(&mut self, vsync: bool) -> Result<()> {
        self.recorder.record(format!("present(vsync={})", vsync));
        self.recorder.presents.fetch_add(1, Ordering::Relaxed);
        if let (Ok(mut current), Ok(mut last)) = (self.recorder.commands.lock(), self.recorder.last_frame.lock()) {
            *last = std::mem::take(&mut *current);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "headless_tests.rs"]
mod tests;
