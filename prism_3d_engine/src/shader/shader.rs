/// Shader objects
///
/// A `Shader` goes `Uncompiled -> Compiling -> Compiled | CompileFailed`.
/// Compiling reads `<dir>/<name>_vs.wgsl` (and `<name>_ps.wgsl` when
/// present), compiles and reflects both stages, checks the stage
/// signatures, then creates the device modules and one GPU constant
/// buffer per reflected uniform block. Nothing of the previous state is
/// replaced unless every step succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use crate::error::{Error, Result};
use crate::{engine_error, engine_info, engine_warn};
use crate::graphics_device::{
    BufferDesc, GraphicsDevice, ShaderModule, ShaderStage, VertexLayout,
};
use super::compiler::compile_wgsl;
use super::constant_buffer::ConstantBuffer;
use super::reflection::{reflect_stage, ResourceSlot, ScalarKind, SignatureParam, StageReflection};

const SOURCE: &str = "prism3d::Shader";

// ============================================================================
// DESCRIPTION
// ============================================================================

/// Compilation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderState {
    Uncompiled,
    Compiling,
    Compiled,
    CompileFailed,
}

/// What to compile: a base name, where its stage files live, and the
/// vertex layout the vertex stage must accept
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub name: String,
    pub directory: PathBuf,
    pub layout: VertexLayout,
}

impl ShaderDesc {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>, layout: VertexLayout) -> Self {
        Self { name: name.into(), directory: directory.into(), layout }
    }

    /// Source file of one stage (`<dir>/<name>_vs.wgsl`)
    pub fn stage_path(&self, stage: ShaderStage) -> PathBuf {
        self.directory.join(format!("{}{}.wgsl", self.name, stage.file_suffix()))
    }
}

// ============================================================================
// SHADER
// ============================================================================

pub struct Shader {
    desc: ShaderDesc,
    state: ShaderState,
    vertex: Option<Arc<dyn ShaderModule>>,
    pixel: Option<Arc<dyn ShaderModule>>,
    cbuffers: Vec<ConstantBuffer>,
    textures: Vec<ResourceSlot>,
    samplers: Vec<ResourceSlot>,
    /// Source files with their modification time at compile time
    sources: Vec<(PathBuf, Option<SystemTime>)>,
    last_error: Option<String>,
}

/// Output of a successful build, applied to the shader in one step
struct Build {
    vertex: Arc<dyn ShaderModule>,
    pixel: Option<Arc<dyn ShaderModule>>,
    cbuffers: Vec<ConstantBuffer>,
    textures: Vec<ResourceSlot>,
    samplers: Vec<ResourceSlot>,
}

impl Shader {
    pub fn new(desc: ShaderDesc) -> Self {
        Self {
            desc,
            state: ShaderState::Uncompiled,
            vertex: None,
            pixel: None,
            cbuffers: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
            sources: Vec::new(),
            last_error: None,
        }
    }

    /// Compile from the stage files named by the description
    ///
    /// On failure the diagnostic goes to `<log_dir>/<name>_compile_error.log`
    /// (when a log directory is given) and the shader is `CompileFailed`.
    pub fn compile(&mut self, device: &mut dyn GraphicsDevice, log_dir: Option<&Path>) -> Result<()> {
        self.state = ShaderState::Compiling;
        self.sources = self.current_source_times();

        let result = self.read_sources().and_then(|(vs_source, ps_source)| {
            Self::build(&self.desc, device, &vs_source, ps_source.as_deref())
        });
        self.finish(result, log_dir)
    }

    /// Compile from in-memory stage sources
    pub fn compile_sources(
        &mut self,
        device: &mut dyn GraphicsDevice,
        vs_source: &str,
        ps_source: Option<&str>,
        log_dir: Option<&Path>,
    ) -> Result<()> {
        self.state = ShaderState::Compiling;
        let result = Self::build(&self.desc, device, vs_source, ps_source);
        self.finish(result, log_dir)
    }

    /// Fresh copy of this shader compiled from the current files
    ///
    /// Used by hot-reload: the caller swaps it in only on success. All
    /// constant buffers of the new shader start dirty.
    pub fn recompiled(&self, device: &mut dyn GraphicsDevice, log_dir: Option<&Path>) -> Result<Shader> {
        let mut fresh = Shader::new(self.desc.clone());
        fresh.compile(device, log_dir)?;
        fresh.mark_all_dirty();
        Ok(fresh)
    }

    fn read_sources(&self) -> Result<(String, Option<String>)> {
        let vs_path = self.desc.stage_path(ShaderStage::Vertex);
        let vs_source = fs::read_to_string(&vs_path).map_err(|e| {
            Error::ShaderCompilation(format!("{}: cannot read {}: {}", self.desc.name, vs_path.display(), e))
        })?;

        let ps_path = self.desc.stage_path(ShaderStage::Pixel);
        let ps_source = if ps_path.exists() {
            Some(fs::read_to_string(&ps_path).map_err(|e| {
                Error::ShaderCompilation(format!("{}: cannot read {}: {}", self.desc.name, ps_path.display(), e))
            })?)
        } else {
            None
        };
        Ok((vs_source, ps_source))
    }

    fn build(
        desc: &ShaderDesc,
        device: &mut dyn GraphicsDevice,
        vs_source: &str,
        ps_source: Option<&str>,
    ) -> Result<Build> {
        let label = |stage: ShaderStage| format!("{}{}", desc.name, stage.file_suffix());

        let vs_words = compile_wgsl(vs_source, ShaderStage::Vertex, &label(ShaderStage::Vertex))?;
        let vs = reflect_stage(&vs_words, ShaderStage::Vertex)?;

        let ps = match ps_source {
            Some(source) => {
                let words = compile_wgsl(source, ShaderStage::Pixel, &label(ShaderStage::Pixel))?;
                let reflection = reflect_stage(&words, ShaderStage::Pixel)?;
                Some((words, reflection))
            }
            None => None,
        };

        check_vertex_inputs(&desc.name, &desc.layout, &vs.inputs)?;
        if let Some((_, ps_reflection)) = &ps {
            check_stage_link(&desc.name, &vs.outputs, &ps_reflection.inputs)?;
        }

        let vertex = device.create_shader_module(ShaderStage::Vertex, &vs_words)?;
        let pixel = match &ps {
            Some((words, _)) => Some(device.create_shader_module(ShaderStage::Pixel, words)?),
            None => None,
        };

        let stages: Vec<&StageReflection> = std::iter::once(&vs)
            .chain(ps.as_ref().map(|(_, reflection)| reflection))
            .collect();

        let mut cbuffers = Vec::new();
        let mut textures = Vec::new();
        let mut samplers = Vec::new();
        for stage in stages {
            for layout in &stage.cbuffers {
                let gpu = device.create_buffer(BufferDesc::constant(layout.size as u64), None)?;
                cbuffers.push(ConstantBuffer::new(layout.clone(), gpu)?);
            }
            textures.extend(stage.textures.iter().cloned());
            samplers.extend(stage.samplers.iter().cloned());
        }

        Ok(Build { vertex, pixel, cbuffers, textures, samplers })
    }

    fn finish(&mut self, result: Result<Build>, log_dir: Option<&Path>) -> Result<()> {
        match result {
            Ok(build) => {
                self.vertex = Some(build.vertex);
                self.pixel = build.pixel;
                self.cbuffers = build.cbuffers;
                self.textures = build.textures;
                self.samplers = build.samplers;
                self.state = ShaderState::Compiled;
                self.last_error = None;
                engine_info!(SOURCE, "Compiled shader '{}' ({} constant buffers, {} textures, {} samplers)",
                    self.desc.name, self.cbuffers.len(), self.textures.len(), self.samplers.len());
                Ok(())
            }
            Err(err) => {
                let text = match err {
                    Error::ShaderCompilation(text) => text,
                    other => format!("{}: {}", self.desc.name, other),
                };
                self.state = ShaderState::CompileFailed;
                if let Some(dir) = log_dir {
                    self.write_error_log(dir, &text);
                }
                engine_error!(SOURCE, "Shader '{}' failed to compile:\n{}", self.desc.name, text);
                self.last_error = Some(text.clone());
                Err(Error::ShaderCompilation(text))
            }
        }
    }

    fn write_error_log(&self, dir: &Path, text: &str) {
        let path = dir.join(format!("{}_compile_error.log", self.desc.name));
        let written = fs::create_dir_all(dir).and_then(|_| fs::write(&path, text));
        if let Err(e) = written {
            engine_warn!(SOURCE, "Cannot write {}: {}", path.display(), e);
        }
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn desc(&self) -> &ShaderDesc {
        &self.desc
    }

    pub fn state(&self) -> ShaderState {
        self.state
    }

    pub fn is_compiled(&self) -> bool {
        self.state == ShaderState::Compiled
    }

    /// Diagnostic of the last failed compile
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn vertex_module(&self) -> Option<&Arc<dyn ShaderModule>> {
        self.vertex.as_ref()
    }

    pub fn pixel_module(&self) -> Option<&Arc<dyn ShaderModule>> {
        self.pixel.as_ref()
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.desc.layout
    }

    pub fn cbuffers(&self) -> &[ConstantBuffer] {
        &self.cbuffers
    }

    pub fn cbuffers_mut(&mut self) -> &mut [ConstantBuffer] {
        &mut self.cbuffers
    }

    pub fn textures(&self) -> &[ResourceSlot] {
        &self.textures
    }

    pub fn samplers(&self) -> &[ResourceSlot] {
        &self.samplers
    }

    /// Every (stage, slot) a texture name is bound to
    pub fn texture_slots<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResourceSlot> + 'a {
        self.textures.iter().filter(move |slot| slot.name == name)
    }

    /// Every (stage, slot) a sampler name is bound to
    pub fn sampler_slots<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResourceSlot> + 'a {
        self.samplers.iter().filter(move |slot| slot.name == name)
    }

    /// Write a constant into every cbuffer declaring a field `name`
    ///
    /// `Ok(None)` when no cbuffer declares it, otherwise whether any bytes
    /// changed.
    pub fn set_constant(&mut self, name: &str, bytes: &[u8]) -> Result<Option<bool>> {
        let mut found = None;
        for cbuffer in &mut self.cbuffers {
            if let Some(changed) = cbuffer.write(name, bytes)? {
                found = Some(found.unwrap_or(false) || changed);
            }
        }
        Ok(found)
    }

    pub fn has_constant(&self, name: &str) -> bool {
        self.cbuffers.iter().any(|cb| cb.constant(name).is_some())
    }

    pub fn mark_all_dirty(&mut self) {
        for cbuffer in &mut self.cbuffers {
            cbuffer.mark_dirty();
        }
    }

    // ===== HOT-RELOAD =====

    fn current_source_times(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        [ShaderStage::Vertex, ShaderStage::Pixel]
            .into_iter()
            .map(|stage| {
                let path = self.desc.stage_path(stage);
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                (path, modified)
            })
            .collect()
    }

    /// Whether this shader was compiled from files (and can be reloaded)
    pub fn has_source_files(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Whether a stage file changed since the last compile
    ///
    /// Shaders compiled from memory have no files and never change.
    pub fn sources_changed(&self) -> bool {
        if self.sources.is_empty() {
            return false;
        }
        self.current_source_times() != self.sources
    }

    /// Accept the current files as seen (after a failed reload)
    pub fn refresh_source_times(&mut self) {
        if !self.sources.is_empty() {
            self.sources = self.current_source_times();
        }
    }
}

// ============================================================================
// SIGNATURE CHECKS
// ============================================================================

fn signature_error(shader: &str, message: String) -> Error {
    Error::ShaderCompilation(format!("{}: signature mismatch: {}", shader, message))
}

/// Vertex stage inputs must follow the vertex layout attribute by attribute
fn check_vertex_inputs(shader: &str, layout: &VertexLayout, inputs: &[SignatureParam]) -> Result<()> {
    if inputs.len() != layout.attributes.len() {
        return Err(signature_error(shader, format!(
            "vertex stage reads {} inputs, vertex layout provides {}",
            inputs.len(), layout.attributes.len()
        )));
    }
    for (input, attribute) in inputs.iter().zip(&layout.attributes) {
        if input.location != attribute.location {
            return Err(signature_error(shader, format!(
                "vertex input '{}' at location {}, layout has '{}' at location {}",
                input.name, input.location, attribute.semantic, attribute.location
            )));
        }
        if let Some(ty) = input.ty {
            if ty.scalar != ScalarKind::Float || ty.components != attribute.format.components() {
                return Err(signature_error(shader, format!(
                    "vertex input '{}' is {:?}x{}, layout '{}' is {:?}",
                    input.name, ty.scalar, ty.components, attribute.semantic, attribute.format
                )));
            }
        }
    }
    Ok(())
}

/// Pixel stage inputs must match vertex stage outputs in count, order and type
fn check_stage_link(shader: &str, outputs: &[SignatureParam], inputs: &[SignatureParam]) -> Result<()> {
    if outputs.len() != inputs.len() {
        return Err(signature_error(shader, format!(
            "vertex stage writes {} outputs, pixel stage reads {} inputs",
            outputs.len(), inputs.len()
        )));
    }
    for (output, input) in outputs.iter().zip(inputs) {
        if output.location != input.location || output.ty != input.ty {
            return Err(signature_error(shader, format!(
                "vertex output '{}' (location {}, {:?}) does not match pixel input '{}' (location {}, {:?})",
                output.name, output.location, output.ty, input.name, input.location, input.ty
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
