/// Built-in shaders of the passes
///
/// All of them are compiled from `<dir>/<name>_vs.wgsl` (+ `_ps.wgsl`)
/// over the standard vertex layout when the engine starts. A built-in
/// shader that fails to compile is an initialization failure.

use std::path::Path;
use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::VertexLayout;
use crate::renderer::Renderer;
use crate::resource::ShaderId;
use crate::shader::ShaderDesc;

const SOURCE: &str = "prism3d::ShaderLibrary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderLibrary {
    pub shadow_depth: ShaderId,
    pub forward_brdf: ShaderId,
    pub forward_phong: ShaderId,
    pub unlit: ShaderId,
    pub deferred_geometry: ShaderId,
    pub deferred_lighting: ShaderId,
    pub skybox: ShaderId,
    pub ssao: ShaderId,
    pub ssao_blur: ShaderId,
    pub bloom_bright: ShaderId,
    pub blur: ShaderId,
    pub bloom_combine: ShaderId,
    pub tonemapping: ShaderId,
}

impl ShaderLibrary {
    pub const NAMES: [&'static str; 13] = [
        "shadow_depth",
        "forward_brdf",
        "forward_phong",
        "unlit",
        "deferred_geometry",
        "deferred_lighting",
        "skybox",
        "ssao",
        "ssao_blur",
        "bloom_bright",
        "blur",
        "bloom_combine",
        "tonemapping",
    ];

    /// Compile every built-in shader found in `directory`
    pub fn load(renderer: &mut Renderer, directory: &Path) -> Result<Self> {
        let mut load = |name: &str| -> Result<ShaderId> {
            let id = renderer.create_shader(ShaderDesc::new(name, directory, VertexLayout::standard()));
            if !id.is_valid() {
                let message = format!("built-in shader '{}' failed to compile (from {})", name, directory.display());
                engine_error!(SOURCE, "{}", message);
                return Err(Error::InitializationFailed(message));
            }
            Ok(id)
        };
        Ok(Self {
            shadow_depth: load("shadow_depth")?,
            forward_brdf: load("forward_brdf")?,
            forward_phong: load("forward_phong")?,
            unlit: load("unlit")?,
            deferred_geometry: load("deferred_geometry")?,
            deferred_lighting: load("deferred_lighting")?,
            skybox: load("skybox")?,
            ssao: load("ssao")?,
            ssao_blur: load("ssao_blur")?,
            bloom_bright: load("bloom_bright")?,
            blur: load("blur")?,
            bloom_combine: load("bloom_combine")?,
            tonemapping: load("tonemapping")?,
        })
    }

    /// Shader of the forward path for the active lighting model
    pub fn forward(&self, use_brdf_lighting: bool) -> ShaderId {
        if use_brdf_lighting {
            self.forward_brdf
        } else {
            self.forward_phong
        }
    }
}
