/// Engine settings and the settings file
///
/// One command per line, whitespace separated:
///
/// ```text
/// screen 1920 1080 0 1          # width height fullscreen vsync
/// bloom 1.5 0.8 10              # threshold_brdf threshold_phong blur_passes
/// shadowMap 2048
/// lightingModel brdf            # brdf | phong
/// deferredRendering true
/// ambientOcclusion no
/// tonemapping 1.2               # exposure
/// HDR yes
/// level 1
/// ```
///
/// Lines starting with `#` or `/` are comments. A malformed or unknown line
/// is logged and skipped; the defaults stay in place for what it would
/// have set.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use crate::error::Result;
use crate::{engine_err, engine_info, engine_warn};

const SOURCE: &str = "prism3d::Settings";

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub vsync: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self { width: 1280, height: 720, fullscreen: false, vsync: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub enabled: bool,
    /// Bright-pass luminance threshold under BRDF lighting
    pub threshold_brdf: f32,
    /// Bright-pass luminance threshold under Blinn-Phong lighting
    pub threshold_phong: f32,
    /// Separable blur iterations (each one horizontal or vertical)
    pub blur_pass_count: u32,
    /// Gaussian kernel half-width in texels
    pub blur_strength: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_brdf: 1.5,
            threshold_phong: 0.8,
            blur_pass_count: 10,
            blur_strength: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMapSettings {
    pub dimension: u32,
}

impl Default for ShadowMapSettings {
    fn default() -> Self {
        Self { dimension: 1024 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonemappingSettings {
    pub exposure: f32,
}

impl Default for TonemappingSettings {
    fn default() -> Self {
        Self { exposure: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingSettings {
    pub bloom: BloomSettings,
    pub shadow_map: ShadowMapSettings,
    /// BRDF when true, Blinn-Phong otherwise
    pub use_brdf_lighting: bool,
    pub deferred_rendering: bool,
    pub ambient_occlusion: bool,
    pub tonemapping: TonemappingSettings,
    pub hdr: bool,
}

impl Default for RenderingSettings {
    fn default() -> Self {
        Self {
            bloom: BloomSettings::default(),
            shadow_map: ShadowMapSettings::default(),
            use_brdf_lighting: true,
            deferred_rendering: false,
            ambient_occlusion: false,
            tonemapping: TonemappingSettings::default(),
            hdr: false,
        }
    }
}

impl RenderingSettings {
    /// Bright-pass threshold of the active lighting model
    pub fn bloom_threshold(&self) -> f32 {
        if self.use_brdf_lighting {
            self.bloom.threshold_brdf
        } else {
            self.bloom.threshold_phong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineSettings {
    pub window: WindowSettings,
    pub rendering: RenderingSettings,
    /// Index into the engine's level list
    pub level: usize,
}

// ============================================================================
// PARSING
// ============================================================================

/// `true/false/yes/no/1/0`, any case
pub fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Parse `count` values after the command word, or explain what is wrong
pub(crate) fn parse_args<T: FromStr>(tokens: &[&str], count: usize) -> std::result::Result<Vec<T>, String> {
    if tokens.len() != count + 1 {
        return Err(format!("'{}' expects {} values, got {}", tokens[0], count, tokens.len() - 1));
    }
    tokens[1..]
        .iter()
        .map(|token| token.parse::<T>().map_err(|_| format!("'{}': bad value '{}'", tokens[0], token)))
        .collect()
}

fn parse_flag(tokens: &[&str]) -> std::result::Result<bool, String> {
    if tokens.len() != 2 {
        return Err(format!("'{}' expects one boolean", tokens[0]));
    }
    parse_bool(tokens[1]).ok_or_else(|| format!("'{}': '{}' is not a boolean", tokens[0], tokens[1]))
}

fn apply_line(settings: &mut EngineSettings, tokens: &[&str]) -> std::result::Result<(), String> {
    let rendering = &mut settings.rendering;
    match tokens[0].to_ascii_lowercase().as_str() {
        "screen" => {
            if tokens.len() != 5 {
                return Err(format!("'screen' expects 4 values, got {}", tokens.len() - 1));
            }
            let size: Vec<u32> = parse_args(&tokens[..3], 2)?;
            let (width, height) = (size[0], size[1]);
            if width == 0 || height == 0 {
                return Err(format!("screen: {}x{} is not a valid size", width, height));
            }
            let fullscreen = parse_flag(&[tokens[0], tokens[3]])?;
            let vsync = parse_flag(&[tokens[0], tokens[4]])?;
            settings.window = WindowSettings { width, height, fullscreen, vsync };
        }
        "bloom" => {
            if tokens.len() != 4 {
                return Err(format!("'bloom' expects 3 values, got {}", tokens.len() - 1));
            }
            let thresholds: Vec<f32> = parse_args(&tokens[..3], 2)?;
            let passes: Vec<u32> = parse_args(&[tokens[0], tokens[3]], 1)?;
            rendering.bloom.threshold_brdf = thresholds[0];
            rendering.bloom.threshold_phong = thresholds[1];
            rendering.bloom.blur_pass_count = passes[0];
        }
        "shadowmap" => {
            let dimension: Vec<u32> = parse_args(tokens, 1)?;
            if dimension[0] == 0 {
                return Err("shadowMap: dimension must be > 0".to_string());
            }
            rendering.shadow_map.dimension = dimension[0];
        }
        "lightingmodel" => {
            if tokens.len() != 2 {
                return Err("'lightingModel' expects brdf or phong".to_string());
            }
            rendering.use_brdf_lighting = match tokens[1].to_ascii_lowercase().as_str() {
                "brdf" => true,
                "phong" | "blinnphong" => false,
                other => return Err(format!("lightingModel: unknown model '{}'", other)),
            };
        }
        "deferredrendering" => rendering.deferred_rendering = parse_flag(tokens)?,
        "ambientocclusion" => rendering.ambient_occlusion = parse_flag(tokens)?,
        "hdr" => rendering.hdr = parse_flag(tokens)?,
        "tonemapping" => {
            let exposure: Vec<f32> = parse_args(tokens, 1)?;
            rendering.tonemapping.exposure = exposure[0];
        }
        "level" => {
            let level: Vec<usize> = parse_args(tokens, 1)?;
            settings.level = level[0];
        }
        _ => return Err(format!("unknown setting '{}'", tokens[0])),
    }
    Ok(())
}

/// Settings from the text of a settings file, starting from the defaults
pub fn parse_settings(text: &str) -> EngineSettings {
    let mut settings = EngineSettings::default();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('/') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Err(problem) = apply_line(&mut settings, &tokens) {
            engine_warn!(SOURCE, "line {}: {}", number + 1, problem);
        }
    }
    settings
}

pub fn load_settings(path: impl AsRef<Path>) -> Result<EngineSettings> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| engine_err!(SOURCE, "Cannot open settings file {}: {}", path.display(), e))?;
    let settings = parse_settings(&text);
    engine_info!(SOURCE, "Loaded {} ({}x{}, {} lighting, {})",
        path.display(),
        settings.window.width,
        settings.window.height,
        if settings.rendering.use_brdf_lighting { "BRDF" } else { "Blinn-Phong" },
        if settings.rendering.deferred_rendering { "deferred" } else { "forward" });
    Ok(settings)
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
