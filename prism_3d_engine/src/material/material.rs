/// Material data and its binding into the active shader
///
/// Shaders receive a material as one `surface_material` constant laid out
/// like `SurfaceMaterialGpu`, plus one texture per present map. The
/// deferred geometry shader additionally reads `brdf_or_phong` to tag the
/// G-buffer with the lighting model.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use crate::renderer::Renderer;
use crate::resource::TextureId;
use crate::utils::LinearColor;
use super::material_pool::MaterialKind;

// ============================================================================
// TEXTURE MAPS
// ============================================================================

/// Texture slot of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialMap {
    Diffuse,
    Normal,
    Specular,
    Mask,
    Roughness,
    Metallic,
    Height,
    Emissive,
}

impl MaterialMap {
    pub const ALL: [MaterialMap; 8] = [
        MaterialMap::Diffuse,
        MaterialMap::Normal,
        MaterialMap::Specular,
        MaterialMap::Mask,
        MaterialMap::Roughness,
        MaterialMap::Metallic,
        MaterialMap::Height,
        MaterialMap::Emissive,
    ];

    /// Texture name the material shaders declare for this slot
    pub fn texture_name(self) -> &'static str {
        match self {
            MaterialMap::Diffuse => "diffuse_map",
            MaterialMap::Normal => "normal_map",
            MaterialMap::Specular => "specular_map",
            MaterialMap::Mask => "mask_map",
            MaterialMap::Roughness => "roughness_map",
            MaterialMap::Metallic => "metallic_map",
            MaterialMap::Height => "height_map",
            MaterialMap::Emissive => "emissive_map",
        }
    }
}

/// Texture handle per slot, `TextureId::INVALID` when the map is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialMaps {
    maps: [TextureId; 8],
}

impl MaterialMaps {
    pub fn get(&self, map: MaterialMap) -> TextureId {
        self.maps[map as usize]
    }

    pub fn set(&mut self, map: MaterialMap, texture: TextureId) {
        self.maps[map as usize] = texture;
    }

    pub fn has(&self, map: MaterialMap) -> bool {
        self.get(map).is_valid()
    }

    /// Present maps in slot order
    pub fn present(&self) -> impl Iterator<Item = (MaterialMap, TextureId)> + '_ {
        MaterialMap::ALL
            .into_iter()
            .map(|map| (map, self.get(map)))
            .filter(|(_, texture)| texture.is_valid())
    }

    fn flag(&self, map: MaterialMap) -> f32 {
        if self.has(map) { 1.0 } else { 0.0 }
    }
}

impl Default for MaterialMaps {
    fn default() -> Self {
        Self { maps: [TextureId::INVALID; 8] }
    }
}

// ============================================================================
// SHADING MODELS
// ============================================================================

/// Lighting-model specific parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadingModel {
    /// Cook-Torrance GGX
    Brdf { roughness: f32, metalness: f32 },
    BlinnPhong { shininess: f32 },
}

impl ShadingModel {
    pub const DEFAULT_ROUGHNESS: f32 = 0.6;
    pub const DEFAULT_METALNESS: f32 = 0.1;
    pub const DEFAULT_SHININESS: f32 = 90.0;

    pub fn default_for(kind: MaterialKind) -> Self {
        match kind {
            MaterialKind::Brdf => ShadingModel::Brdf {
                roughness: Self::DEFAULT_ROUGHNESS,
                metalness: Self::DEFAULT_METALNESS,
            },
            MaterialKind::BlinnPhong => ShadingModel::BlinnPhong {
                shininess: Self::DEFAULT_SHININESS,
            },
        }
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            ShadingModel::Brdf { .. } => MaterialKind::Brdf,
            ShadingModel::BlinnPhong { .. } => MaterialKind::BlinnPhong,
        }
    }
}

/// Classic Blinn-Phong material table entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinnPhongPreset {
    Ruby,
    Jade,
    Bronze,
    Gold,
}

impl BlinnPhongPreset {
    pub const ALL: [BlinnPhongPreset; 4] = [
        BlinnPhongPreset::Ruby,
        BlinnPhongPreset::Jade,
        BlinnPhongPreset::Bronze,
        BlinnPhongPreset::Gold,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            BlinnPhongPreset::Ruby => "ruby",
            BlinnPhongPreset::Jade => "jade",
            BlinnPhongPreset::Bronze => "bronze",
            BlinnPhongPreset::Gold => "gold",
        }
    }

    /// (diffuse, specular, shininess)
    pub fn values(self) -> (Vec3, Vec3, f32) {
        match self {
            BlinnPhongPreset::Ruby => (
                Vec3::new(0.61424, 0.04136, 0.04136),
                Vec3::new(0.727811, 0.626959, 0.626959),
                76.8,
            ),
            BlinnPhongPreset::Jade => (
                Vec3::new(0.54, 0.89, 0.63),
                Vec3::splat(0.316228),
                12.8,
            ),
            BlinnPhongPreset::Bronze => (
                Vec3::new(0.714, 0.4284, 0.18144),
                Vec3::new(0.393548, 0.271906, 0.166721),
                25.6,
            ),
            BlinnPhongPreset::Gold => (
                Vec3::new(0.75164, 0.60648, 0.22648),
                Vec3::new(0.628281, 0.555802, 0.366065),
                51.2,
            ),
        }
    }
}

// ============================================================================
// GPU LAYOUT
// ============================================================================

/// `SurfaceMaterial` as declared by the material shaders (96 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SurfaceMaterialGpu {
    pub diffuse: [f32; 3],
    pub alpha: f32,
    pub specular: [f32; 3],
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub tiling: [f32; 2],
    pub metalness: f32,
    pub shininess: f32,
    pub has_diffuse_map: f32,
    pub has_normal_map: f32,
    pub has_specular_map: f32,
    pub has_mask_map: f32,
    pub has_roughness_map: f32,
    pub has_metallic_map: f32,
    pub has_height_map: f32,
    pub has_emissive_map: f32,
}

// ============================================================================
// MATERIAL
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub diffuse: Vec3,
    pub alpha: f32,
    pub specular: Vec3,
    pub tiling: Vec2,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub maps: MaterialMaps,
    pub model: ShadingModel,
}

impl Material {
    /// White material with the default parameters of `kind`
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            diffuse: LinearColor::WHITE,
            alpha: 1.0,
            specular: LinearColor::WHITE,
            tiling: Vec2::ONE,
            emissive: LinearColor::BLACK,
            emissive_intensity: 0.0,
            maps: MaterialMaps::default(),
            model: ShadingModel::default_for(kind),
        }
    }

    pub fn brdf(diffuse: Vec3, roughness: f32, metalness: f32) -> Self {
        Self {
            diffuse,
            model: ShadingModel::Brdf { roughness, metalness },
            ..Self::new(MaterialKind::Brdf)
        }
    }

    pub fn blinn_phong(diffuse: Vec3, specular: Vec3, shininess: f32) -> Self {
        Self {
            diffuse,
            specular,
            model: ShadingModel::BlinnPhong { shininess },
            ..Self::new(MaterialKind::BlinnPhong)
        }
    }

    pub fn from_preset(preset: BlinnPhongPreset) -> Self {
        let (diffuse, specular, shininess) = preset.values();
        Self::blinn_phong(diffuse, specular, shininess)
    }

    pub fn kind(&self) -> MaterialKind {
        self.model.kind()
    }

    pub fn with_map(mut self, map: MaterialMap, texture: TextureId) -> Self {
        self.maps.set(map, texture);
        self
    }

    /// Back to the defaults of the current kind
    pub fn clear(&mut self) {
        *self = Self::new(self.kind());
    }

    pub fn gpu_data(&self) -> SurfaceMaterialGpu {
        let (roughness, metalness, shininess) = match self.model {
            ShadingModel::Brdf { roughness, metalness } => (roughness, metalness, 0.0),
            ShadingModel::BlinnPhong { shininess } => (0.0, 0.0, shininess),
        };
        SurfaceMaterialGpu {
            diffuse: self.diffuse.to_array(),
            alpha: self.alpha,
            specular: self.specular.to_array(),
            roughness,
            emissive: self.emissive.to_array(),
            emissive_intensity: self.emissive_intensity,
            tiling: self.tiling.to_array(),
            metalness,
            shininess,
            has_diffuse_map: self.maps.flag(MaterialMap::Diffuse),
            has_normal_map: self.maps.flag(MaterialMap::Normal),
            has_specular_map: self.maps.flag(MaterialMap::Specular),
            has_mask_map: self.maps.flag(MaterialMap::Mask),
            has_roughness_map: self.maps.flag(MaterialMap::Roughness),
            has_metallic_map: self.maps.flag(MaterialMap::Metallic),
            has_height_map: self.maps.flag(MaterialMap::Height),
            has_emissive_map: self.maps.flag(MaterialMap::Emissive),
        }
    }

    /// Write this material into the active shader
    ///
    /// Absent maps bind nothing; their `has_*_map` flag is 0.
    pub fn bind(&self, renderer: &mut Renderer, deferred: bool) {
        renderer.set_constant("surface_material", &self.gpu_data());
        if deferred {
            let tag: f32 = match self.kind() {
                MaterialKind::Brdf => 1.0,
                MaterialKind::BlinnPhong => 0.0,
            };
            renderer.set_constant("brdf_or_phong", &tag);
        }
        for (map, texture) in self.maps.present() {
            renderer.set_texture(map.texture_name(), texture);
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(MaterialKind::Brdf)
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
