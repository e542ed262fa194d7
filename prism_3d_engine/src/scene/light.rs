/// Lights and their GPU representation
///
/// A light is one `Light` value whose `kind` carries the type-specific data.
/// `gather` packs the enabled lights of a scene into fixed-capacity arrays
/// laid out exactly like the lighting shaders' uniform arrays.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use crate::resource::BuiltinMesh;
use crate::utils::LinearColor;
use super::transform::Transform;

/// Upload capacity of the point light array
pub const MAX_POINT_LIGHTS: usize = 20;
/// Upload capacity of the spot light array
pub const MAX_SPOT_LIGHTS: usize = 20;

/// (range, linear, quadratic), constant term is always 1
const ATTENUATION_TABLE: [(f32, f32, f32); 12] = [
    (7.0, 0.7, 1.8),
    (13.0, 0.35, 0.44),
    (20.0, 0.22, 0.20),
    (32.0, 0.14, 0.07),
    (50.0, 0.09, 0.032),
    (65.0, 0.07, 0.017),
    (100.0, 0.045, 0.0075),
    (160.0, 0.027, 0.0028),
    (200.0, 0.022, 0.0019),
    (325.0, 0.014, 0.0007),
    (600.0, 0.007, 0.0002),
    (3250.0, 0.0014, 0.000007),
];

/// Attenuation (constant, linear, quadratic) of the first table row covering `range`
pub fn attenuation_for_range(range: f32) -> Vec3 {
    let (_, linear, quadratic) = ATTENUATION_TABLE
        .iter()
        .copied()
        .find(|&(row_range, _, _)| row_range >= range)
        .unwrap_or(ATTENUATION_TABLE[ATTENUATION_TABLE.len() - 1]);
    Vec3::new(1.0, linear, quadratic)
}

// ============================================================================
// LIGHT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    Point,
    Spot,
    Directional,
}

impl LightType {
    /// Scene-file letter: `p`, `s` or `d`
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "p" | "point" => Some(LightType::Point),
            "s" | "spot" => Some(LightType::Spot),
            "d" | "directional" => Some(LightType::Directional),
            _ => None,
        }
    }
}

/// Type-specific light data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Point { range: f32, attenuation: Vec3 },
    /// Full cone angle
    Spot { angle_deg: f32 },
    /// Shadow camera sits `distance` units against the direction, looking at the origin
    Directional { distance: f32, viewport: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub transform: Transform,
    pub color: Vec3,
    pub brightness: f32,
    pub cast_shadow: bool,
    pub enabled: bool,
    pub depth_bias: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub kind: LightKind,
}

impl Light {
    pub const DEFAULT_RANGE: f32 = 50.0;
    pub const DEFAULT_BRIGHTNESS: f32 = 300.0;
    pub const DEFAULT_DEPTH_BIAS: f32 = 0.000_000_5;
    pub const DEFAULT_NEAR_PLANE: f32 = 0.1;
    pub const DEFAULT_FAR_PLANE: f32 = 500.0;
    pub const DEFAULT_SPOT_ANGLE_DEG: f32 = 45.0;
    pub const DEFAULT_DIRECTIONAL_DISTANCE: f32 = 1500.0;
    pub const DEFAULT_DIRECTIONAL_VIEWPORT: f32 = 2048.0;
    /// Shadow frustum of a spot light is this much wider than its cone
    pub const SPOT_SHADOW_FALLOFF: f32 = 1.25;

    fn with_kind(kind: LightKind, position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            color: LinearColor::WHITE,
            brightness: Self::DEFAULT_BRIGHTNESS,
            cast_shadow: false,
            enabled: true,
            depth_bias: Self::DEFAULT_DEPTH_BIAS,
            near_plane: Self::DEFAULT_NEAR_PLANE,
            far_plane: Self::DEFAULT_FAR_PLANE,
            kind,
        }
    }

    pub fn point(position: Vec3, range: f32) -> Self {
        Self::with_kind(
            LightKind::Point { range, attenuation: attenuation_for_range(range) },
            position,
        )
    }

    /// Points along +Z until rotated
    pub fn spot(position: Vec3, angle_deg: f32) -> Self {
        Self::with_kind(LightKind::Spot { angle_deg }, position)
    }

    /// Shines along +Z until rotated; the position is ignored for lighting
    pub fn directional() -> Self {
        let mut light = Self::with_kind(
            LightKind::Directional {
                distance: Self::DEFAULT_DIRECTIONAL_DISTANCE,
                viewport: Vec2::splat(Self::DEFAULT_DIRECTIONAL_VIEWPORT),
            },
            Vec3::ZERO,
        );
        light.far_plane = 2.0 * Self::DEFAULT_DIRECTIONAL_DISTANCE;
        light
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn with_shadow(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }

    pub fn light_type(&self) -> LightType {
        match self.kind {
            LightKind::Point { .. } => LightType::Point,
            LightKind::Spot { .. } => LightType::Spot,
            LightKind::Directional { .. } => LightType::Directional,
        }
    }

    /// Change a point light's range and re-derive its attenuation
    pub fn set_range(&mut self, new_range: f32) {
        if let LightKind::Point { range, attenuation } = &mut self.kind {
            *range = new_range;
            *attenuation = attenuation_for_range(new_range);
        }
    }

    /// Mesh drawn at the light's position by the forward pass
    pub fn marker_mesh(&self) -> BuiltinMesh {
        match self.kind {
            LightKind::Spot { .. } => BuiltinMesh::Cylinder,
            _ => BuiltinMesh::Sphere,
        }
    }

    /// Light direction for spot and directional lights
    pub fn direction(&self) -> Vec3 {
        self.transform.forward()
    }

    // ===== SHADOW MATRICES =====

    pub fn view_matrix(&self) -> Mat4 {
        let position = self.transform.position;
        match self.kind {
            // Single shadow map: the downward cube face
            LightKind::Point { .. } => Mat4::look_to_lh(position, Vec3::NEG_Y, Vec3::Z),
            LightKind::Spot { .. } => {
                Mat4::look_to_lh(position, self.transform.forward(), self.transform.up())
            }
            LightKind::Directional { distance, viewport } => {
                if viewport.x < 1.0 {
                    return Mat4::IDENTITY;
                }
                let direction = self.direction();
                let up = if direction.dot(Vec3::Y).abs() > 0.999 { Vec3::Z } else { Vec3::Y };
                Mat4::look_at_lh(direction * -distance, Vec3::ZERO, up)
            }
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.kind {
            LightKind::Point { .. } => {
                Mat4::perspective_lh(std::f32::consts::FRAC_PI_2, 1.0, self.near_plane, self.far_plane)
            }
            LightKind::Spot { angle_deg } => {
                let fov = (angle_deg * Self::SPOT_SHADOW_FALLOFF).clamp(1.0, 170.0).to_radians();
                Mat4::perspective_lh(fov, 1.0, self.near_plane, self.far_plane)
            }
            LightKind::Directional { viewport, .. } => {
                if viewport.x < 1.0 {
                    return Mat4::IDENTITY;
                }
                let (hw, hh) = (viewport.x * 0.5, viewport.y * 0.5);
                Mat4::orthographic_lh(-hw, hw, -hh, hh, self.near_plane, self.far_plane)
            }
        }
    }

    /// Projection * view; a pure function of the light's fields
    pub fn light_space_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    // ===== GPU DATA =====

    pub fn point_gpu_data(&self) -> Option<PointLightGpu> {
        let LightKind::Point { range, attenuation } = self.kind else {
            return None;
        };
        Some(PointLightGpu {
            position: self.transform.position.to_array(),
            range,
            color: self.color.to_array(),
            brightness: self.brightness,
            attenuation: attenuation.to_array(),
            depth_bias: self.depth_bias,
        })
    }

    pub fn spot_gpu_data(&self) -> Option<SpotLightGpu> {
        let LightKind::Spot { angle_deg } = self.kind else {
            return None;
        };
        Some(SpotLightGpu {
            position: self.transform.position.to_array(),
            half_angle: angle_deg.to_radians() * 0.5,
            color: self.color.to_array(),
            brightness: self.brightness,
            spot_dir: self.direction().to_array(),
            depth_bias: self.depth_bias,
        })
    }

    pub fn directional_gpu_data(&self) -> Option<DirectionalLightGpu> {
        if !matches!(self.kind, LightKind::Directional { .. }) {
            return None;
        }
        Some(DirectionalLightGpu {
            direction: self.direction().to_array(),
            brightness: self.brightness,
            color: self.color.to_array(),
            shadow_factor: if self.cast_shadow { 1.0 } else { 0.0 },
        })
    }
}

// ============================================================================
// GPU LAYOUTS
// ============================================================================

/// `PointLight` of the lighting shaders (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightGpu {
    pub position: [f32; 3],
    pub range: f32,
    pub color: [f32; 3],
    pub brightness: f32,
    pub attenuation: [f32; 3],
    pub depth_bias: f32,
}

/// `SpotLight` of the lighting shaders (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SpotLightGpu {
    pub position: [f32; 3],
    pub half_angle: f32,
    pub color: [f32; 3],
    pub brightness: f32,
    pub spot_dir: [f32; 3],
    pub depth_bias: f32,
}

/// `DirectionalLight` of the lighting shaders (32 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightGpu {
    pub direction: [f32; 3],
    pub brightness: f32,
    pub color: [f32; 3],
    pub shadow_factor: f32,
}

/// `light_counts` of the lighting shaders
///
/// `shadow_type` is 0 without a caster, else 1 + `LightType` index;
/// `shadow_index` is the caster's position in its array.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LightCountsGpu {
    pub point_count: i32,
    pub spot_count: i32,
    pub shadow_type: i32,
    pub shadow_index: i32,
}

/// The caster selected for the shadow pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCaster {
    pub light_type: LightType,
    /// Index into the gathered array of its type
    pub index: usize,
    /// Position of the light in the gathered input
    pub source: usize,
    pub light_space_matrix: Mat4,
}

// ============================================================================
// GATHERING
// ============================================================================

/// Enabled lights of a frame packed for upload
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLightingData {
    pub point_lights: [PointLightGpu; MAX_POINT_LIGHTS],
    pub spot_lights: [SpotLightGpu; MAX_SPOT_LIGHTS],
    pub directional: DirectionalLightGpu,
    pub point_light_count: usize,
    pub spot_light_count: usize,
    pub has_directional: bool,
    pub shadow_caster: Option<ShadowCaster>,
    /// Enabled lights that did not fit
    pub dropped: usize,
}

impl Default for SceneLightingData {
    fn default() -> Self {
        Self {
            point_lights: [PointLightGpu::default(); MAX_POINT_LIGHTS],
            spot_lights: [SpotLightGpu::default(); MAX_SPOT_LIGHTS],
            directional: DirectionalLightGpu::default(),
            point_light_count: 0,
            spot_light_count: 0,
            has_directional: false,
            shadow_caster: None,
            dropped: 0,
        }
    }
}

impl SceneLightingData {
    /// Pack `lights` in order
    ///
    /// Lights past the array capacities (and any directional light after
    /// the first) are counted in `dropped`. The shadow caster is the first
    /// packed light with `cast_shadow` set.
    pub fn gather<'a>(lights: impl IntoIterator<Item = &'a Light>) -> Self {
        let mut data = Self::default();
        for (source, light) in lights.into_iter().enumerate().filter(|(_, light)| light.enabled) {
            let index = match light.light_type() {
                LightType::Point if data.point_light_count < MAX_POINT_LIGHTS => {
                    let Some(gpu) = light.point_gpu_data() else { continue };
                    data.point_lights[data.point_light_count] = gpu;
                    data.point_light_count += 1;
                    data.point_light_count - 1
                }
                LightType::Spot if data.spot_light_count < MAX_SPOT_LIGHTS => {
                    let Some(gpu) = light.spot_gpu_data() else { continue };
                    data.spot_lights[data.spot_light_count] = gpu;
                    data.spot_light_count += 1;
                    data.spot_light_count - 1
                }
                LightType::Directional if !data.has_directional => {
                    let Some(gpu) = light.directional_gpu_data() else { continue };
                    data.directional = gpu;
                    data.has_directional = true;
                    0
                }
                _ => {
                    data.dropped += 1;
                    continue;
                }
            };
            if light.cast_shadow && data.shadow_caster.is_none() {
                data.shadow_caster = Some(ShadowCaster {
                    light_type: light.light_type(),
                    index,
                    source,
                    light_space_matrix: light.light_space_matrix(),
                });
            }
        }
        data
    }

    pub fn counts(&self) -> LightCountsGpu {
        let (shadow_type, shadow_index) = match &self.shadow_caster {
            Some(caster) => (caster.light_type as i32 + 1, caster.index as i32),
            None => (0, 0),
        };
        LightCountsGpu {
            point_count: self.point_light_count as i32,
            spot_count: self.spot_light_count as i32,
            shadow_type,
            shadow_index,
        }
    }

    /// Light-space matrix of the caster, identity without one
    pub fn light_space_matrix(&self) -> Mat4 {
        self.shadow_caster.map(|c| c.light_space_matrix).unwrap_or(Mat4::IDENTITY)
    }

    pub fn active_point_lights(&self) -> &[PointLightGpu] {
        &self.point_lights[..self.point_light_count]
    }

    pub fn active_spot_lights(&self) -> &[SpotLightGpu] {
        &self.spot_lights[..self.spot_light_count]
    }
}

#[cfg(test)]
#[path = "light_tests.rs"]
mod tests;
