/// Scene: game objects, lights, the camera and the materials they use.
///
/// Objects live in a SlotMap: keys are generation-checked, so a pass holding
/// a key of a removed object gets `None` instead of a different object.
/// The scene is what the passes consume: a draw list, the shadow casters
/// and the packed lights of the frame.

use glam::Mat4;
use slotmap::SlotMap;
use crate::error::Result;
use crate::engine_warn;
use crate::input::Input;
use crate::material::{Material, MaterialId, MaterialPool};
use crate::resource::TextureId;
use super::camera::{Camera, CameraSettings};
use super::game_object::{GameObject, GameObjectKey, MeshRef, Model, RenderSettings};
use super::light::{Light, SceneLightingData};
use super::scene_parser::SceneDescription;
use super::transform::Transform;

const SOURCE: &str = "prism3d::Scene";

/// Materials per shading model in a scene's pool
pub const DEFAULT_MATERIAL_CAPACITY: u32 = 1024;

/// One draw of the geometry pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRequest {
    pub key: GameObjectKey,
    pub world: Mat4,
    pub normal: Mat4,
    pub mesh: MeshRef,
    pub material: MaterialId,
    pub render_settings: RenderSettings,
}

impl DrawRequest {
    fn of(key: GameObjectKey, object: &GameObject) -> Self {
        Self {
            key,
            world: object.transform.world_matrix(),
            normal: object.transform.normal_matrix(),
            mesh: object.model.mesh,
            material: object.model.material(),
            render_settings: object.render_settings,
        }
    }
}

pub struct Scene {
    objects: SlotMap<GameObjectKey, GameObject>,
    lights: Vec<Light>,
    camera: Camera,
    materials: MaterialPool,
    /// Material of objects described without one
    default_material: MaterialId,
    /// Equirectangular environment, `TextureId::INVALID` for none
    skybox: TextureId,
    /// Dropped-light count last reported, to warn once per change
    reported_overflow: usize,
}

impl Scene {
    /// Empty scene with a default camera
    pub fn new(aspect: f32, material_capacity: u32) -> Result<Self> {
        let mut materials = MaterialPool::new(material_capacity)?;
        let default_material = materials.insert(Material::default());
        Ok(Self {
            objects: SlotMap::with_key(),
            lights: Vec::new(),
            camera: Camera::new(CameraSettings::default(), aspect),
            materials,
            default_material,
            skybox: TextureId::INVALID,
            reported_overflow: 0,
        })
    }

    /// Build a scene from a parsed description
    ///
    /// The first camera of the description is used. Object materials are
    /// inserted into the scene's pool; objects without one share the
    /// default material.
    pub fn from_description(description: &SceneDescription, aspect: f32, material_capacity: u32) -> Result<Self> {
        let mut scene = Self::new(aspect, material_capacity)?;
        if let Some(settings) = description.cameras.first() {
            scene.camera.configure(*settings, aspect);
        }
        scene.lights = description.lights.clone();
        for object in &description.objects {
            let material = match &object.material {
                Some(material) => scene.materials.insert(material.clone()),
                None => scene.default_material,
            };
            let mut game_object = GameObject::new(object.transform, Model::new(object.mesh, material));
            game_object.render_settings = object.render_settings;
            scene.objects.insert(game_object);
        }
        Ok(scene)
    }

    // ===== OBJECTS =====

    pub fn add_object(&mut self, object: GameObject) -> GameObjectKey {
        self.objects.insert(object)
    }

    /// Convenience: an object with the default render settings
    pub fn spawn(&mut self, transform: Transform, mesh: impl Into<MeshRef>, material: MaterialId) -> GameObjectKey {
        self.add_object(GameObject::new(transform, Model::new(mesh, material)))
    }

    pub fn remove_object(&mut self, key: GameObjectKey) -> Option<GameObject> {
        self.objects.remove(key)
    }

    pub fn object(&self, key: GameObjectKey) -> Option<&GameObject> {
        self.objects.get(key)
    }

    pub fn object_mut(&mut self, key: GameObjectKey) -> Option<&mut GameObject> {
        self.objects.get_mut(key)
    }

    pub fn objects(&self) -> impl Iterator<Item = (GameObjectKey, &GameObject)> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // ===== LIGHTS, CAMERA, MATERIALS =====

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [Light] {
        &mut self.lights
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn materials(&self) -> &MaterialPool {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialPool {
        &mut self.materials
    }

    pub fn default_material(&self) -> MaterialId {
        self.default_material
    }

    pub fn skybox(&self) -> TextureId {
        self.skybox
    }

    /// The scene does not own the texture; returns the one it replaces
    pub fn set_skybox(&mut self, texture: TextureId) -> TextureId {
        std::mem::replace(&mut self.skybox, texture)
    }

    /// Material of a draw, falling back to the default for stale ids
    pub fn material(&self, id: MaterialId) -> &Material {
        self.materials
            .get(id)
            .or_else(|| self.materials.get(self.default_material))
            .unwrap_or_else(|| self.materials.get_or_default(id))
    }

    // ===== FRAME =====

    /// Per-frame simulation step; objects are static
    pub fn update(&mut self, dt: f32, input: &dyn Input) {
        self.camera.update(dt, input);
    }

    /// Pack the enabled lights for upload
    ///
    /// Lights beyond the array capacities are dropped for the frame; a
    /// warning is logged whenever the number of dropped lights changes.
    pub fn gather_lights(&mut self) -> SceneLightingData {
        let data = SceneLightingData::gather(&self.lights);
        if data.dropped != self.reported_overflow {
            if data.dropped > 0 {
                engine_warn!(SOURCE, "{} lights exceed the upload capacity and are not rendered", data.dropped);
            }
            self.reported_overflow = data.dropped;
        }
        data
    }

    /// Light the shadow pass renders from
    ///
    /// The first gathered light with `cast_shadow` set; a caster dropped by
    /// the upload capacity does not count.
    pub fn shadow_caster(&self) -> Option<&Light> {
        let caster = SceneLightingData::gather(&self.lights).shadow_caster?;
        self.lights.get(caster.source)
    }

    /// Objects drawn into the shadow map
    pub fn z_pass_objects(&self) -> Vec<DrawRequest> {
        self.objects
            .iter()
            .filter(|(_, object)| object.casts_shadow())
            .map(|(key, object)| DrawRequest::of(key, object))
            .collect()
    }

    /// Objects drawn by the geometry pass
    pub fn render_list(&self) -> Vec<DrawRequest> {
        self.objects
            .iter()
            .filter(|(_, object)| object.is_rendered())
            .map(|(key, object)| DrawRequest::of(key, object))
            .collect()
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
