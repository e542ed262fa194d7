/// Scene entities
///
/// A game object references its mesh and materials by handle; the renderer
/// owns the buffers and the scene's material pool owns the materials.

use bitflags::bitflags;
use slotmap::new_key_type;
use crate::material::MaterialId;
use crate::renderer::Renderer;
use crate::resource::{BufferId, BuiltinMesh};
use super::transform::Transform;

new_key_type! {
    /// Stable, generation-checked key of a GameObject within a Scene.
    ///
    /// A key stops resolving once its object is removed, even if the slot
    /// is reused by a later object.
    pub struct GameObjectKey;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderSettings: u32 {
        /// Drawn by the geometry pass
        const RENDER = 1 << 0;
        /// Drawn into the shadow map
        const CAST_SHADOW = 1 << 1;
        /// Tangent frame debug overlay
        const RENDER_TBN = 1 << 2;
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings::RENDER | RenderSettings::CAST_SHADOW
    }
}

/// Geometry reference of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshRef {
    Builtin(BuiltinMesh),
    Buffer(BufferId),
}

impl MeshRef {
    pub fn resolve(self, renderer: &Renderer) -> BufferId {
        match self {
            MeshRef::Builtin(mesh) => renderer.builtin_mesh(mesh),
            MeshRef::Buffer(id) => id,
        }
    }
}

impl From<BuiltinMesh> for MeshRef {
    fn from(mesh: BuiltinMesh) -> Self {
        MeshRef::Builtin(mesh)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub mesh: MeshRef,
    /// One per submesh; built-in meshes have a single submesh
    pub materials: Vec<MaterialId>,
}

impl Model {
    pub fn new(mesh: impl Into<MeshRef>, material: MaterialId) -> Self {
        Self { mesh: mesh.into(), materials: vec![material] }
    }

    /// Material of the first submesh, `INVALID` when there is none
    pub fn material(&self) -> MaterialId {
        self.materials.first().copied().unwrap_or(MaterialId::INVALID)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub transform: Transform,
    pub model: Model,
    pub render_settings: RenderSettings,
}

impl GameObject {
    pub fn new(transform: Transform, model: Model) -> Self {
        Self { transform, model, render_settings: RenderSettings::default() }
    }

    pub fn is_rendered(&self) -> bool {
        self.render_settings.contains(RenderSettings::RENDER)
    }

    pub fn casts_shadow(&self) -> bool {
        self.render_settings.contains(RenderSettings::CAST_SHADOW)
    }
}
