//! Surface materials
//!
//! A `Material` carries the parameters shared by every lighting model plus a
//! `ShadingModel` variant with the model-specific ones. Materials live in a
//! `MaterialPool` and are referenced by `MaterialId`, whose value encodes
//! both the shading model and the pool slot.

mod material;
mod material_pool;

pub use material::{
    Material, MaterialMaps, MaterialMap, ShadingModel, SurfaceMaterialGpu,
    BlinnPhongPreset,
};
pub use material_pool::{MaterialPool, MaterialId, MaterialKind};
