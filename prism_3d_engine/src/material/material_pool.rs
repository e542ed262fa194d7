/// Fixed-capacity material storage
///
/// One pool per shading model, each a preallocated `Vec<Material>` with a
/// free list, so create and destroy are O(1) and never allocate.
///
/// `MaterialId` layout: bit 16 set means Blinn-Phong, the low 16 bits are
/// the pool slot. BRDF ids are the bare slot index.

use std::fmt;
use crate::error::Result;
use crate::{engine_bail, engine_error, engine_warn};
use crate::utils::SlotAllocator;
use super::material::Material;

const SOURCE: &str = "prism3d::MaterialPool";

const KIND_BIT: i32 = 1 << 16;
const INDEX_MASK: i32 = KIND_BIT - 1;

// ============================================================================
// IDS
// ============================================================================

/// Shading model of a pooled material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Brdf,
    BlinnPhong,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 2] = [MaterialKind::Brdf, MaterialKind::BlinnPhong];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(i32);

impl MaterialId {
    pub const INVALID: MaterialId = MaterialId(-1);

    /// Largest slot count a pool can address
    pub const MAX_INDEX: u32 = INDEX_MASK as u32;

    pub fn new(kind: MaterialKind, index: u32) -> Self {
        let index = index as i32 & INDEX_MASK;
        match kind {
            MaterialKind::Brdf => MaterialId(index),
            MaterialKind::BlinnPhong => MaterialId(KIND_BIT + index),
        }
    }

    pub fn from_raw(raw: i32) -> Self {
        MaterialId(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    pub fn kind(self) -> Option<MaterialKind> {
        if !self.is_valid() {
            return None;
        }
        if self.0 & KIND_BIT != 0 {
            Some(MaterialKind::BlinnPhong)
        } else {
            Some(MaterialKind::Brdf)
        }
    }

    /// Pool slot the id refers to
    pub fn index(self) -> Option<u32> {
        self.is_valid().then_some((self.0 & INDEX_MASK) as u32)
    }
}

impl Default for MaterialId {
    fn default() -> Self {
        MaterialId::INVALID
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.index()) {
            (Some(kind), Some(index)) => write!(f, "{:?}#{}", kind, index),
            _ => write!(f, "material#invalid"),
        }
    }
}

// ============================================================================
// POOL
// ============================================================================

struct KindPool {
    kind: MaterialKind,
    materials: Vec<Material>,
    allocator: SlotAllocator,
}

impl KindPool {
    fn new(kind: MaterialKind, capacity: u32) -> Self {
        Self {
            kind,
            materials: vec![Material::new(kind); capacity as usize],
            allocator: SlotAllocator::with_capacity(capacity),
        }
    }

    fn create(&mut self, material: Material) -> Option<u32> {
        let index = self.allocator.alloc()?;
        self.materials[index as usize] = material;
        Some(index)
    }
}

pub struct MaterialPool {
    brdf: KindPool,
    blinn_phong: KindPool,
    defaults: [Material; 2],
}

impl MaterialPool {
    /// Pool holding up to `capacity` materials of each kind
    pub fn new(capacity: u32) -> Result<Self> {
        if capacity == 0 || capacity > MaterialId::MAX_INDEX {
            engine_bail!(SOURCE, "Material pool capacity must be in 1..={} (got {})", MaterialId::MAX_INDEX, capacity);
        }
        Ok(Self {
            brdf: KindPool::new(MaterialKind::Brdf, capacity),
            blinn_phong: KindPool::new(MaterialKind::BlinnPhong, capacity),
            defaults: [Material::new(MaterialKind::Brdf), Material::new(MaterialKind::BlinnPhong)],
        })
    }

    fn pool(&self, kind: MaterialKind) -> &KindPool {
        match kind {
            MaterialKind::Brdf => &self.brdf,
            MaterialKind::BlinnPhong => &self.blinn_phong,
        }
    }

    fn pool_mut(&mut self, kind: MaterialKind) -> &mut KindPool {
        match kind {
            MaterialKind::Brdf => &mut self.brdf,
            MaterialKind::BlinnPhong => &mut self.blinn_phong,
        }
    }

    /// New material with the defaults of `kind`
    pub fn create(&mut self, kind: MaterialKind) -> MaterialId {
        self.insert(Material::new(kind))
    }

    /// Store a configured material; its shading model selects the pool
    pub fn insert(&mut self, material: Material) -> MaterialId {
        let kind = material.kind();
        let pool = self.pool_mut(kind);
        match pool.create(material) {
            Some(index) => MaterialId::new(kind, index),
            None => {
                engine_error!(SOURCE, "{:?} material pool is full ({} materials)", kind, pool.materials.len());
                MaterialId::INVALID
            }
        }
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        let (kind, index) = (id.kind()?, id.index()?);
        let pool = self.pool(kind);
        if !pool.allocator.is_allocated(index) {
            return None;
        }
        pool.materials.get(index as usize)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        let (kind, index) = (id.kind()?, id.index()?);
        let pool = self.pool_mut(kind);
        if !pool.allocator.is_allocated(index) {
            return None;
        }
        pool.materials.get_mut(index as usize)
    }

    /// Material for `id`, or the default material of its kind when the id is stale
    pub fn get_or_default(&self, id: MaterialId) -> &Material {
        match self.get(id) {
            Some(material) => material,
            None => self.default_material(id.kind().unwrap_or(MaterialKind::Brdf)),
        }
    }

    pub fn default_material(&self, kind: MaterialKind) -> &Material {
        &self.defaults[kind as usize]
    }

    /// Return a material's slot to its pool; the id stops resolving
    pub fn destroy(&mut self, id: MaterialId) -> bool {
        let (Some(kind), Some(index)) = (id.kind(), id.index()) else {
            engine_warn!(SOURCE, "destroy called with {}", id);
            return false;
        };
        let pool = self.pool_mut(kind);
        if !pool.allocator.free(index) {
            engine_warn!(SOURCE, "{} is not live", id);
            return false;
        }
        pool.materials[index as usize] = Material::new(pool.kind);
        true
    }

    pub fn len(&self, kind: MaterialKind) -> usize {
        self.pool(kind).allocator.len() as usize
    }

    pub fn capacity(&self) -> usize {
        self.brdf.materials.len()
    }

    pub fn clear(&mut self) {
        for kind in MaterialKind::ALL {
            let pool = self.pool_mut(kind);
            pool.allocator.clear();
            pool.materials.fill(Material::new(kind));
        }
    }
}

#[cfg(test)]
#[path = "material_pool_tests.rs"]
mod tests;
