/// Unit tests for material_pool.rs

use super::*;
use glam::Vec3;
use crate::material::{BlinnPhongPreset, ShadingModel};

#[test]
fn test_id_encoding() {
    assert_eq!(MaterialId::new(MaterialKind::Brdf, 7).raw(), 7);
    assert_eq!(MaterialId::new(MaterialKind::BlinnPhong, 7).raw(), (1 << 16) + 7);
    assert_eq!(MaterialId::INVALID.kind(), None);
    assert_eq!(MaterialId::INVALID.index(), None);
    assert_eq!(MaterialId::default(), MaterialId::INVALID);
}

#[test]
fn test_created_ids_round_trip() {
    let mut pool = MaterialPool::new(16).unwrap();
    for round in 0..3u32 {
        for kind in MaterialKind::ALL {
            let id = pool.create(kind);
            assert_eq!(id.kind(), Some(kind));
            assert_eq!(id.index(), Some(round));
            assert_eq!(pool.get(id).unwrap().kind(), kind);
        }
    }
    assert_eq!(pool.len(MaterialKind::Brdf), 3);
    assert_eq!(pool.len(MaterialKind::BlinnPhong), 3);
}

#[test]
fn test_kinds_use_separate_slots() {
    let mut pool = MaterialPool::new(4).unwrap();
    let brdf = pool.create(MaterialKind::Brdf);
    let phong = pool.create(MaterialKind::BlinnPhong);
    assert_eq!(brdf.index(), phong.index());
    assert_ne!(brdf, phong);

    pool.get_mut(brdf).unwrap().diffuse = Vec3::X;
    assert_eq!(pool.get(phong).unwrap().diffuse, Vec3::ONE);
}

#[test]
fn test_defaults_per_kind() {
    let mut pool = MaterialPool::new(4).unwrap();
    let brdf = pool.create(MaterialKind::Brdf);
    let phong = pool.create(MaterialKind::BlinnPhong);
    assert_eq!(
        pool.get(brdf).unwrap().model,
        ShadingModel::Brdf { roughness: 0.6, metalness: 0.1 }
    );
    assert_eq!(pool.get(phong).unwrap().model, ShadingModel::BlinnPhong { shininess: 90.0 });
}

#[test]
fn test_destroy_invalidates_and_recycles() {
    let mut pool = MaterialPool::new(4).unwrap();
    let first = pool.create(MaterialKind::BlinnPhong);
    pool.get_mut(first).unwrap().alpha = 0.25;

    assert!(pool.destroy(first));
    assert!(pool.get(first).is_none());
    assert!(!pool.destroy(first));

    let again = pool.create(MaterialKind::BlinnPhong);
    assert_eq!(again, first);
    assert_eq!(pool.get(again).unwrap().alpha, 1.0);
}

#[test]
fn test_full_pool_returns_invalid() {
    let mut pool = MaterialPool::new(2).unwrap();
    assert!(pool.create(MaterialKind::Brdf).is_valid());
    assert!(pool.create(MaterialKind::Brdf).is_valid());
    assert_eq!(pool.create(MaterialKind::Brdf), MaterialId::INVALID);
    // The other kind has its own capacity
    assert!(pool.create(MaterialKind::BlinnPhong).is_valid());
}

#[test]
fn test_insert_selects_pool_from_model() {
    let mut pool = MaterialPool::new(4).unwrap();
    let id = pool.insert(Material::from_preset(BlinnPhongPreset::Ruby));
    assert_eq!(id.kind(), Some(MaterialKind::BlinnPhong));
    assert_eq!(pool.get(id).unwrap().model, ShadingModel::BlinnPhong { shininess: 76.8 });
}

#[test]
fn test_stale_ids_fall_back_to_defaults() {
    let mut pool = MaterialPool::new(4).unwrap();
    let id = pool.insert(Material::brdf(Vec3::X, 0.2, 0.9));
    pool.destroy(id);
    assert_eq!(pool.get_or_default(id), pool.default_material(MaterialKind::Brdf));
    assert_eq!(pool.get_or_default(MaterialId::INVALID).kind(), MaterialKind::Brdf);
}

#[test]
fn test_capacity_bounds() {
    assert!(MaterialPool::new(0).is_err());
    assert!(MaterialPool::new(MaterialId::MAX_INDEX + 1).is_err());

    let mut pool = MaterialPool::new(3).unwrap();
    assert_eq!(pool.capacity(), 3);
    pool.create(MaterialKind::Brdf);
    pool.clear();
    assert_eq!(pool.len(MaterialKind::Brdf), 0);
}
