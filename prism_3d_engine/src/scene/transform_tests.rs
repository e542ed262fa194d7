/// Unit tests for transform.rs

use super::*;

fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1e-5
}

#[test]
fn test_identity_basis() {
    let t = Transform::default();
    assert_eq!(t.world_matrix(), Mat4::IDENTITY);
    assert!(approx(t.forward(), Vec3::Z));
    assert!(approx(t.up(), Vec3::Y));
    assert!(approx(t.right(), Vec3::X));
}

#[test]
fn test_world_matrix_scales_then_translates() {
    let mut t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
    t.set_uniform_scale(2.0);
    let p = t.world_matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
    assert!(approx(p, Vec3::new(3.0, 2.0, 3.0)));
}

#[test]
fn test_rotate_around_global_y() {
    let mut t = Transform::default();
    t.rotate_around_global_y_degrees(90.0);
    assert!(approx(t.forward(), Vec3::X));
}

#[test]
fn test_global_rotations_compose_in_call_order() {
    // X first: forward goes to -Y; then Y about the global axis leaves it there
    let mut t = Transform::default();
    t.rotate_around_global_x_degrees(90.0);
    t.rotate_around_global_y_degrees(90.0);
    assert!(approx(t.forward(), Vec3::NEG_Y));

    // Y first: forward goes to +X; X about the global axis leaves it there
    let mut u = Transform::default();
    u.rotate_around_global_y_degrees(90.0);
    u.rotate_around_global_x_degrees(90.0);
    assert!(approx(u.forward(), Vec3::X));
}

#[test]
fn test_normal_matrix_undoes_non_uniform_scale() {
    let mut t = Transform::default();
    t.scale = Vec3::new(2.0, 1.0, 1.0);
    let n = t.normal_matrix().transform_vector3(Vec3::X);
    assert!(approx(n, Vec3::new(0.5, 0.0, 0.0)));
}
