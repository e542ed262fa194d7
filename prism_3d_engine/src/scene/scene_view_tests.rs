/// Unit tests for scene_view.rs

use super::*;
use crate::scene::camera::CameraSettings;

#[test]
fn test_view_matches_camera() {
    let camera = Camera::new(CameraSettings::default(), 1.5);
    let view = SceneView::new(&camera, true, (640, 480));
    assert_eq!(view.view, camera.view_matrix());
    assert_eq!(view.projection, camera.projection_matrix());
    assert_eq!(view.view_projection, camera.projection_matrix() * camera.view_matrix());
    assert_eq!(view.camera_position, camera.position());
    assert!(view.is_deferred);
    assert_eq!(view.screen_size, (640, 480));
}

#[test]
fn test_inverse_round_trips() {
    let camera = Camera::default();
    let view = SceneView::new(&camera, false, (1, 1));
    let p = Vec3::new(3.0, 40.0, 20.0);
    let clip = view.view_projection.project_point3(p);
    let back = view.inverse_view_projection.project_point3(clip);
    assert!((back - p).length() < 1e-2);
}
