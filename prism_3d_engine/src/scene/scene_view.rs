/// Per-frame, read-only view snapshot handed to every pass

use glam::{Mat4, Vec3};
use super::camera::Camera;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneView {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    pub camera_position: Vec3,
    /// Geometry goes to the G-buffer instead of being lit directly
    pub is_deferred: bool,
    /// Back buffer size in pixels
    pub screen_size: (u32, u32),
}

impl SceneView {
    pub fn new(camera: &Camera, is_deferred: bool, screen_size: (u32, u32)) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            camera_position: camera.position(),
            is_deferred,
            screen_size,
        }
    }
}

#[cfg(test)]
#[path = "scene_view_tests.rs"]
mod tests;
