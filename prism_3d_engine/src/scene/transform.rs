/// Position, orientation and scale of a scene entity
///
/// Left-handed, Y up, +Z forward. Rotations given in degrees are applied
/// around the global axes (pre-multiplied onto the current orientation).

use glam::{Mat3, Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::IDENTITY }
    }

    /// Scale, then rotate, then translate
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Inverse-transpose of the upper 3x3, for normals under non-uniform scale
    pub fn normal_matrix(&self) -> Mat4 {
        let linear = Mat3::from_mat4(self.world_matrix());
        Mat4::from_mat3(linear.inverse().transpose())
    }

    pub fn rotate_around_global_x_degrees(&mut self, degrees: f32) {
        self.rotation = (Quat::from_rotation_x(degrees.to_radians()) * self.rotation).normalize();
    }

    pub fn rotate_around_global_y_degrees(&mut self, degrees: f32) {
        self.rotation = (Quat::from_rotation_y(degrees.to_radians()) * self.rotation).normalize();
    }

    pub fn rotate_around_global_z_degrees(&mut self, degrees: f32) {
        self.rotation = (Quat::from_rotation_z(degrees.to_radians()) * self.rotation).normalize();
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vec3::splat(scale);
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
