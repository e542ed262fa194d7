/// Free-fly camera
///
/// Yaw/pitch orientation, velocity integrated with linear drag, vertical-FOV
/// left-handed perspective. The view matrix is rebuilt by `update` and
/// `configure`; the position then advances by the velocity, so a frame sees
/// the view from where the camera was when the frame started.

use glam::{EulerRot, Mat4, Quat, Vec3};
use crate::input::{Input, Key};

/// Start-up camera parameters (the scene file `camera` line)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub near: f32,
    pub far: f32,
    /// Vertical field of view
    pub fov_deg: f32,
    pub position: Vec3,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 1500.0,
            fov_deg: 75.0,
            position: Vec3::new(0.0, 50.0, -100.0),
            yaw_deg: 0.0,
            pitch_deg: 15.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub move_speed: f32,
    pub angular_speed_deg: f32,
    pub drag: f32,

    settings: CameraSettings,
    aspect: f32,
    position: Vec3,
    velocity: Vec3,
    yaw: f32,
    pitch: f32,
    view: Mat4,
    projection: Mat4,
}

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2;

impl Camera {
    pub const DEFAULT_MOVE_SPEED: f32 = 1000.0;
    pub const DEFAULT_ANGULAR_SPEED_DEG: f32 = 20.0;
    pub const DEFAULT_DRAG: f32 = 9.5;

    pub fn new(settings: CameraSettings, aspect: f32) -> Self {
        let mut camera = Self {
            move_speed: Self::DEFAULT_MOVE_SPEED,
            angular_speed_deg: Self::DEFAULT_ANGULAR_SPEED_DEG,
            drag: Self::DEFAULT_DRAG,
            settings,
            aspect,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.configure(settings, aspect);
        camera
    }

    /// Place the camera and build its projection from `settings`
    pub fn configure(&mut self, settings: CameraSettings, aspect: f32) {
        self.settings = settings;
        self.aspect = aspect;
        self.position = settings.position;
        self.velocity = Vec3::ZERO;
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.rotate(settings.yaw_deg.to_radians(), settings.pitch_deg.to_radians(), 1.0);
        self.set_projection(settings.fov_deg, aspect, settings.near, settings.far);
        self.rebuild_view();
    }

    /// Back to the configured start state
    pub fn reset(&mut self) {
        self.configure(self.settings, self.aspect);
    }

    pub fn set_projection(&mut self, fov_deg: f32, aspect: f32, near: f32, far: f32) {
        self.aspect = aspect;
        self.projection = Mat4::perspective_lh(fov_deg.to_radians(), aspect.max(f32::EPSILON), near, far);
    }

    /// Keep the field of view, change the aspect ratio (window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        let s = self.settings;
        self.set_projection(s.fov_deg, aspect, s.near, s.far);
    }

    /// Mouse look, keyboard motion, view rebuild, then integration
    pub fn update(&mut self, dt: f32, input: &dyn Input) {
        let delta = input.mouse_delta();
        let angular = self.angular_speed_deg.to_radians() * dt;
        self.rotate(delta.x, delta.y, angular);
        self.accelerate(dt, input);
        self.rebuild_view();
        self.position += self.velocity * dt;
    }

    fn rotate(&mut self, yaw: f32, pitch: f32, scale: f32) {
        self.yaw += yaw * scale;
        self.pitch = (self.pitch + pitch * scale).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    fn accelerate(&mut self, dt: f32, input: &dyn Input) {
        let rotation = self.rotation();
        let mut direction = Vec3::ZERO;
        let bindings = [
            (Key::A, Vec3::NEG_X),
            (Key::D, Vec3::X),
            (Key::W, Vec3::Z),
            (Key::S, Vec3::NEG_Z),
            (Key::E, Vec3::Y),
            (Key::Q, Vec3::NEG_Y),
        ];
        for (key, axis) in bindings {
            if input.is_key_down(key) {
                direction += rotation * axis;
            }
        }
        if input.is_key_down(Key::Shift) {
            direction *= 2.0;
        }
        direction *= 4.0;
        self.velocity += (direction * self.move_speed - self.velocity * self.drag) * dt;
    }

    fn rebuild_view(&mut self) {
        let rotation = self.rotation();
        self.view = Mat4::look_to_lh(self.position, rotation * Vec3::Z, rotation * Vec3::Y);
    }

    /// Pitch around X, then yaw around Y
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.rebuild_view();
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw.to_degrees()
    }

    pub fn pitch_deg(&self) -> f32 {
        self.pitch.to_degrees()
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraSettings::default(), 16.0 / 9.0)
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
