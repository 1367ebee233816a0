//! Perspective camera: position + look-at target, projection cached until parameters change.

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// Point the camera looks at.
    pub target: Vec3,
    pub up: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self::new(config.fov_degrees, aspect, config.initial_near, config.initial_far)
    }

    /// Recompute the projection after changing fov, aspect or planes.
    pub fn update_projection(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn look_at(&mut self, point: Vec3) {
        self.target = point;
    }

    pub fn view(&self) -> Mat4 {
        let forward = self.target - self.position;
        if forward.length_squared() <= f32::EPSILON * f32::EPSILON {
            return Mat4::from_translation(-self.position);
        }
        // look_at degenerates when looking straight along `up`.
        let up = if forward.normalize().cross(self.up).length_squared() < 1e-12 {
            Vec3::Z
        } else {
            self.up
        };
        Mat4::look_at_rh(self.position, self.target, up)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view()
    }

    /// Camera-space right and up axes in world space.
    pub fn basis(&self) -> (Vec3, Vec3) {
        let view = self.view();
        let inv = view.inverse();
        (inv.x_axis.truncate(), inv.y_axis.truncate())
    }
}
