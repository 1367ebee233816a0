//! Orbit camera controller: spherical orbit around a target with damping, auto-rotation,
//! screen-space panning and dolly zoom. Pointer deltas accumulate between updates; `update`
//! applies them (damped) and moves the camera.

use std::f32::consts::PI;

use glam::Vec3;

use crate::camera::PerspectiveCamera;
use crate::config::ControlsConfig;

const EPS: f32 = 1e-6;

/// Pointer input already translated from the host's event system. Deltas are in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlInput {
    /// Pointer pressed on the surface; auto-rotation pauses until `End`.
    Begin,
    End,
    Rotate { dx: f32, dy: f32 },
    Pan { dx: f32, dy: f32 },
    /// Wheel delta; negative moves closer.
    Zoom { delta_y: f32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth around +Y, measured from +Z towards +X.
    theta: f32,
}

impl Spherical {
    fn from_vec(v: Vec3) -> Self {
        let radius = v.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_vec(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub screen_space_panning: bool,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    sphere_delta: Spherical,
    pan_offset: Vec3,
    scale: f32,
    interacting: bool,
    target0: Vec3,
    position0: Vec3,
}

impl OrbitControls {
    /// Controller orbiting the origin; the camera's current position becomes the reset state.
    pub fn new(camera: &PerspectiveCamera) -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            screen_space_panning: true,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            sphere_delta: Spherical::default(),
            pan_offset: Vec3::ZERO,
            scale: 1.0,
            interacting: false,
            target0: Vec3::ZERO,
            position0: camera.position,
        }
    }

    pub fn apply_config(&mut self, config: &ControlsConfig) {
        self.enable_damping = config.damping_factor > 0.0;
        self.damping_factor = config.damping_factor;
        self.rotate_speed = config.rotate_speed;
        self.pan_speed = config.pan_speed;
        self.zoom_speed = config.zoom_speed;
        self.screen_space_panning = config.screen_space_panning;
        self.auto_rotate = config.auto_rotate;
        self.auto_rotate_speed = config.auto_rotate_speed;
    }

    /// Make the current target and camera position the state `reset` returns to.
    pub fn save_state(&mut self, camera: &PerspectiveCamera) {
        self.target0 = self.target;
        self.position0 = camera.position;
    }

    /// Restore the saved target/position and drop any pending motion.
    pub fn reset(&mut self, camera: &mut PerspectiveCamera) {
        self.target = self.target0;
        camera.position = self.position0;
        camera.update_projection();
        self.sphere_delta = Spherical::default();
        self.pan_offset = Vec3::ZERO;
        self.scale = 1.0;
        self.interacting = false;
        self.update(camera, 0.0);
    }

    pub fn is_interacting(&self) -> bool {
        self.interacting
    }

    /// True while damped motion is still being applied.
    pub fn is_settling(&self) -> bool {
        self.sphere_delta.theta.abs() > EPS || self.sphere_delta.phi.abs() > EPS || self.pan_offset.length() > EPS
    }

    fn rotate_left(&mut self, angle: f32) {
        self.sphere_delta.theta -= angle;
    }

    fn rotate_up(&mut self, angle: f32) {
        self.sphere_delta.phi -= angle;
    }

    fn pan(&mut self, dx: f32, dy: f32, camera: &PerspectiveCamera, viewport_height: f32) {
        let offset = camera.position - self.target;
        let target_distance = offset.length() * (camera.fov_degrees.to_radians() / 2.0).tan();
        let (right, up) = camera.basis();
        let left = right * -(2.0 * dx * target_distance / viewport_height);
        let up_dir = if self.screen_space_panning { up } else { camera.up.cross(right) };
        let upward = up_dir * (2.0 * dy * target_distance / viewport_height);
        self.pan_offset += left + upward;
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    /// Accumulate one pointer event. `viewport_height` is the surface height in the same pixels
    /// as the deltas.
    pub fn handle_input(&mut self, input: ControlInput, camera: &PerspectiveCamera, viewport_height: f32) {
        let h = viewport_height.max(1.0);
        match input {
            ControlInput::Begin => self.interacting = true,
            ControlInput::End => self.interacting = false,
            ControlInput::Rotate { dx, dy } => {
                self.rotate_left(2.0 * PI * dx * self.rotate_speed / h);
                self.rotate_up(2.0 * PI * dy * self.rotate_speed / h);
            }
            ControlInput::Pan { dx, dy } => {
                self.pan(dx * self.pan_speed, dy * self.pan_speed, camera, h);
            }
            ControlInput::Zoom { delta_y } => {
                if delta_y < 0.0 {
                    self.scale *= self.zoom_scale();
                } else if delta_y > 0.0 {
                    self.scale /= self.zoom_scale();
                }
            }
        }
    }

    /// Advance by `dt` seconds: apply auto-rotation and (damped) deltas, then place the camera.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, dt: f32) {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_vec(offset);

        if self.auto_rotate && !self.interacting {
            self.rotate_left(2.0 * PI / 60.0 * self.auto_rotate_speed * dt);
        }

        if self.enable_damping {
            spherical.theta += self.sphere_delta.theta * self.damping_factor;
            spherical.phi += self.sphere_delta.phi * self.damping_factor;
        } else {
            spherical.theta += self.sphere_delta.theta;
            spherical.phi += self.sphere_delta.phi;
        }

        let min_phi = self.min_polar_angle.max(EPS);
        let max_phi = self.max_polar_angle.min(PI - EPS);
        spherical.phi = spherical.phi.clamp(min_phi, max_phi);

        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance.max(self.min_distance));

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        camera.position = self.target + spherical.to_vec();
        camera.look_at(self.target);

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.sphere_delta.theta *= keep;
            self.sphere_delta.phi *= keep;
            self.pan_offset *= keep;
        } else {
            self.sphere_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(p: Vec3) -> PerspectiveCamera {
        let mut cam = PerspectiveCamera::new(20.0, 1.0, 0.01, 100.0);
        cam.position = p;
        cam
    }

    #[test]
    fn spherical_round_trip() {
        let v = Vec3::new(-0.2, 0.4, 1.4);
        let back = Spherical::from_vec(v).to_vec();
        assert!((back - v).length() < 1e-5);
    }

    #[test]
    fn auto_rotate_keeps_distance_and_height() {
        let mut cam = camera_at(Vec3::new(0.0, 1.0, 3.0));
        let mut controls = OrbitControls::new(&cam);
        controls.auto_rotate = true;
        let r0 = cam.position.length();
        for _ in 0..120 {
            controls.update(&mut cam, 1.0 / 60.0);
        }
        assert!((cam.position.length() - r0).abs() < 1e-4);
        assert!((cam.position.y - 1.0).abs() < 1e-4);
        assert!((cam.position.z - 3.0).abs() > 1e-3);
    }

    #[test]
    fn damped_rotation_converges_to_full_delta() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 5.0));
        let mut controls = OrbitControls::new(&cam);
        controls.enable_damping = true;
        controls.damping_factor = 0.07;
        // Quarter turn: 2π·dx/h = π/2.
        controls.handle_input(ControlInput::Rotate { dx: 100.0, dy: 0.0 }, &cam, 400.0);
        controls.update(&mut cam, 0.0);
        let first = Spherical::from_vec(cam.position).theta;
        assert!((first + PI / 2.0 * 0.07).abs() < 1e-4);
        for _ in 0..500 {
            controls.update(&mut cam, 0.0);
        }
        let theta = Spherical::from_vec(cam.position).theta;
        assert!((theta + PI / 2.0).abs() < 1e-3, "theta {}", theta);
        assert!(!controls.is_settling());
    }

    #[test]
    fn polar_angle_is_clamped_away_from_poles() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 5.0));
        let mut controls = OrbitControls::new(&cam);
        controls.handle_input(ControlInput::Rotate { dx: 0.0, dy: 10_000.0 }, &cam, 100.0);
        controls.update(&mut cam, 0.0);
        assert!(cam.position.x.is_finite() && cam.view().is_finite());
        let phi = Spherical::from_vec(cam.position).phi;
        assert!(phi >= 0.0 && phi < 1e-3);
    }

    #[test]
    fn zoom_scales_and_clamps_distance() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 10.0));
        let mut controls = OrbitControls::new(&cam);
        controls.handle_input(ControlInput::Zoom { delta_y: -1.0 }, &cam, 800.0);
        controls.update(&mut cam, 0.0);
        assert!((cam.position.length() - 9.5).abs() < 1e-4);

        controls.max_distance = 12.0;
        for _ in 0..20 {
            controls.handle_input(ControlInput::Zoom { delta_y: 1.0 }, &cam, 800.0);
        }
        controls.update(&mut cam, 0.0);
        assert!((cam.position.length() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn screen_space_pan_moves_target_in_view_plane() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 5.0));
        cam.look_at(Vec3::ZERO);
        let mut controls = OrbitControls::new(&cam);
        controls.handle_input(ControlInput::Pan { dx: 0.0, dy: 100.0 }, &cam, 800.0);
        controls.update(&mut cam, 0.0);
        assert!(controls.target.y > 0.0);
        assert!(controls.target.x.abs() < 1e-6 && controls.target.z.abs() < 1e-6);
        controls.handle_input(ControlInput::Pan { dx: 100.0, dy: 0.0 }, &cam, 800.0);
        controls.update(&mut cam, 0.0);
        assert!(controls.target.x < 0.0);
    }

    #[test]
    fn interaction_pauses_auto_rotate() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 5.0));
        let mut controls = OrbitControls::new(&cam);
        controls.auto_rotate = true;
        controls.handle_input(ControlInput::Begin, &cam, 800.0);
        controls.update(&mut cam, 1.0);
        assert!((cam.position - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
        controls.handle_input(ControlInput::End, &cam, 800.0);
        controls.update(&mut cam, 1.0);
        assert!((cam.position - Vec3::new(0.0, 0.0, 5.0)).length() > 1e-3);
    }

    #[test]
    fn reset_restores_saved_state_and_clears_motion() {
        let mut cam = camera_at(Vec3::new(0.0, 0.0, 5.0));
        let mut controls = OrbitControls::new(&cam);
        controls.enable_damping = true;
        controls.handle_input(ControlInput::Rotate { dx: 50.0, dy: 20.0 }, &cam, 400.0);
        controls.handle_input(ControlInput::Pan { dx: 30.0, dy: 0.0 }, &cam, 400.0);
        controls.update(&mut cam, 0.0);
        controls.reset(&mut cam);
        assert_eq!(controls.target, Vec3::ZERO);
        assert!((cam.position - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
        assert!(!controls.is_settling());
        controls.update(&mut cam, 0.0);
        assert!((cam.position - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }
}
