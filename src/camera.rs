//! First-person fly camera driven by keyboard, mouse and scroll deltas.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POSITION: Vec3 = Vec3::new(0.0, 0.0, 1.0);
pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 0.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.5;
pub const DEFAULT_FOV: f32 = 90.0;

const WORLD_UP: Vec3 = Vec3::Y;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;

/// Movement keys held during the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveKeys {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub slow: bool,
    pub fast: bool,
}

impl MoveKeys {
    pub fn any_direction(&self) -> bool {
        self.forward || self.back || self.left || self.right || self.up || self.down
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLimits {
    /// Pitch is held inside `[-max_pitch, max_pitch]` degrees.
    pub max_pitch: f32,
    pub min_fov: f32,
    pub max_fov: f32,
    pub slow_factor: f32,
    pub fast_factor: f32,
}

impl Default for CameraLimits {
    fn default() -> Self {
        Self {
            max_pitch: 89.0,
            min_fov: 1.0,
            max_fov: 120.0,
            slow_factor: 0.1,
            fast_factor: 2.5,
        }
    }
}

/// Persisted camera state. Basis vectors are derived, so they are not stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        FlyCamera::default().pose()
    }
}

#[derive(Debug, Clone)]
pub struct FlyCamera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    speed: f32,
    sensitivity: f32,
    fov: f32,
    limits: CameraLimits,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::with_limits(CameraLimits::default())
    }
}

impl FlyCamera {
    pub fn with_limits(limits: CameraLimits) -> Self {
        let mut camera = Self {
            position: DEFAULT_POSITION,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
            fov: DEFAULT_FOV,
            limits,
        };
        camera.update_vectors();
        camera
    }

    pub fn from_pose(pose: &CameraPose) -> Self {
        let mut camera = Self::default();
        camera.position = Vec3::from_array(pose.position);
        camera.yaw = pose.yaw;
        camera.pitch = pose.pitch.clamp(-camera.limits.max_pitch, camera.limits.max_pitch);
        camera.fov = pose.fov.clamp(camera.limits.min_fov, camera.limits.max_fov);
        camera.set_speed(pose.speed);
        camera.set_sensitivity(pose.sensitivity);
        camera.update_vectors();
        camera
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position.to_array(),
            yaw: self.yaw,
            pitch: self.pitch,
            fov: self.fov,
            speed: self.speed,
            sensitivity: self.sensitivity,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[cfg(test)]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[cfg(test)]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_speed(&mut self, speed: f32) {
        if speed > 0.0 {
            self.speed = speed;
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        if sensitivity > 0.0 {
            self.sensitivity = sensitivity;
        }
    }

    /// Moves along the basis vectors. Combined directions add up without
    /// renormalisation, so diagonals are faster than straight lines.
    pub fn apply_translation(&mut self, keys: MoveKeys, delta_time: f32) {
        let mut velocity = self.speed * delta_time;
        if keys.slow {
            velocity *= self.limits.slow_factor;
        }
        if keys.fast {
            velocity *= self.limits.fast_factor;
        }

        if keys.forward {
            self.position += self.front * velocity;
        }
        if keys.back {
            self.position -= self.front * velocity;
        }
        if keys.left {
            self.position -= self.right * velocity;
        }
        if keys.right {
            self.position += self.right * velocity;
        }
        if keys.up {
            self.position += self.up * velocity;
        }
        if keys.down {
            self.position -= self.up * velocity;
        }
    }

    pub fn apply_look_delta(&mut self, delta_x: f32, delta_y: f32, constrain_pitch: bool) {
        self.yaw += delta_x * self.sensitivity;
        self.pitch += delta_y * self.sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-self.limits.max_pitch, self.limits.max_pitch);
        }

        self.update_vectors();
    }

    pub fn apply_zoom_delta(&mut self, delta: f32) {
        self.fov = (self.fov - delta).clamp(self.limits.min_fov, self.limits.max_fov);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }

    pub fn reset(&mut self) {
        *self = Self::with_limits(self.limits);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.front.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_vec_approx(actual: Vec3, expected: Vec3) {
        assert!(
            actual.abs_diff_eq(expected, EPSILON),
            "actual={actual:?} expected={expected:?}"
        );
    }

    fn assert_orthonormal(camera: &FlyCamera) {
        let (f, r, u) = (camera.front(), camera.right(), camera.up());
        assert!((f.length() - 1.0).abs() < EPSILON, "front={f:?}");
        assert!((r.length() - 1.0).abs() < EPSILON, "right={r:?}");
        assert!((u.length() - 1.0).abs() < EPSILON, "up={u:?}");
        assert!(f.dot(r).abs() < EPSILON);
        assert!(f.dot(u).abs() < EPSILON);
        assert!(r.dot(u).abs() < EPSILON);
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = FlyCamera::default();

        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 1.0));
        assert_vec_approx(camera.front(), Vec3::NEG_Z);
        assert_vec_approx(camera.right(), Vec3::X);
        assert_vec_approx(camera.up(), Vec3::Y);
        assert_eq!(camera.fov(), 90.0);
    }

    #[test]
    fn basis_stays_orthonormal_under_look_deltas() {
        let mut camera = FlyCamera::default();
        let deltas = [
            (13.0, 7.0),
            (-250.0, 40.0),
            (0.5, -300.0),
            (720.0, 10_000.0),
            (-33.3, -0.1),
            (1e4, -1e4),
        ];
        for (dx, dy) in deltas {
            camera.apply_look_delta(dx, dy, true);
            assert_orthonormal(&camera);
        }
    }

    #[test]
    fn pitch_is_clamped_for_extreme_deltas() {
        let mut camera = FlyCamera::default();

        camera.apply_look_delta(0.0, 10_000.0, true);
        assert_eq!(camera.pitch(), 89.0);
        camera.apply_look_delta(0.0, -10_000.0, true);
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn unconstrained_pitch_is_not_clamped() {
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(0.0, 400.0, false);

        assert_eq!(camera.pitch(), 200.0);
    }

    #[test]
    fn look_delta_scales_by_sensitivity() {
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(180.0, 0.0, true);

        assert_eq!(camera.yaw(), 0.0);
        assert_vec_approx(camera.front(), Vec3::X);
    }

    #[test]
    fn zoom_stays_within_bounds() {
        let mut camera = FlyCamera::default();

        camera.apply_zoom_delta(500.0);
        assert_eq!(camera.fov(), 1.0);
        camera.apply_zoom_delta(-500.0);
        assert_eq!(camera.fov(), 120.0);
        camera.apply_zoom_delta(30.0);
        assert_eq!(camera.fov(), 90.0);
    }

    #[test]
    fn translation_moves_along_basis_and_accumulates() {
        let mut camera = FlyCamera::default();
        camera.apply_translation(
            MoveKeys {
                forward: true,
                right: true,
                ..MoveKeys::default()
            },
            2.0,
        );

        // speed 0.5 * dt 2.0 = 1 unit along -Z and +X
        assert_vec_approx(camera.position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut camera = FlyCamera::default();
        camera.apply_translation(
            MoveKeys {
                up: true,
                down: true,
                left: true,
                right: true,
                ..MoveKeys::default()
            },
            1.0,
        );

        assert_vec_approx(camera.position(), DEFAULT_POSITION);
    }

    #[test]
    fn modifiers_scale_velocity() {
        let mut slow = FlyCamera::default();
        let mut fast = FlyCamera::default();
        let up = MoveKeys {
            up: true,
            ..MoveKeys::default()
        };

        slow.apply_translation(MoveKeys { slow: true, ..up }, 1.0);
        fast.apply_translation(MoveKeys { fast: true, ..up }, 1.0);

        assert!((slow.position().y - 0.05).abs() < EPSILON);
        assert!((fast.position().y - 1.25).abs() < EPSILON);
    }

    #[test]
    fn view_matrix_maps_position_to_origin_and_front_to_negative_z() {
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(37.0, -12.0, true);
        let view = camera.view_matrix();

        assert_vec_approx(view.transform_point3(camera.position()), Vec3::ZERO);
        assert_vec_approx(
            view.transform_point3(camera.position() + camera.front()),
            Vec3::NEG_Z,
        );
    }

    #[test]
    fn reset_restores_defaults() {
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(120.0, 45.0, true);
        camera.apply_zoom_delta(40.0);
        camera.apply_translation(
            MoveKeys {
                forward: true,
                ..MoveKeys::default()
            },
            3.0,
        );
        camera.set_speed(4.0);

        camera.reset();

        assert_eq!(camera.position(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(camera.yaw(), -90.0);
        assert_eq!(camera.pitch(), 0.0);
        assert_eq!(camera.fov(), 90.0);
        assert_eq!(camera.speed(), DEFAULT_SPEED);
        assert_vec_approx(camera.front(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn pose_round_trips() {
        let mut camera = FlyCamera::default();
        camera.apply_look_delta(-20.0, 30.0, true);
        camera.apply_zoom_delta(15.0);

        let restored = FlyCamera::from_pose(&camera.pose());

        assert_eq!(restored.pose(), camera.pose());
        assert_vec_approx(restored.front(), camera.front());
    }

    #[test]
    fn non_positive_speed_is_ignored() {
        let mut camera = FlyCamera::default();
        camera.set_speed(0.0);
        camera.set_sensitivity(-1.0);

        assert_eq!(camera.speed(), DEFAULT_SPEED);
        assert_eq!(camera.sensitivity(), DEFAULT_SENSITIVITY);
    }
}
