use glam::Vec3;

use super::PerspectiveCamera;
use crate::config::OrbitConfig;

const MIN_PITCH_MARGIN: f32 = 1e-3;
const SETTLE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingMotion {
    yaw: f32,
    pitch: f32,
    /// Multiplier applied to the orbit radius.
    scale: f32,
    pan: Vec3,
}

impl PendingMotion {
    const NONE: Self = Self {
        yaw: 0.0,
        pitch: 0.0,
        scale: 1.0,
        pan: Vec3::ZERO,
    };

    fn is_idle(&self) -> bool {
        self.yaw.abs() < SETTLE_EPSILON
            && self.pitch.abs() < SETTLE_EPSILON
            && (self.scale - 1.0).abs() < SETTLE_EPSILON
            && self.pan.length_squared() < SETTLE_EPSILON * SETTLE_EPSILON
    }
}

/// Orbit camera input around a target point.
///
/// Pointer input only accumulates pending motion; [`update`](Self::update)
/// applies it. With no pending motion `update` leaves the camera position
/// untouched, so animated camera moves are never fought.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enabled: bool,
    pub enable_zoom: bool,
    enable_damping: bool,
    damping_factor: f32,
    rotate_speed: f32,
    pan_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    min_pitch: f32,
    max_pitch: f32,
    pending: PendingMotion,
    disposed: bool,
}

impl OrbitControls {
    pub fn new(config: &OrbitConfig, target: Vec3) -> Self {
        let half_pi = std::f32::consts::FRAC_PI_2;
        Self {
            target,
            enabled: true,
            enable_zoom: config.zoom_enabled,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor.clamp(0.0, 1.0),
            rotate_speed: config.rotate_speed,
            pan_speed: config.pan_speed,
            zoom_speed: config.zoom_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            // Polar angle is measured from +Y; pitch from the horizon.
            min_pitch: half_pi - config.max_polar_angle,
            max_pitch: half_pi - MIN_PITCH_MARGIN,
            pending: PendingMotion::NONE,
            disposed: false,
        }
    }

    fn accepts_input(&self) -> bool {
        self.enabled && !self.disposed
    }

    /// Drag by `dx`/`dy` pixels on a surface `height` pixels tall.
    pub fn rotate(&mut self, dx: f32, dy: f32, height: f32) {
        if !self.accepts_input() {
            return;
        }
        let per_pixel = std::f32::consts::TAU / height.max(1.0) * self.rotate_speed;
        self.pending.yaw += dx * per_pixel;
        self.pending.pitch += dy * per_pixel;
    }

    pub fn pan(&mut self, dx: f32, dy: f32, height: f32, camera: &PerspectiveCamera) {
        if !self.accepts_input() {
            return;
        }
        let offset = camera.position - self.target;
        let half_fov = (camera.fov_y_deg.to_radians() * 0.5).tan();
        let world_per_pixel = 2.0 * offset.length() * half_fov / height.max(1.0) * self.pan_speed;
        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward);
        self.pending.pan += (-right * dx + up * dy) * world_per_pixel;
    }

    /// Positive `notches` moves closer.
    pub fn dolly(&mut self, notches: f32) {
        if !self.accepts_input() || !self.enable_zoom {
            return;
        }
        self.pending.scale *= 0.95f32.powf(self.zoom_speed * notches);
    }

    /// Drops any accumulated motion.
    pub fn halt(&mut self) {
        self.pending = PendingMotion::NONE;
    }

    /// Applies pending motion to `camera`. Returns whether the position moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        if self.disposed {
            return false;
        }
        if self.pending.is_idle() {
            self.pending = PendingMotion::NONE;
            camera.look_at = self.target;
            return false;
        }

        let motion = if self.enable_damping {
            PendingMotion {
                yaw: self.pending.yaw * self.damping_factor,
                pitch: self.pending.pitch * self.damping_factor,
                scale: 1.0 + (self.pending.scale - 1.0) * self.damping_factor,
                pan: self.pending.pan * self.damping_factor,
            }
        } else {
            self.pending
        };

        self.target += motion.pan;
        let offset = camera.position - self.target;
        let radius = (offset.length() * motion.scale).clamp(self.min_distance, self.max_distance);
        let (yaw, pitch) = offset_to_yaw_pitch(offset);
        let yaw = wrap_angle(yaw - motion.yaw);
        let pitch = (pitch + motion.pitch).clamp(self.min_pitch, self.max_pitch);
        camera.position = self.target + yaw_pitch_to_dir(yaw, pitch) * radius;
        camera.look_at = self.target;

        if self.enable_damping {
            let keep = 1.0 - self.damping_factor;
            self.pending.yaw *= keep;
            self.pending.pitch *= keep;
            self.pending.scale = 1.0 + (self.pending.scale - 1.0) * keep;
            self.pending.pan *= keep;
        } else {
            self.pending = PendingMotion::NONE;
        }
        true
    }

    /// Re-aims the camera at the current target without touching its
    /// position. Called after the target or the camera is moved externally.
    pub fn sync(&self, camera: &mut PerspectiveCamera) {
        camera.look_at = self.target;
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
        self.enabled = false;
        self.halt();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let dir = offset.normalize_or_zero();
    if dir == Vec3::ZERO {
        return (0.0, 0.0);
    }
    (dir.z.atan2(dir.x), dir.y.clamp(-1.0, 1.0).asin())
}

fn yaw_pitch_to_dir(yaw: f32, pitch: f32) -> Vec3 {
    let cos_pitch = pitch.cos();
    Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch)
}

fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if angle.is_finite() {
        (angle + PI).rem_euclid(TAU) - PI
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (OrbitControls, PerspectiveCamera) {
        let camera = PerspectiveCamera::default();
        let controls = OrbitControls::new(&OrbitConfig::default(), camera.look_at);
        (controls, camera)
    }

    #[test]
    fn idle_update_leaves_position_alone() {
        let (mut controls, mut camera) = setup();
        camera.position = Vec3::new(0.123, 0.456, 7.89);
        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position, Vec3::new(0.123, 0.456, 7.89));
        assert_eq!(camera.look_at, controls.target);
    }

    #[test]
    fn rotate_keeps_distance() {
        let (mut controls, mut camera) = setup();
        let before = (camera.position - controls.target).length();
        controls.rotate(120.0, 0.0, 720.0);
        assert!(controls.update(&mut camera));
        let after = (camera.position - controls.target).length();
        assert!((before - after).abs() < 1e-4);
    }

    #[test]
    fn pitch_respects_polar_limit() {
        let (mut controls, mut camera) = setup();
        controls.rotate(0.0, -100_000.0, 720.0);
        controls.update(&mut camera);
        let dir = (camera.position - controls.target).normalize();
        let polar = dir.y.clamp(-1.0, 1.0).acos();
        assert!(polar <= OrbitConfig::default().max_polar_angle + 1e-3);
    }

    #[test]
    fn zoom_is_gated_and_clamped() {
        let (mut controls, mut camera) = setup();
        let start = camera.position;
        controls.dolly(50.0);
        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position, start);

        controls.enable_zoom = true;
        controls.dolly(500.0);
        controls.update(&mut camera);
        let distance = (camera.position - controls.target).length();
        assert!((distance - OrbitConfig::default().min_distance).abs() < 1e-4);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let (mut controls, mut camera) = setup();
        controls.enabled = false;
        controls.rotate(300.0, 40.0, 720.0);
        controls.pan(10.0, 10.0, 720.0, &camera.clone());
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn damping_spreads_motion_over_frames() {
        let config = OrbitConfig {
            enable_damping: true,
            ..OrbitConfig::default()
        };
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::new(&config, camera.look_at);
        controls.rotate(200.0, 0.0, 720.0);
        let mut moved = 0;
        for _ in 0..10 {
            if controls.update(&mut camera) {
                moved += 1;
            }
        }
        assert_eq!(moved, 10);
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        let wrapped = wrap_angle(7.0);
        assert!(wrapped >= -std::f32::consts::PI && wrapped < std::f32::consts::PI);
        assert!((wrapped - (7.0 - std::f32::consts::TAU)).abs() < 1e-5);
    }
}
