pub mod orbit;
pub mod zoom;

pub use orbit::OrbitControls;
pub use zoom::{CameraZoomController, ZoomState};

use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;
use crate::interaction::ray::Ray;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 1.0)
    }
}

impl PerspectiveCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Vec3::from(config.position),
            look_at: Vec3::from(config.target),
            up: Vec3::Y,
            fov_y_deg: config.fov_y_deg,
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.look_at, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Ray from the eye through a point in normalized device coordinates.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inverse = self.view_projection().inverse();
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Ray::from_points(self.position, far)
    }

    /// World point to NDC; `None` when behind the eye.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(Vec2::new(clip.x / clip.w, clip.y / clip.w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_ray_points_at_look_target() {
        let camera = PerspectiveCamera::default();
        let ray = camera.ray_through(Vec2::ZERO);
        let expected = (camera.look_at - camera.position).normalize();
        assert!((ray.direction - expected).length() < 1e-4);
        assert_eq!(ray.origin, camera.position);
    }

    #[test]
    fn project_inverts_ray_through() {
        let mut camera = PerspectiveCamera::default();
        camera.set_viewport(1280, 720);
        let point = Vec3::new(0.4, -0.2, -1.0);
        let ndc = camera.project(point).unwrap();
        let ray = camera.ray_through(ndc);
        let to_point = (point - ray.origin).normalize();
        assert!((ray.direction - to_point).length() < 1e-3);
    }

    #[test]
    fn points_behind_the_eye_do_not_project() {
        let camera = PerspectiveCamera::default();
        assert!(camera.project(Vec3::new(0.0, 3.0, 10.0)).is_none());
    }
}
