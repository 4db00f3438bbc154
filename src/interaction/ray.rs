use glam::{Mat4, Vec3};

use crate::scene::{Aabb, Geometry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn from_points(from: Vec3, to: Vec3) -> Self {
        Self::new(from, to - from)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Maps the ray into another space without renormalizing, so a `t` found
    /// there is the same `t` along the original ray.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction),
        }
    }
}

/// Slab test. Returns the entry distance, or 0 when the origin is inside.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let inv = ray.direction.recip();
    let t1 = (aabb.min - ray.origin) * inv;
    let t2 = (aabb.max - ray.origin) * inv;

    let t_min = t1.min(t2);
    let t_max = t1.max(t2);

    let enter = t_min.x.max(t_min.y).max(t_min.z);
    let exit = t_max.x.min(t_max.y).min(t_max.z);

    if enter.is_nan() || exit.is_nan() || exit < 0.0 || enter > exit {
        return None;
    }
    Some(enter.max(0.0))
}

/// Möller–Trumbore, both faces.
pub fn ray_triangle(ray: &Ray, [v0, v1, v2]: [Vec3; 3]) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > EPSILON).then_some(t)
}

/// Nearest triangle hit, rejecting early on the bounding box.
pub fn ray_geometry(ray: &Ray, geometry: &Geometry) -> Option<f32> {
    ray_aabb(ray, &geometry.bounds)?;
    geometry
        .triangles()
        .filter_map(|tri| ray_triangle(ray, tri))
        .min_by(f32::total_cmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_hits_and_misses() {
        let aabb = Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        };
        let hit = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(ray_aabb(&hit, &aabb), Some(4.0));

        let miss = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        assert_eq!(ray_aabb(&miss, &aabb), None);

        let behind = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert_eq!(ray_aabb(&behind, &aabb), None);

        let inside = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray_aabb(&inside, &aabb), Some(0.0));
    }

    #[test]
    fn triangle_hit_from_either_side() {
        let tri = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let front = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z);
        let back = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        assert!((ray_triangle(&front, tri).unwrap() - 2.0).abs() < 1e-6);
        assert!((ray_triangle(&back, tri).unwrap() - 3.0).abs() < 1e-6);

        let outside = Ray::new(Vec3::new(2.0, 2.0, 2.0), Vec3::NEG_Z);
        assert!(ray_triangle(&outside, tri).is_none());
    }

    #[test]
    fn transformed_ray_keeps_parameter() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::NEG_Z);
        let world = Mat4::from_scale(Vec3::splat(2.0));
        let local = ray.transformed(&world.inverse());
        let t = 4.0;
        let world_point = ray.at(t);
        let local_point = local.origin + local.direction * t;
        assert!((world.transform_point3(local_point) - world_point).length() < 1e-5);
    }
}
