//! Per-frame draw list for the window renderer.
//!
//! Everything here is plain data derived from the scene graph, so it is
//! built and checked without a device.

use glam::{Mat4, Vec3};

use crate::camera::PerspectiveCamera;
use crate::scene::{GeometryId, LightKind, LightRole, MaterialClass, SceneGraph};

/// Remaps the camera's `[-1, 1]` clip depth to the `[0, 1]` range wgpu uses.
pub const CLIP_DEPTH_REMAP: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.0, 0.0, 0.5, 1.0,
]);

/// Uniform block for one mesh draw. Layout matches `Draw` in the shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// Base color and opacity.
    pub color: [f32; 4],
    /// Emissive radiance; `w` is 1 for unlit materials.
    pub emissive: [f32; 4],
    /// Ambient radiance; `w` carries the exposure.
    pub ambient: [f32; 4],
    pub key_dir: [f32; 4],
    pub key_color: [f32; 4],
    pub fill_dir: [f32; 4],
    pub fill_color: [f32; 4],
}

/// The lighting rig collapsed to what the flat shader understands: one
/// ambient term and two directional lights.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameLighting {
    pub ambient: Vec3,
    pub key_dir: Vec3,
    pub key_color: Vec3,
    pub fill_dir: Vec3,
    pub fill_color: Vec3,
    pub exposure: f32,
}

impl FrameLighting {
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let mut lighting = FrameLighting {
            exposure: scene.exposure,
            ..Default::default()
        };
        for light in scene.lights() {
            let radiance = Vec3::from(light.color) * light.intensity;
            match (light.role, light.kind) {
                (_, LightKind::Ambient) => lighting.ambient += radiance,
                (_, LightKind::Hemisphere { ground_color }) => {
                    let ground = Vec3::from(ground_color) * light.intensity;
                    lighting.ambient += (radiance + ground) * 0.5;
                }
                (LightRole::Main, LightKind::Directional) => {
                    lighting.key_dir = (light.position - light.target).normalize_or_zero();
                    lighting.key_color = radiance;
                }
                (LightRole::Fill, LightKind::Directional) => {
                    lighting.fill_dir = (light.position - light.target).normalize_or_zero();
                    lighting.fill_color = radiance;
                }
                _ => {}
            }
        }
        lighting
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub geometry: GeometryId,
    pub index_count: u32,
    pub transparent: bool,
    pub uniforms: DrawUniforms,
}

fn extend(v: Vec3, w: f32) -> [f32; 4] {
    v.extend(w).to_array()
}

/// Visible meshes in submission order: opaque first, then transparent ones
/// back to front.
pub fn build_draws(scene: &SceneGraph, camera: &PerspectiveCamera) -> Vec<DrawItem> {
    let view_proj = (CLIP_DEPTH_REMAP * camera.view_projection()).to_cols_array_2d();
    let lighting = FrameLighting::from_scene(scene);

    let mut opaque = Vec::new();
    let mut transparent = Vec::new();
    for mesh in scene.meshes() {
        let material = &mesh.material;
        if !mesh.visible || material.opacity <= 0.0 || mesh.transform.scale == Vec3::ZERO {
            continue;
        }
        let Some(model) = scene.world_matrix(mesh.id) else {
            continue;
        };
        let unlit = if material.class == MaterialClass::Basic { 1.0 } else { 0.0 };
        let emissive = Vec3::from(material.emissive) * material.emissive_intensity;
        let item = DrawItem {
            geometry: mesh.geometry.id,
            index_count: mesh.geometry.indices.len() as u32,
            transparent: material.is_effectively_transparent(),
            uniforms: DrawUniforms {
                view_proj,
                model: model.to_cols_array_2d(),
                color: extend(Vec3::from(material.color), material.opacity),
                emissive: extend(emissive, unlit),
                ambient: extend(lighting.ambient, lighting.exposure),
                key_dir: extend(lighting.key_dir, 0.0),
                key_color: extend(lighting.key_color, 0.0),
                fill_dir: extend(lighting.fill_dir, 0.0),
                fill_color: extend(lighting.fill_color, 0.0),
            },
        };
        if item.transparent {
            let depth = model.transform_point3(Vec3::ZERO).distance(camera.position);
            transparent.push((depth, item));
        } else {
            opaque.push(item);
        }
    }
    transparent.sort_by(|(a, _), (b, _)| b.total_cmp(a));
    opaque.extend(transparent.into_iter().map(|(_, item)| item));
    opaque
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_support::add_quad_mesh;
    use crate::scene::{Light, LightId, MeshRole};

    fn light(role: LightRole, kind: LightKind, intensity: f32, position: Vec3) -> Light {
        Light {
            id: LightId(0),
            role,
            kind,
            color: [1.0, 1.0, 1.0],
            intensity,
            day_intensity: intensity,
            position,
            target: Vec3::ZERO,
            shadow: None,
        }
    }

    #[test]
    fn transparent_meshes_come_last_far_to_near() {
        let mut scene = SceneGraph::new();
        let camera = PerspectiveCamera::default();
        let toward = (camera.position - camera.look_at).normalize();
        let near = add_quad_mesh(&mut scene, "near", camera.look_at + toward, MeshRole::Plain);
        let far = add_quad_mesh(&mut scene, "far", camera.look_at - toward, MeshRole::Plain);
        let solid = add_quad_mesh(&mut scene, "solid", camera.look_at, MeshRole::Plain);
        for id in [near, far] {
            scene.mesh_mut(id).unwrap().material.opacity = 0.5;
        }

        let draws = build_draws(&scene, &camera);
        let order: Vec<_> = draws.iter().map(|item| item.geometry).collect();
        let geometry = |id| scene.mesh(id).unwrap().geometry.id;
        assert_eq!(order, vec![geometry(solid), geometry(far), geometry(near)]);
        assert!(!draws[0].transparent && draws[1].transparent);
        assert_eq!(draws[1].uniforms.color[3], 0.5);
    }

    #[test]
    fn hidden_and_collapsed_meshes_are_skipped() {
        let mut scene = SceneGraph::new();
        let hidden = add_quad_mesh(&mut scene, "hidden", Vec3::ZERO, MeshRole::Plain);
        let faded = add_quad_mesh(&mut scene, "faded", Vec3::ZERO, MeshRole::Plain);
        let collapsed = add_quad_mesh(&mut scene, "collapsed", Vec3::ZERO, MeshRole::Plain);
        add_quad_mesh(&mut scene, "shown", Vec3::ZERO, MeshRole::Plain);
        scene.mesh_mut(hidden).unwrap().visible = false;
        scene.mesh_mut(faded).unwrap().material.opacity = 0.0;
        scene.mesh_mut(collapsed).unwrap().transform.scale = Vec3::ZERO;

        let draws = build_draws(&scene, &PerspectiveCamera::default());
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 6);
    }

    #[test]
    fn rig_collapses_to_ambient_and_two_directionals() {
        let mut scene = SceneGraph::new();
        scene.exposure = 0.5;
        scene.add_light(light(LightRole::Ambient, LightKind::Ambient, 0.4, Vec3::ZERO));
        scene.add_light(light(
            LightRole::Hemisphere,
            LightKind::Hemisphere {
                ground_color: [0.0, 0.0, 0.0],
            },
            0.2,
            Vec3::Y,
        ));
        scene.add_light(light(LightRole::Main, LightKind::Directional, 2.0, Vec3::new(0.0, 4.0, 0.0)));
        scene.add_light(light(LightRole::Fill, LightKind::Directional, 0.5, Vec3::new(3.0, 0.0, 0.0)));

        let lighting = FrameLighting::from_scene(&scene);
        assert!((lighting.ambient - Vec3::splat(0.5)).length() < 1e-6);
        assert_eq!(lighting.key_dir, Vec3::Y);
        assert_eq!(lighting.key_color, Vec3::splat(2.0));
        assert_eq!(lighting.fill_dir, Vec3::X);
        assert_eq!(lighting.exposure, 0.5);
    }

    #[test]
    fn remap_puts_clip_depth_in_unit_range() {
        let camera = PerspectiveCamera::default();
        let view_proj = CLIP_DEPTH_REMAP * camera.view_projection();
        let forward = (camera.look_at - camera.position).normalize();
        let depth = |distance: f32| {
            let clip = view_proj * (camera.position + forward * distance).extend(1.0);
            clip.z / clip.w
        };
        assert!(depth(camera.near).abs() < 1e-4);
        assert!((depth(camera.far) - 1.0).abs() < 1e-3);
    }
}
