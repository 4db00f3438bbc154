//! Tween access to scene values. Camera properties are not scene state and
//! read as `None` here.

use super::SceneGraph;
use crate::anim::{Property, TweenHost, TweenValue};

impl TweenHost for SceneGraph {
    fn read(&self, property: Property) -> Option<TweenValue> {
        let value = match property {
            Property::LightIntensity(id) => self.light(id)?.intensity.into(),
            Property::MeshPosition(id, axis) => axis.get(self.mesh(id)?.transform.position).into(),
            Property::MeshRotation(id, axis) => axis.get(self.mesh(id)?.transform.rotation).into(),
            Property::MeshScale(id) => self.mesh(id)?.transform.scale.into(),
            Property::MaterialOpacity(id) => self.mesh(id)?.material.opacity.into(),
            Property::MaterialEmissive(id) => self.mesh(id)?.material.emissive_intensity.into(),
            Property::SpriteOpacity(id) => self.sprite(id)?.opacity.into(),
            Property::Exposure => self.exposure.into(),
            Property::CameraPosition | Property::OrbitTarget | Property::Timer(_) => return None,
        };
        Some(value)
    }

    fn write(&mut self, property: Property, value: TweenValue) -> bool {
        if let Property::MeshScale(id) = property {
            let (Some(scale), Some(mesh)) = (value.as_vector(), self.mesh_mut(id)) else {
                return false;
            };
            mesh.transform.scale = scale;
            return true;
        }

        let Some(v) = value.as_scalar() else {
            return false;
        };
        let slot = match property {
            Property::LightIntensity(id) => self.light_mut(id).map(|light| &mut light.intensity),
            Property::MeshPosition(id, axis) => {
                return match self.mesh_mut(id) {
                    Some(mesh) => {
                        axis.set(&mut mesh.transform.position, v);
                        true
                    }
                    None => false,
                };
            }
            Property::MeshRotation(id, axis) => {
                return match self.mesh_mut(id) {
                    Some(mesh) => {
                        axis.set(&mut mesh.transform.rotation, v);
                        true
                    }
                    None => false,
                };
            }
            Property::MaterialOpacity(id) => self.mesh_mut(id).map(|mesh| &mut mesh.material.opacity),
            Property::MaterialEmissive(id) => {
                self.mesh_mut(id).map(|mesh| &mut mesh.material.emissive_intensity)
            }
            Property::SpriteOpacity(id) => self.sprite_mut(id).map(|sprite| &mut sprite.opacity),
            Property::Exposure => Some(&mut self.exposure),
            Property::MeshScale(_)
            | Property::CameraPosition
            | Property::OrbitTarget
            | Property::Timer(_) => None,
        };
        match slot {
            Some(slot) => {
                *slot = v;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{Animator, Axis, TweenSpec};
    use crate::scene::test_support::add_quad_mesh;
    use crate::scene::MeshRole;
    use glam::Vec3;

    #[test]
    fn tweens_write_through_to_meshes() {
        let mut scene = SceneGraph::new();
        let id = add_quad_mesh(&mut scene, "a", Vec3::ZERO, MeshRole::Plain);
        let mut animator = Animator::new();
        animator.start(TweenSpec::to(Property::MeshPosition(id, Axis::Y), 2.0).duration(0.2));
        animator.start(TweenSpec::to(Property::MeshScale(id), Vec3::splat(3.0)).duration(0.2));
        for _ in 0..5 {
            animator.advance(0.05, &mut scene);
        }
        let mesh = scene.mesh(id).unwrap();
        assert_eq!(mesh.transform.position.y, 2.0);
        assert_eq!(mesh.transform.scale, Vec3::splat(3.0));
        assert!(animator.is_empty());
    }

    #[test]
    fn camera_properties_are_not_scene_state() {
        let mut scene = SceneGraph::new();
        assert!(scene.read(Property::CameraPosition).is_none());
        assert!(!scene.write(Property::OrbitTarget, Vec3::ZERO.into()));
        assert!(scene.write(Property::Exposure, 0.5_f32.into()));
        assert_eq!(scene.exposure, 0.5);
    }
}
