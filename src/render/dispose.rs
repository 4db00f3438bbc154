use std::collections::BTreeSet;

use super::GraphicsContext;
use crate::scene::SceneGraph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

/// Walks the scene and releases every GPU resource it references.
pub struct ResourceDisposer;

impl ResourceDisposer {
    pub fn dispose_scene(scene: &mut SceneGraph, ctx: &mut dyn GraphicsContext) -> DisposeReport {
        let drained = scene.drain();
        let mut geometries = BTreeSet::new();
        let mut materials = BTreeSet::new();
        let mut textures = BTreeSet::new();

        for mesh in &drained.meshes {
            geometries.insert(mesh.geometry.id);
            materials.insert(mesh.material.id);
            textures.extend(mesh.material.textures());
        }
        for sprite in &drained.sprites {
            geometries.insert(sprite.geometry);
            materials.insert(sprite.material);
        }
        textures.extend(drained.textures.iter().map(|texture| texture.id));

        for id in &geometries {
            ctx.release_geometry(*id);
        }
        for id in &materials {
            ctx.release_material(*id);
        }
        for id in &textures {
            ctx.release_texture(*id);
        }

        let report = DisposeReport {
            geometries: geometries.len(),
            materials: materials.len(),
            textures: textures.len(),
        };
        log::info!(
            "Released {} geometries, {} materials, {} textures",
            report.geometries,
            report.materials,
            report.textures
        );
        report
    }
}
