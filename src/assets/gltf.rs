//! glTF import: every primitive becomes one [`LoadedMesh`] with its node
//! transform flattened relative to the scene root.

use gltf::mesh::util::ReadIndices;
use glam::{Mat4, Vec3};
use std::path::Path;

use super::{AlphaMode, AssetError, LoadedAsset, LoadedMaterial, LoadedMesh, MapSlots};

pub fn import(path: &Path) -> Result<LoadedAsset, AssetError> {
    let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Import {
        path: path.display().to_string(),
        source,
    })?;

    let mut meshes = Vec::new();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    match scene {
        Some(scene) => {
            for node in scene.nodes() {
                walk(&node, Mat4::IDENTITY, &buffers, &mut meshes);
            }
        }
        None => {
            // No scene: treat every node as a root.
            for node in document.nodes() {
                walk(&node, Mat4::IDENTITY, &buffers, &mut meshes);
            }
        }
    }

    if meshes.is_empty() {
        return Err(AssetError::NoGeometry {
            path: path.display().to_string(),
        });
    }

    let name = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("gltf")
        .to_string();
    log::info!(
        "Imported {}: {} mesh(es), {} image(s)",
        path.display(),
        meshes.len(),
        images.len()
    );
    Ok(LoadedAsset {
        name,
        meshes,
        image_count: images.len(),
    })
}

fn walk(
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<LoadedMesh>,
) {
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| mesh.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index()));
        for primitive in mesh.primitives() {
            if let Some(loaded) = read_primitive(&name, &primitive, world, buffers) {
                out.push(loaded);
            }
        }
    }

    for child in node.children() {
        walk(&child, world, buffers, out);
    }
}

fn read_primitive(
    name: &str,
    primitive: &gltf::Primitive<'_>,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
) -> Option<LoadedMesh> {
    let reader = primitive.reader(|b| buffers.get(b.index()).map(|data| data.0.as_slice()));
    let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from).collect();
    if positions.is_empty() {
        return None;
    }
    let indices: Vec<u32> = match reader.read_indices() {
        Some(ReadIndices::U8(it)) => it.map(u32::from).collect(),
        Some(ReadIndices::U16(it)) => it.map(u32::from).collect(),
        Some(ReadIndices::U32(it)) => it.collect(),
        None => (0..positions.len() as u32).collect(),
    };
    let vertex_colors = reader.read_colors(0).is_some();

    Some(LoadedMesh {
        name: name.to_string(),
        transform,
        positions,
        indices,
        vertex_colors,
        material: read_material(&primitive.material()),
    })
}

fn read_material(material: &gltf::Material<'_>) -> LoadedMaterial {
    let pbr = material.pbr_metallic_roughness();
    let alpha_mode = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask(material.alpha_cutoff().unwrap_or(0.5)),
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    LoadedMaterial {
        name: material.name().unwrap_or_default().to_string(),
        base_color: pbr.base_color_factor(),
        emissive: material.emissive_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        alpha_mode,
        double_sided: material.double_sided(),
        maps: MapSlots {
            base_color: pbr
                .base_color_texture()
                .map(|info| info.texture().source().index()),
            normal: material
                .normal_texture()
                .map(|info| info.texture().source().index()),
            metallic_roughness: pbr
                .metallic_roughness_texture()
                .map(|info| info.texture().source().index()),
            occlusion: material
                .occlusion_texture()
                .map(|info| info.texture().source().index()),
            emissive: material
                .emissive_texture()
                .map(|info| info.texture().source().index()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "desk", "translation": [0.0, 1.0, 0.0], "children": [1] },
            { "name": "schermoGrande_mesh", "mesh": 0, "scale": [2.0, 2.0, 2.0] }
        ],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }],
        "materials": [{
            "name": "schermoGrande",
            "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.5, 0.25, 1.0], "metallicFactor": 0.0 },
            "doubleSided": true
        }],
        "buffers": [{
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        }]
    }"#;

    #[test]
    fn import_flattens_node_transforms() {
        let path = std::env::temp_dir().join(format!("deskscene_import_{}.gltf", std::process::id()));
        std::fs::write(&path, TRIANGLE_GLTF).unwrap();
        let asset = import(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(asset.meshes.len(), 1);
        let mesh = &asset.meshes[0];
        assert_eq!(mesh.name, "schermoGrande_mesh");
        assert_eq!(mesh.material.name, "schermoGrande");
        assert!(mesh.material.double_sided);
        assert_eq!(mesh.material.metallic, 0.0);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        let top = mesh.transform.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!((top - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn missing_file_is_an_import_error() {
        let err = import(Path::new("/nonexistent/desk.glb")).unwrap_err();
        assert!(matches!(err, AssetError::Import { .. }));
    }
}
