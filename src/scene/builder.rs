//! Turns a decoded asset into live scene nodes and applies the per-mesh
//! policies that depend on naming: roles, shadows, screen materials, glow
//! lights and the interactive set.

use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::PI;

use super::{
    Aabb, AssetRoot, ColorSpace, Geometry, Light, LightId, LightKind, LightRole, Material,
    MaterialClass, Mesh, MeshId, MeshRecord, MeshRole, SceneGraph, Side, TextureId,
    TextureMaps, TextureSource, Transform, Wrap,
};
use crate::assets::{AlphaMode, LoadedAsset, LoadedMaterial};
use crate::config::{AssetPaths, LightingConfig, NamingConfig, PlacementConfig};
use crate::render::GraphicsContext;

/// Material-name fragments that never cast shadows.
const NON_CASTING_NAMES: [&str; 5] = ["fumo", "schermo", "glass", "screen", "video"];

/// Vertical crop of the video feed on the small screen.
const VIDEO_ZOOM: f32 = 1.3;

pub struct SceneGraphBuilder {
    placement: PlacementConfig,
    naming: NamingConfig,
}

impl SceneGraphBuilder {
    pub fn new(placement: &PlacementConfig, naming: &NamingConfig) -> Self {
        Self {
            placement: placement.clone(),
            naming: naming.clone(),
        }
    }

    pub fn classify(&self, mesh_name: &str, material_name: &str) -> MeshRole {
        let n = &self.naming;
        let exact = [
            (&n.screen_large, MeshRole::ScreenLarge),
            (&n.screen_small, MeshRole::ScreenSmall),
            (&n.button, MeshRole::Button),
            (&n.lamp, MeshRole::Lamp),
            (&n.smoke, MeshRole::Smoke),
            (&n.cup, MeshRole::Cup),
            (&n.coffee, MeshRole::Coffee),
            (&n.table, MeshRole::Table),
        ];
        if let Some((_, role)) = exact.iter().find(|(name, _)| name.as_str() == material_name) {
            return *role;
        }
        if material_name.to_lowercase().contains(&n.cup.to_lowercase()) {
            return MeshRole::Cup;
        }
        let mouse = n.mouse.to_lowercase();
        if material_name.to_lowercase().contains(&mouse) || mesh_name.to_lowercase().contains(&mouse)
        {
            return MeshRole::Mouse;
        }
        MeshRole::Plain
    }

    /// Adds every mesh of `asset` under a root placed per the placement
    /// config, and snapshots each mesh's original transform.
    pub fn place_asset(&self, scene: &mut SceneGraph, asset: LoadedAsset) -> Vec<MeshId> {
        scene.root = Some(AssetRoot {
            name: asset.name.clone(),
            transform: Transform {
                position: Vec3::from(self.placement.position),
                rotation: Vec3::ZERO,
                scale: Vec3::splat(self.placement.scale),
            },
        });

        let mut images: BTreeMap<usize, TextureId> = BTreeMap::new();
        let mut placed = Vec::with_capacity(asset.meshes.len());
        for loaded in asset.meshes {
            let Some(bounds) = Aabb::from_points(&loaded.positions) else {
                log::warn!("Skipping mesh {} without vertices", loaded.name);
                continue;
            };
            let geometry = Geometry {
                id: scene.alloc_geometry_id(),
                positions: loaded.positions,
                indices: loaded.indices,
                bounds,
            };
            let maps = texture_maps(scene, &mut images, &asset.name, &loaded.material);
            let mut material = base_material(scene, &loaded.material, maps);
            material.vertex_colors = loaded.vertex_colors;

            let role = self.classify(&loaded.name, &material.name);
            let transform = Transform::from_matrix(loaded.transform);
            let id = scene.add_mesh(loaded.name, geometry, material, transform);
            scene.set_record(
                id,
                MeshRecord {
                    role,
                    original: transform,
                    original_env_intensity: None,
                    lamp_fixture: None,
                },
            );
            placed.push(id);
        }
        log::info!(
            "Placed {} ({} meshes, {} textures)",
            asset.name,
            placed.len(),
            images.len()
        );
        placed
    }

    /// Cast/receive flags for one mesh, decided by its material name.
    pub fn configure_shadows(mesh: &mut Mesh) {
        let name = mesh.material.name.to_lowercase();
        mesh.cast_shadow = false;
        mesh.receive_shadow = false;

        if name.contains("tavolo") {
            mesh.receive_shadow = true;
            mesh.material.shadow_side = Some(Side::Back);
            return;
        }
        if name.contains("tappetino") || name.contains("tappeto") {
            mesh.material.roughness = 0.9;
            mesh.material.metalness = 0.0;
        }
        let non_casting = NON_CASTING_NAMES.iter().any(|n| name.contains(n));
        mesh.cast_shadow = !non_casting && !mesh.material.is_effectively_transparent();
    }

    pub fn configure_all_shadows(&self, scene: &mut SceneGraph) -> usize {
        let mut casters = 0;
        for mesh in scene.meshes_mut() {
            Self::configure_shadows(mesh);
            casters += usize::from(mesh.cast_shadow);
        }
        log::debug!("{} shadow caster(s)", casters);
        casters
    }

    /// Gives the small screens the emissive video material and the large
    /// screens the unlit photo material. Replaced materials are released.
    pub fn apply_screen_materials(
        &self,
        scene: &mut SceneGraph,
        ctx: &mut dyn GraphicsContext,
        paths: &AssetPaths,
    ) -> usize {
        let small = scene.meshes_with_role(MeshRole::ScreenSmall);
        let large = scene.meshes_with_role(MeshRole::ScreenLarge);
        let mut replaced = 0;

        if !small.is_empty() {
            let video = scene.add_texture("screen video", TextureSource::Video(paths.screen_video.clone()));
            if let Some(texture) = scene.texture_mut(video) {
                texture.color_space = ColorSpace::Srgb;
                texture.repeat = [1.0, 1.0 / VIDEO_ZOOM];
                texture.offset = [0.0, (1.0 - 1.0 / VIDEO_ZOOM) / 2.0];
            }
            let material = Material {
                emissive: [1.0, 1.0, 1.0],
                emissive_intensity: 2.0,
                roughness: 0.5,
                metalness: 0.0,
                dithering: true,
                maps: TextureMaps {
                    diffuse: Some(video),
                    emissive: Some(video),
                    ..TextureMaps::default()
                },
                ..Material::standard(scene.alloc_material_id(), self.naming.screen_small.clone())
            };
            replaced += replace_materials(scene, ctx, &small, &material);
        }

        if !large.is_empty() {
            let photo = scene.add_texture("screen photo", TextureSource::File(paths.screen_photo.clone()));
            if let Some(texture) = scene.texture_mut(photo) {
                texture.color_space = ColorSpace::Srgb;
                texture.flip_y = false;
                texture.wrap = Wrap::Repeat;
                texture.repeat = [-1.0, 1.0];
                texture.offset = [1.0, 0.0];
                texture.rotation = PI;
            }
            let material = Material {
                maps: TextureMaps {
                    diffuse: Some(photo),
                    ..TextureMaps::default()
                },
                ..Material::basic(
                    scene.alloc_material_id(),
                    self.naming.screen_large.clone(),
                    [1.0, 1.0, 1.0],
                )
            };
            replaced += replace_materials(scene, ctx, &large, &material);
        }
        replaced
    }

    /// One faint point light per screen and one per button.
    pub fn add_glow_lights(&self, scene: &mut SceneGraph, lighting: &LightingConfig) -> usize {
        let mut added = 0;
        for id in scene.mesh_ids() {
            let (role, intensity) = match scene.role(id) {
                MeshRole::ScreenLarge | MeshRole::ScreenSmall => {
                    (LightRole::ScreenGlow(id), lighting.screen_glow)
                }
                MeshRole::Button => (LightRole::ButtonGlow(id), lighting.button_glow),
                _ => continue,
            };
            let Some(center) = world_center(scene, id) else {
                continue;
            };
            scene.add_light(Light {
                id: LightId(0),
                role,
                kind: LightKind::Point {
                    distance: 1.5,
                    decay: 2.0,
                },
                color: [1.0, 1.0, 1.0],
                intensity,
                day_intensity: intensity,
                position: center + Vec3::new(0.0, 0.0, 0.2),
                target: center,
                shadow: None,
            });
            added += 1;
        }
        added
    }

    /// Screens and buttons become hit-testable. Runs after the screen
    /// materials are in place.
    pub fn collect_interactive(&self, scene: &mut SceneGraph) -> usize {
        let ids: BTreeSet<MeshId> = scene
            .mesh_ids()
            .into_iter()
            .filter(|id| {
                matches!(
                    scene.role(*id),
                    MeshRole::ScreenLarge | MeshRole::ScreenSmall | MeshRole::Button
                )
            })
            .collect();
        let count = ids.len();
        scene.set_interactive(ids);
        log::info!("{} interactive mesh(es)", count);
        count
    }
}

fn world_center(scene: &SceneGraph, id: MeshId) -> Option<Vec3> {
    let matrix = scene.world_matrix(id)?;
    let mesh = scene.mesh(id)?;
    Some(matrix.transform_point3(mesh.geometry.bounds.center()))
}

fn replace_materials(
    scene: &mut SceneGraph,
    ctx: &mut dyn GraphicsContext,
    ids: &[MeshId],
    material: &Material,
) -> usize {
    let mut replaced = 0;
    for id in ids {
        if let Some(mesh) = scene.mesh_mut(*id) {
            ctx.release_material(mesh.material.id);
            mesh.material = material.clone();
            replaced += 1;
        }
    }
    replaced
}

fn texture_maps(
    scene: &mut SceneGraph,
    images: &mut BTreeMap<usize, TextureId>,
    asset: &str,
    material: &LoadedMaterial,
) -> TextureMaps {
    let mut texture = |index: Option<usize>| {
        index.map(|image_index| {
            *images.entry(image_index).or_insert_with(|| {
                scene.add_texture(
                    format!("{}#{}", asset, image_index),
                    TextureSource::Embedded { image_index },
                )
            })
        })
    };
    let metallic_roughness = texture(material.maps.metallic_roughness);
    TextureMaps {
        diffuse: texture(material.maps.base_color),
        normal: texture(material.maps.normal),
        roughness: metallic_roughness,
        metalness: metallic_roughness,
        ambient_occlusion: texture(material.maps.occlusion),
        emissive: texture(material.maps.emissive),
    }
}

fn base_material(scene: &mut SceneGraph, loaded: &LoadedMaterial, maps: TextureMaps) -> Material {
    let [r, g, b, a] = loaded.base_color;
    let (transparent, alpha_test) = match loaded.alpha_mode {
        AlphaMode::Opaque => (false, 0.0),
        AlphaMode::Mask(cutoff) => (false, cutoff),
        AlphaMode::Blend => (true, 0.0),
    };
    Material {
        class: MaterialClass::Standard,
        color: [r, g, b],
        emissive: loaded.emissive,
        metalness: loaded.metallic,
        roughness: loaded.roughness,
        opacity: a,
        transparent,
        alpha_test,
        side: if loaded.double_sided {
            Side::Double
        } else {
            Side::Front
        },
        maps,
        ..Material::standard(scene.alloc_material_id(), loaded.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{LoadedMesh, MapSlots};
    use crate::render::{Capabilities, HeadlessContext};
    use glam::Mat4;

    fn loaded_mesh(name: &str, material: &str, at: Vec3) -> LoadedMesh {
        LoadedMesh {
            name: name.into(),
            transform: Mat4::from_translation(at),
            positions: vec![
                Vec3::new(-0.5, -0.5, 0.0),
                Vec3::new(0.5, -0.5, 0.0),
                Vec3::new(0.0, 0.5, 0.0),
            ],
            indices: vec![0, 1, 2],
            vertex_colors: false,
            material: LoadedMaterial::named(material),
        }
    }

    fn desk() -> LoadedAsset {
        let mut screen = loaded_mesh("Monitor", "schermoGrande", Vec3::new(0.0, 1.0, 0.0));
        screen.material.maps = MapSlots {
            base_color: Some(0),
            ..MapSlots::default()
        };
        let mut smoke = loaded_mesh("Smoke", "fumo", Vec3::ZERO);
        smoke.material.alpha_mode = AlphaMode::Blend;
        LoadedAsset {
            name: "desk".into(),
            meshes: vec![
                screen,
                loaded_mesh("Laptop", "schermoPiccolo", Vec3::new(1.0, 0.5, 0.0)),
                loaded_mesh("Key_L", "tastoMice", Vec3::new(-1.0, 0.0, 0.0)),
                loaded_mesh("Key_R", "tastoMice", Vec3::new(-1.2, 0.0, 0.0)),
                loaded_mesh("Table", "tavolo", Vec3::ZERO),
                loaded_mesh("Mouse_Body", "plastica", Vec3::ZERO),
                loaded_mesh("Rug", "tappetino", Vec3::ZERO),
                smoke,
            ],
            image_count: 1,
        }
    }

    fn builder() -> SceneGraphBuilder {
        SceneGraphBuilder::new(&PlacementConfig::default(), &NamingConfig::default())
    }

    #[test]
    fn roles_follow_material_names() {
        let b = builder();
        assert_eq!(b.classify("x", "schermoGrande"), MeshRole::ScreenLarge);
        assert_eq!(b.classify("x", "tastoMice"), MeshRole::Button);
        assert_eq!(b.classify("Mouse_Body", "plastica"), MeshRole::Mouse);
        assert_eq!(b.classify("x", "Mouse_Wheel"), MeshRole::Mouse);
        assert_eq!(b.classify("x", "schermo"), MeshRole::Plain);
        assert_eq!(b.classify("x", "tazza"), MeshRole::Cup);
        assert_eq!(b.classify("x", "Tazza_vetro"), MeshRole::Cup);
    }

    #[test]
    fn placement_snapshots_originals_and_shares_images() {
        let mut scene = SceneGraph::new();
        let ids = builder().place_asset(&mut scene, desk());
        assert_eq!(ids.len(), 8);

        let root = scene.root.as_ref().unwrap();
        assert_eq!(root.transform.position, Vec3::new(0.2, -1.5, -3.0));
        assert_eq!(root.transform.scale, Vec3::splat(0.8));

        let screen = ids[0];
        let record = scene.record(screen).unwrap();
        assert_eq!(record.role, MeshRole::ScreenLarge);
        assert_eq!(record.original, scene.mesh(screen).unwrap().transform);
        assert!(scene.mesh(screen).unwrap().material.maps.diffuse.is_some());
        assert_eq!(scene.textures().count(), 1);
        assert!(scene.mesh(ids[7]).unwrap().material.transparent);
    }

    #[test]
    fn shadow_policy() {
        let mut scene = SceneGraph::new();
        let b = builder();
        let ids = b.place_asset(&mut scene, desk());
        b.configure_all_shadows(&mut scene);

        let table = scene.mesh(ids[4]).unwrap();
        assert!(table.receive_shadow && !table.cast_shadow);
        assert_eq!(table.material.shadow_side, Some(Side::Back));

        let rug = scene.mesh(ids[6]).unwrap();
        assert!(rug.cast_shadow);
        assert_eq!(rug.material.roughness, 0.9);

        assert!(!scene.mesh(ids[0]).unwrap().cast_shadow);
        assert!(!scene.mesh(ids[7]).unwrap().cast_shadow);
        assert!(scene.mesh(ids[2]).unwrap().cast_shadow);
    }

    #[test]
    fn screens_get_their_materials_and_become_interactive() {
        let mut scene = SceneGraph::new();
        let mut ctx = HeadlessContext::new(Capabilities::full());
        let b = builder();
        let ids = b.place_asset(&mut scene, desk());

        assert_eq!(b.apply_screen_materials(&mut scene, &mut ctx, &AssetPaths::default()), 2);
        assert_eq!(ctx.released_materials(), 2);

        let large = &scene.mesh(ids[0]).unwrap().material;
        assert_eq!(large.class, MaterialClass::Basic);
        let photo = scene.texture(large.maps.diffuse.unwrap()).unwrap();
        assert_eq!(photo.repeat, [-1.0, 1.0]);
        assert!(!photo.flip_y);

        let small = &scene.mesh(ids[1]).unwrap().material;
        assert_eq!(small.emissive_intensity, 2.0);
        let video = scene.texture(small.maps.emissive.unwrap()).unwrap();
        assert!(matches!(video.source, TextureSource::Video(_)));
        assert_eq!(video.color_space, ColorSpace::Srgb);

        assert_eq!(b.collect_interactive(&mut scene), 4);
        assert!(scene.is_interactive(ids[0]));
        assert!(scene.is_interactive(ids[3]));
        assert!(!scene.is_interactive(ids[4]));
    }

    #[test]
    fn glow_lights_per_screen_and_button() {
        let mut scene = SceneGraph::new();
        let b = builder();
        b.place_asset(&mut scene, desk());
        assert_eq!(b.add_glow_lights(&mut scene, &LightingConfig::default()), 4);
        let buttons = scene
            .lights()
            .filter(|light| matches!(light.role, LightRole::ButtonGlow(_)))
            .count();
        assert_eq!(buttons, 2);
        assert!(scene
            .lights()
            .filter(|light| matches!(light.role, LightRole::ScreenGlow(_)))
            .all(|light| light.intensity == 0.03));
    }
}
