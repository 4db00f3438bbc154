pub mod builder;
pub mod material;
mod tween;

pub use material::{
    hex_color, ColorSpace, Material, MaterialClass, MaterialId, Side, Texture, TextureId,
    TextureMaps, TextureSource, Wrap,
};

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::collections::{BTreeMap, BTreeSet};

use crate::lighting::fixtures::LampFixture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

/// Position, Euler rotation (XYZ order, radians) and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            position,
            rotation: Vec3::new(x, y, z),
            scale,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

/// Local-space triangle soup used for hit testing.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub id: GeometryId,
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl Geometry {
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(move |tri| {
            Some([
                *self.positions.get(tri[0] as usize)?,
                *self.positions.get(tri[1] as usize)?,
                *self.positions.get(tri[2] as usize)?,
            ])
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub id: MeshId,
    pub name: String,
    pub geometry: Geometry,
    pub material: Material,
    /// Relative to the asset root.
    pub transform: Transform,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshRole {
    Plain,
    ScreenLarge,
    ScreenSmall,
    Button,
    Lamp,
    Smoke,
    Cup,
    Coffee,
    Table,
    Mouse,
}

impl MeshRole {
    pub fn is_screen(self) -> bool {
        matches!(self, MeshRole::ScreenLarge | MeshRole::ScreenSmall)
    }
}

/// Per-mesh metadata captured once when the asset is placed.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRecord {
    pub role: MeshRole,
    pub original: Transform,
    pub original_env_intensity: Option<f32>,
    pub lamp_fixture: Option<LampFixture>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    Hemisphere { ground_color: [f32; 3] },
    Directional,
    Point { distance: f32, decay: f32 },
    Spot { distance: f32, angle: f32, penumbra: f32, decay: f32 },
    RectArea { width: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightRole {
    Ambient,
    Hemisphere,
    Fill,
    RectArea,
    Main,
    LampSpot(MeshId),
    ScreenGlow(MeshId),
    ButtonGlow(MeshId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    pub map_size: u32,
    pub bias: f32,
    pub normal_bias: f32,
    /// Blur radius for soft shadow filtering.
    pub radius: f32,
    pub near: f32,
    pub far: f32,
    /// Half extent of the orthographic shadow box for directional lights.
    pub extent: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 512,
            bias: 0.0,
            normal_bias: 0.0,
            radius: 1.0,
            near: 0.5,
            far: 500.0,
            extent: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub id: LightId,
    pub role: LightRole,
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    /// Intensity the light returns to in Light mode.
    pub day_intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub shadow: Option<ShadowSettings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub id: SpriteId,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub color: [f32; 3],
    pub radius: f32,
    pub opacity: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub near: f32,
    pub far: f32,
}

/// Placement of the loaded asset group.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRoot {
    pub name: String,
    pub transform: Transform,
}

/// Everything the renderer draws, plus the side table the controller keys
/// its behaviour on.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    meshes: BTreeMap<MeshId, Mesh>,
    records: BTreeMap<MeshId, MeshRecord>,
    lights: BTreeMap<LightId, Light>,
    sprites: BTreeMap<SpriteId, Sprite>,
    textures: BTreeMap<TextureId, Texture>,
    interactive: BTreeSet<MeshId>,
    pub root: Option<AssetRoot>,
    pub background: [f32; 3],
    pub environment: Option<TextureId>,
    pub fog: Option<Fog>,
    pub exposure: f32,
    next_id: u32,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            meshes: BTreeMap::new(),
            records: BTreeMap::new(),
            lights: BTreeMap::new(),
            sprites: BTreeMap::new(),
            textures: BTreeMap::new(),
            interactive: BTreeSet::new(),
            root: None,
            background: [0.0, 0.0, 0.0],
            environment: None,
            fog: None,
            exposure: 1.0,
            next_id: 1,
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn alloc_material_id(&mut self) -> MaterialId {
        MaterialId(self.next())
    }

    pub fn alloc_geometry_id(&mut self) -> GeometryId {
        GeometryId(self.next())
    }

    pub fn add_texture(&mut self, label: impl Into<String>, source: TextureSource) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(id, Texture::new(id, label, source));
        id
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(&id)
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.textures.values()
    }

    pub fn add_mesh(
        &mut self,
        name: impl Into<String>,
        geometry: Geometry,
        material: Material,
        transform: Transform,
    ) -> MeshId {
        let id = MeshId(self.next());
        self.meshes.insert(
            id,
            Mesh {
                id,
                name: name.into(),
                geometry,
                material,
                transform,
                cast_shadow: false,
                receive_shadow: false,
                visible: true,
            },
        );
        id
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(&id)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(&id)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes.values()
    }

    pub fn meshes_mut(&mut self) -> impl Iterator<Item = &mut Mesh> {
        self.meshes.values_mut()
    }

    pub fn mesh_ids(&self) -> Vec<MeshId> {
        self.meshes.keys().copied().collect()
    }

    pub fn set_record(&mut self, id: MeshId, record: MeshRecord) {
        self.records.insert(id, record);
    }

    pub fn record(&self, id: MeshId) -> Option<&MeshRecord> {
        self.records.get(&id)
    }

    pub fn record_mut(&mut self, id: MeshId) -> Option<&mut MeshRecord> {
        self.records.get_mut(&id)
    }

    pub fn role(&self, id: MeshId) -> MeshRole {
        self.records
            .get(&id)
            .map(|record| record.role)
            .unwrap_or(MeshRole::Plain)
    }

    pub fn meshes_with_role(&self, role: MeshRole) -> Vec<MeshId> {
        self.records
            .iter()
            .filter(|(_, record)| record.role == role)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn lamp_fixtures(&self) -> impl Iterator<Item = &LampFixture> {
        self.records
            .values()
            .filter_map(|record| record.lamp_fixture.as_ref())
    }

    pub fn add_light(&mut self, mut light: Light) -> LightId {
        let id = LightId(self.next());
        light.id = id;
        self.lights.insert(id, light);
        id
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(&id)
    }

    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(&id)
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.values()
    }

    pub fn light_ids(&self) -> Vec<LightId> {
        self.lights.keys().copied().collect()
    }

    pub fn add_sprite(&mut self, color: [f32; 3], radius: f32, position: Vec3) -> SpriteId {
        let id = SpriteId(self.next());
        let geometry = self.alloc_geometry_id();
        let material = self.alloc_material_id();
        self.sprites.insert(
            id,
            Sprite {
                id,
                geometry,
                material,
                color,
                radius,
                opacity: 0.0,
                position,
            },
        );
        id
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.get(&id)
    }

    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.get_mut(&id)
    }

    pub fn sprites(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites.values()
    }

    pub fn set_interactive(&mut self, ids: BTreeSet<MeshId>) {
        self.interactive = ids;
    }

    pub fn interactive(&self) -> &BTreeSet<MeshId> {
        &self.interactive
    }

    pub fn is_interactive(&self, id: MeshId) -> bool {
        self.interactive.contains(&id)
    }

    pub fn root_matrix(&self) -> Mat4 {
        self.root
            .as_ref()
            .map(|root| root.transform.matrix())
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn world_matrix(&self, id: MeshId) -> Option<Mat4> {
        let mesh = self.meshes.get(&id)?;
        Some(self.root_matrix() * mesh.transform.matrix())
    }

    pub fn world_position(&self, id: MeshId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|matrix| matrix.transform_point3(Vec3::ZERO))
    }

    /// Removes every mesh, sprite and texture, returning them so their GPU
    /// resources can be released. Lights and the side table go too.
    pub fn drain(&mut self) -> DrainedScene {
        let meshes = std::mem::take(&mut self.meshes).into_values().collect();
        let sprites = std::mem::take(&mut self.sprites).into_values().collect();
        let textures = std::mem::take(&mut self.textures).into_values().collect();
        self.records.clear();
        self.lights.clear();
        self.interactive.clear();
        self.environment = None;
        self.root = None;
        DrainedScene {
            meshes,
            sprites,
            textures,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty() && self.sprites.is_empty() && self.textures.is_empty()
    }
}

pub struct DrainedScene {
    pub meshes: Vec<Mesh>,
    pub sprites: Vec<Sprite>,
    pub textures: Vec<Texture>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_matrix_round_trips() {
        let transform = Transform {
            position: Vec3::new(0.2, -1.5, -3.0),
            rotation: Vec3::new(0.3, -0.2, 0.1),
            scale: Vec3::splat(0.8),
        };
        let back = Transform::from_matrix(transform.matrix());
        assert!((back.position - transform.position).length() < 1e-5);
        assert!((back.rotation - transform.rotation).length() < 1e-4);
        assert!((back.scale - transform.scale).length() < 1e-5);
    }

    #[test]
    fn world_position_applies_root_placement() {
        let mut scene = SceneGraph::new();
        scene.root = Some(AssetRoot {
            name: "desk".into(),
            transform: Transform {
                position: Vec3::new(1.0, 0.0, 0.0),
                rotation: Vec3::ZERO,
                scale: Vec3::splat(2.0),
            },
        });
        let id = test_support::add_quad_mesh(
            &mut scene,
            "a",
            Vec3::new(0.0, 1.0, 0.0),
            MeshRole::Plain,
        );
        let world = scene.world_position(id).unwrap();
        assert!((world - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut scene = SceneGraph::new();
        let t = scene.add_texture("t", TextureSource::File("a.png".into()));
        let m = scene.alloc_material_id();
        let s = scene.add_sprite([1.0, 1.0, 1.0], 0.2, Vec3::ZERO);
        let sprite = scene.sprite(s).unwrap();
        let mut all = vec![t.0, m.0, s.0, sprite.geometry.0, sprite.material.0];
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn drain_empties_the_graph() {
        let mut scene = SceneGraph::new();
        test_support::add_quad_mesh(&mut scene, "a", Vec3::ZERO, MeshRole::Plain);
        scene.add_sprite([1.0, 1.0, 1.0], 0.2, Vec3::ZERO);
        scene.add_texture("t", TextureSource::File("a.png".into()));
        let drained = scene.drain();
        assert_eq!(drained.meshes.len(), 1);
        assert_eq!(drained.sprites.len(), 1);
        assert_eq!(drained.textures.len(), 1);
        assert!(scene.is_empty());
    }
}
