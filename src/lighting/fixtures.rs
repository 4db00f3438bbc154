//! Spotlight, glow sphere and optional debug helper attached to each lamp
//! mesh. A fixture is created at most once per lamp; the reference lives in
//! the lamp's side-table record and doubles as the creation guard.

use glam::Vec3;
use std::f32::consts::PI;

use crate::scene::{
    hex_color, Light, LightId, LightKind, LightRole, MeshId, MeshRole, SceneGraph, ShadowSettings,
    SpriteId,
};

/// Anchor offset in the lamp's local space.
pub const LAMP_ANCHOR: Vec3 = Vec3::new(0.0, 0.0, 0.5);
/// The spot aims this far from its anchor.
pub const AIM_OFFSET: Vec3 = Vec3::new(50.0, 20.0, 0.0);
pub const SPOT_COLOR: u32 = 0xFFF4E6;
pub const GLOW_COLOR: u32 = 0xFFE100;
pub const GLOW_RADIUS: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LampFixture {
    pub lamp: MeshId,
    pub spot: LightId,
    pub glow: SpriteId,
    pub helper: Option<SpotHelper>,
}

/// Cone gizmo for a spotlight, sized by distance to the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotHelper {
    pub position: Vec3,
    pub direction: Vec3,
    pub scale: f32,
}

impl SpotHelper {
    fn new(position: Vec3, target: Vec3, camera_position: Vec3) -> Self {
        let mut helper = Self {
            position,
            direction: Vec3::NEG_Y,
            scale: 1.0,
        };
        helper.update(position, target, camera_position);
        helper
    }

    pub fn update(&mut self, position: Vec3, target: Vec3, camera_position: Vec3) {
        self.position = position;
        let direction = (target - position).normalize_or_zero();
        if direction != Vec3::ZERO {
            self.direction = direction;
        }
        self.scale = helper_scale(position.distance(camera_position));
    }
}

/// Screen-stable gizmo size for an object `distance` away from the camera.
pub fn helper_scale(distance: f32) -> f32 {
    (distance * 0.075).clamp(0.12, 3.0)
}

fn anchor_world(scene: &SceneGraph, lamp: MeshId) -> Option<Vec3> {
    scene
        .world_matrix(lamp)
        .map(|matrix| matrix.transform_point3(LAMP_ANCHOR))
}

/// Creates fixtures for every lamp mesh that does not have one yet. Returns
/// how many were created.
pub fn ensure_lamp_fixtures(
    scene: &mut SceneGraph,
    debug_helpers: bool,
    camera_position: Vec3,
) -> usize {
    let mut created = 0;
    for lamp in scene.meshes_with_role(MeshRole::Lamp) {
        let already = scene
            .record(lamp)
            .map_or(true, |record| record.lamp_fixture.is_some());
        if already {
            continue;
        }
        let Some(anchor) = anchor_world(scene, lamp) else {
            continue;
        };

        let target = anchor - AIM_OFFSET;
        let spot = scene.add_light(Light {
            id: LightId(0),
            role: LightRole::LampSpot(lamp),
            kind: LightKind::Spot {
                distance: 17.0,
                angle: PI / 3.5,
                penumbra: 0.7,
                decay: 0.9,
            },
            color: hex_color(SPOT_COLOR),
            intensity: 0.0,
            day_intensity: 0.0,
            position: anchor,
            target,
            shadow: Some(ShadowSettings {
                map_size: 1024,
                bias: -0.0001,
                normal_bias: 0.1,
                ..ShadowSettings::default()
            }),
        });
        let glow = scene.add_sprite(hex_color(GLOW_COLOR), GLOW_RADIUS, anchor);

        if let Some(mesh) = scene.mesh_mut(lamp) {
            mesh.material.emissive = hex_color(GLOW_COLOR);
            mesh.material.emissive_intensity = 0.0;
        }

        let helper = debug_helpers.then(|| SpotHelper::new(anchor, target, camera_position));
        if let Some(record) = scene.record_mut(lamp) {
            record.lamp_fixture = Some(LampFixture {
                lamp,
                spot,
                glow,
                helper,
            });
        }
        created += 1;
    }
    if created > 0 {
        log::info!("Created {} lamp fixture(s)", created);
    }
    created
}

/// Moves every fixture onto its lamp's current anchor.
pub fn sync_lamp_fixtures(scene: &mut SceneGraph, camera_position: Vec3) {
    let fixtures: Vec<LampFixture> = scene.lamp_fixtures().copied().collect();
    for fixture in fixtures {
        let Some(anchor) = anchor_world(scene, fixture.lamp) else {
            continue;
        };
        let target = anchor - AIM_OFFSET;
        if let Some(light) = scene.light_mut(fixture.spot) {
            light.position = anchor;
            light.target = target;
        }
        if let Some(sprite) = scene.sprite_mut(fixture.glow) {
            sprite.position = anchor;
        }
        if let Some(mut helper) = fixture.helper {
            helper.update(anchor, target, camera_position);
            if let Some(record) = scene.record_mut(fixture.lamp) {
                record.lamp_fixture = Some(LampFixture {
                    helper: Some(helper),
                    ..fixture
                });
            }
        }
    }
}
