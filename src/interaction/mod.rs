//! Pointer hit testing and hover state.
//!
//! Only meshes in the scene's interactive set are ever tested, so a closer
//! decorative mesh can never steal a hit from a screen or a button.

pub mod ray;

use glam::{Vec2, Vec3};
use std::time::{Duration, Instant};

use crate::anim::{Animator, Ease, Property, Target, TweenSpec};
use crate::camera::PerspectiveCamera;
use crate::config::InteractionConfig;
use crate::scene::{MeshId, MeshRole, SceneGraph};

/// The drawable area in window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && y >= self.top && x <= self.left + self.width && y <= self.top + self.height
    }

    pub fn to_ndc(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            (x - self.left) / self.width.max(1.0) * 2.0 - 1.0,
            -((y - self.top) / self.height.max(1.0)) * 2.0 + 1.0,
        )
    }

    pub fn from_ndc(&self, ndc: Vec2) -> (f32, f32) {
        (
            self.left + (ndc.x + 1.0) * 0.5 * self.width,
            self.top + (1.0 - ndc.y) * 0.5 * self.height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    /// Bitmask of held buttons.
    pub buttons: u8,
    pub time: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    ScreenLarge,
    ScreenSmall,
    Button,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub mesh: MeshId,
    pub kind: HitKind,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    OpenResearch,
    ToggleZoom(MeshId),
    OpenRobot,
}

/// Floating "click" hint that follows the pointer over interactive meshes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HoverAffordance {
    pub visible: bool,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug)]
pub struct InteractionRaycaster {
    throttle: Duration,
    last_move: Option<Instant>,
    raycasts: u64,
    hovered: Option<MeshId>,
    affordance: HoverAffordance,
    screen_scale: Vec3,
    button_scale: Vec3,
    affordance_offset: Vec2,
}

impl InteractionRaycaster {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            throttle: Duration::from_millis(config.move_throttle_ms),
            last_move: None,
            raycasts: 0,
            hovered: None,
            affordance: HoverAffordance::default(),
            screen_scale: Vec3::from(config.screen_hover_scale),
            button_scale: Vec3::from(config.button_hover_scale),
            affordance_offset: Vec2::from(config.affordance_offset),
        }
    }

    pub fn raycast_count(&self) -> u64 {
        self.raycasts
    }

    pub fn hovered(&self) -> Option<MeshId> {
        self.hovered
    }

    pub fn affordance(&self) -> HoverAffordance {
        self.affordance
    }

    pub fn hide_affordance(&mut self) {
        self.affordance.visible = false;
    }

    /// Nearest interactive mesh under the window point `(x, y)`.
    pub fn hit_test(
        &mut self,
        x: f32,
        y: f32,
        surface: &SurfaceRect,
        camera: &PerspectiveCamera,
        scene: &SceneGraph,
    ) -> Option<Hit> {
        self.raycasts += 1;
        let ray = camera.ray_through(surface.to_ndc(x, y));

        let mut nearest: Option<(MeshId, f32)> = None;
        for id in scene.interactive() {
            let Some(mesh) = scene.mesh(*id) else {
                continue;
            };
            if !mesh.visible {
                continue;
            }
            let Some(world) = scene.world_matrix(*id) else {
                continue;
            };
            // Scaled to zero while the intro plays.
            if world.determinant().abs() < f32::EPSILON {
                continue;
            }
            let local = ray.transformed(&world.inverse());
            if let Some(t) = ray::ray_geometry(&local, &mesh.geometry) {
                if nearest.map_or(true, |(_, best)| t < best) {
                    nearest = Some((*id, t));
                }
            }
        }

        let (mesh, distance) = nearest?;
        let kind = match scene.role(mesh) {
            MeshRole::ScreenLarge => HitKind::ScreenLarge,
            MeshRole::ScreenSmall => HitKind::ScreenSmall,
            MeshRole::Button => HitKind::Button,
            _ => return None,
        };
        Some(Hit {
            mesh,
            kind,
            distance,
        })
    }

    /// Hover handling. Returns whether the event was processed; events with a
    /// held button or inside the throttle window are dropped.
    pub fn on_pointer_move(
        &mut self,
        event: &PointerEvent,
        surface: &SurfaceRect,
        camera: &PerspectiveCamera,
        scene: &SceneGraph,
        animator: &mut Animator,
    ) -> bool {
        if event.buttons != 0 {
            return false;
        }
        if let Some(last) = self.last_move {
            if event.time.saturating_duration_since(last) < self.throttle {
                return false;
            }
        }
        self.last_move = Some(event.time);

        match self.hit_test(event.x, event.y, surface, camera, scene) {
            Some(hit) => {
                self.affordance = HoverAffordance {
                    visible: true,
                    x: event.x + self.affordance_offset.x,
                    y: event.y + self.affordance_offset.y,
                };
                if self.hovered != Some(hit.mesh) {
                    if let Some(previous) = self.hovered.take() {
                        restore_scale(previous, scene, animator, Ease::Power2Out);
                    }
                    let factor = match hit.kind {
                        HitKind::Button => self.button_scale,
                        HitKind::ScreenLarge | HitKind::ScreenSmall => self.screen_scale,
                    };
                    grow(hit.mesh, factor, scene, animator);
                    log::debug!("Hover enter {:?} ({:?})", hit.mesh, hit.kind);
                    self.hovered = Some(hit.mesh);
                }
            }
            None => {
                self.hide_affordance();
                if let Some(previous) = self.hovered.take() {
                    restore_scale(previous, scene, animator, Ease::Power2InOut);
                    log::debug!("Hover exit {:?}", previous);
                }
            }
        }
        true
    }

    /// Resolves a click into the action it triggers.
    pub fn on_click(
        &mut self,
        event: &PointerEvent,
        surface: &SurfaceRect,
        camera: &PerspectiveCamera,
        scene: &SceneGraph,
    ) -> Option<ClickAction> {
        if !surface.contains(event.x, event.y) {
            return None;
        }
        let hit = self.hit_test(event.x, event.y, surface, camera, scene)?;
        Some(match hit.kind {
            HitKind::ScreenLarge => ClickAction::OpenResearch,
            HitKind::ScreenSmall => ClickAction::ToggleZoom(hit.mesh),
            HitKind::Button => ClickAction::OpenRobot,
        })
    }

    pub fn reset(&mut self) {
        self.hovered = None;
        self.last_move = None;
        self.hide_affordance();
    }
}

fn grow(mesh: MeshId, factor: Vec3, scene: &SceneGraph, animator: &mut Animator) {
    let Some(record) = scene.record(mesh) else {
        return;
    };
    animator.kill_tweens_of(Target::MeshScale(mesh));
    animator.start(
        TweenSpec::to(Property::MeshScale(mesh), record.original.scale * factor)
            .duration(0.4)
            .ease(Ease::BackOut(2.0)),
    );
}

fn restore_scale(mesh: MeshId, scene: &SceneGraph, animator: &mut Animator, ease: Ease) {
    let Some(record) = scene.record(mesh) else {
        return;
    };
    animator.kill_tweens_of(Target::MeshScale(mesh));
    animator.start(
        TweenSpec::to(Property::MeshScale(mesh), record.original.scale)
            .duration(0.3)
            .ease(ease),
    );
}
