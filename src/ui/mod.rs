//! Page overlay: the hover affordance, the two toggles and the modal windows.
//!
//! Drawing is a pure function of an [`OverlayView`]; user intent comes back as
//! [`UiAction`]s for the shell to forward to the controller.

use crate::controller::{ModalFlags, ModalKind, SceneController};
use crate::interaction::HoverAffordance;
use crate::lighting::LightingMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    ToggleDarkMode,
    ToggleZoom,
    OpenModal(ModalKind),
    CloseModal(ModalKind),
}

/// Everything the overlay reads in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayView {
    pub modals: ModalFlags,
    pub affordance: HoverAffordance,
    pub lighting: LightingMode,
    pub zoom_enabled: bool,
    pub loaded: bool,
    /// Logical points per physical pixel; the affordance is placed in pixels.
    pub pixels_per_point: f32,
}

impl OverlayView {
    pub fn from_controller(controller: &SceneController, pixels_per_point: f32) -> Self {
        Self {
            modals: controller.modals(),
            affordance: controller.affordance(),
            lighting: controller.lighting_mode(),
            zoom_enabled: controller.zoom_enabled(),
            loaded: controller.is_loaded(),
            pixels_per_point,
        }
    }
}

const MODALS: [ModalKind; 3] = [ModalKind::Research, ModalKind::Robot, ModalKind::ButtonDescription];

pub fn modal_title(kind: ModalKind) -> &'static str {
    match kind {
        ModalKind::Research => "Research",
        ModalKind::Robot => "Robot dog",
        ModalKind::ButtonDescription => "What is this button?",
    }
}

fn modal_body(kind: ModalKind) -> &'static str {
    match kind {
        ModalKind::Research => "Papers and notes behind the big monitor.",
        ModalKind::Robot => "The quadruped project, from gait tuning to field tests.",
        ModalKind::ButtonDescription => {
            "Hover the glowing key to find it; click it to meet the robot dog."
        }
    }
}

pub fn toggle_labels(view: &OverlayView) -> (&'static str, &'static str) {
    let mode = match view.lighting {
        LightingMode::Light => "Dark mode",
        LightingMode::Dark => "Light mode",
    };
    let zoom = if view.zoom_enabled {
        "Disable zoom"
    } else {
        "Enable zoom"
    };
    (mode, zoom)
}

pub fn draw(ctx: &egui::Context, view: &OverlayView) -> Vec<UiAction> {
    let mut actions = Vec::new();
    let (mode_label, zoom_label) = toggle_labels(view);

    egui::TopBottomPanel::top("deskscene_toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button(mode_label).clicked() {
                actions.push(UiAction::ToggleDarkMode);
            }
            if ui.button(zoom_label).clicked() {
                actions.push(UiAction::ToggleZoom);
            }
            if !view.loaded {
                ui.label("Loading desk...");
            }
        });
    });

    if view.affordance.visible && !view.modals.any() {
        let scale = view.pixels_per_point.max(f32::EPSILON);
        let pos = egui::pos2(view.affordance.x / scale, view.affordance.y / scale);
        egui::Area::new(egui::Id::new("deskscene_affordance"))
            .fixed_pos(pos)
            .show(ctx, |ui| {
                if ui.button("click").clicked() {
                    actions.push(UiAction::OpenModal(ModalKind::ButtonDescription));
                }
            });
    }

    for kind in MODALS {
        if !view.modals.get(kind) {
            continue;
        }
        let mut open = true;
        let mut close = false;
        egui::Window::new(modal_title(kind))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(modal_body(kind));
                ui.add_space(8.0);
                close = ui.button("Close").clicked();
            });
        if close || !open {
            actions.push(UiAction::CloseModal(kind));
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> OverlayView {
        OverlayView {
            modals: ModalFlags::default(),
            affordance: HoverAffordance::default(),
            lighting: LightingMode::Light,
            zoom_enabled: false,
            loaded: true,
            pixels_per_point: 1.0,
        }
    }

    /// Several frames, so new windows are past their sizing pass and fade-in.
    fn run(view: &OverlayView) -> (Vec<UiAction>, usize) {
        let ctx = egui::Context::default();
        let mut actions = Vec::new();
        let mut shapes = 0;
        for _ in 0..10 {
            let output = ctx.run(egui::RawInput::default(), |ctx| {
                actions.extend(draw(ctx, view));
            });
            shapes = output.shapes.len();
        }
        (actions, shapes)
    }

    #[test]
    fn idle_overlay_emits_nothing() {
        let (actions, _) = run(&view());
        assert!(actions.is_empty());
    }

    #[test]
    fn open_modals_add_windows() {
        let (_, bare) = run(&view());
        let mut with_modal = view();
        with_modal.modals.research = true;
        let (actions, shapes) = run(&with_modal);
        assert!(actions.is_empty());
        assert!(shapes > bare);
    }

    #[test]
    fn labels_follow_state() {
        let mut v = view();
        assert_eq!(toggle_labels(&v), ("Dark mode", "Enable zoom"));
        v.lighting = LightingMode::Dark;
        v.zoom_enabled = true;
        assert_eq!(toggle_labels(&v), ("Light mode", "Disable zoom"));
    }
}
