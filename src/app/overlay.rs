//! Bridge between the window and the egui overlay.

use winit::event::WindowEvent;
use winit::window::Window;

use crate::render::OverlayFrame;
use crate::ui::{self, OverlayView, UiAction};

/// Who handles a window event once the overlay has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Overlay,
    Scene,
}

impl Routing {
    /// Pointer traffic stays with the overlay while the cursor is over one
    /// of its widgets, even when egui did not consume that exact event.
    pub fn decide(consumed: bool, overlay_under_pointer: bool, pointer_event: bool) -> Self {
        if consumed || (pointer_event && overlay_under_pointer) {
            Routing::Overlay
        } else {
            Routing::Scene
        }
    }
}

fn is_pointer_event(event: &WindowEvent) -> bool {
    matches!(
        event,
        WindowEvent::CursorMoved { .. }
            | WindowEvent::MouseInput { .. }
            | WindowEvent::MouseWheel { .. }
    )
}

pub struct OverlayHost {
    egui: egui::Context,
    input: egui_winit::State,
}

impl OverlayHost {
    pub fn new(window: &Window) -> Self {
        let egui = egui::Context::default();
        let input = egui_winit::State::new(
            egui.clone(),
            egui.viewport_id(),
            window,
            Some(window.scale_factor() as f32),
            window.theme(),
            None,
        );
        Self { egui, input }
    }

    pub fn route(&mut self, window: &Window, event: &WindowEvent) -> Routing {
        let consumed = self.input.on_window_event(window, event).consumed;
        Routing::decide(consumed, self.egui.wants_pointer_input(), is_pointer_event(event))
    }

    /// Runs one overlay pass and tessellates it for the renderer.
    pub fn frame(&mut self, window: &Window, view: &OverlayView) -> (OverlayFrame, Vec<UiAction>) {
        let mut actions = Vec::new();
        let raw_input = self.input.take_egui_input(window);
        let output = self.egui.run(raw_input, |ctx| actions = ui::draw(ctx, view));
        self.input
            .handle_platform_output(window, output.platform_output);

        let size = window.inner_size();
        let frame = OverlayFrame {
            clipped_primitives: self.egui.tessellate(output.shapes, output.pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
            screen_size_px: [size.width.max(1), size.height.max(1)],
        };
        (frame, actions)
    }
}
