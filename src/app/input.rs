use std::time::Instant;
use winit::event::MouseButton;
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::interaction::PointerEvent;

/// Presses that travel further than this are drags, not clicks.
const CLICK_SLOP_PX: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    ToggleDarkMode,
    ToggleZoom,
    None,
}

pub fn handle_key(key: PhysicalKey, pressed: bool) -> InputAction {
    if !pressed {
        return InputAction::None;
    }
    match key {
        PhysicalKey::Code(KeyCode::KeyD) => InputAction::ToggleDarkMode,
        PhysicalKey::Code(KeyCode::KeyZ) => InputAction::ToggleZoom,
        _ => InputAction::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerGesture {
    Hover,
    /// Left-drag orbit, in pixels.
    Orbit { dx: f32, dy: f32 },
    /// Right-drag pan, in pixels.
    Pan { dx: f32, dy: f32 },
}

/// Cursor position, held buttons and click detection for the window.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerTracker {
    position: Option<(f32, f32)>,
    buttons: u8,
    press_origin: Option<(f32, f32)>,
    dragged: bool,
}

fn button_bit(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Right => 2,
        MouseButton::Middle => 4,
        MouseButton::Back => 8,
        MouseButton::Forward => 16,
        MouseButton::Other(_) => 0,
    }
}

impl PointerTracker {
    pub fn position(&self) -> Option<(f32, f32)> {
        self.position
    }

    pub fn moved(&mut self, x: f32, y: f32) -> PointerGesture {
        let previous = self.position.replace((x, y));
        if let Some((ox, oy)) = self.press_origin {
            if (x - ox).hypot(y - oy) > CLICK_SLOP_PX {
                self.dragged = true;
            }
        }
        let Some((px, py)) = previous else {
            return PointerGesture::Hover;
        };
        let (dx, dy) = (x - px, y - py);
        if self.buttons & 1 != 0 {
            PointerGesture::Orbit { dx, dy }
        } else if self.buttons & 2 != 0 {
            PointerGesture::Pan { dx, dy }
        } else {
            PointerGesture::Hover
        }
    }

    /// Records a button transition. Returns `true` when a left release
    /// completes a click.
    pub fn button(&mut self, button: MouseButton, pressed: bool) -> bool {
        let bit = button_bit(button);
        if pressed {
            self.buttons |= bit;
            if button == MouseButton::Left {
                self.press_origin = self.position;
                self.dragged = false;
            }
            return false;
        }
        self.buttons &= !bit;
        if button != MouseButton::Left {
            return false;
        }
        let clicked = self.press_origin.take().is_some() && !self.dragged;
        self.dragged = false;
        clicked
    }

    pub fn left(&mut self) {
        self.position = None;
        self.buttons = 0;
        self.press_origin = None;
        self.dragged = false;
    }

    pub fn event(&self, time: Instant) -> Option<PointerEvent> {
        let (x, y) = self.position?;
        Some(PointerEvent {
            x,
            y,
            buttons: self.buttons,
            time,
        })
    }
}
