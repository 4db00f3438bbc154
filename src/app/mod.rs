mod input;
mod overlay;
mod timing;

use crate::config::SceneConfig;
use crate::controller::SceneController;
use crate::render::surface::SurfaceContext;
use crate::render::{Capabilities, GraphicsContext, RenderError};
use crate::ui::{OverlayView, UiAction};
use input::{InputAction, PointerGesture, PointerTracker};
use overlay::{OverlayHost, Routing};
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const TITLE: &str = "deskscene";

pub struct App {
    config: SceneConfig,
    window: Option<Arc<Window>>,
    graphics: Option<SurfaceContext>,
    controller: Option<SceneController>,
    overlay: Option<OverlayHost>,
    pointer: PointerTracker,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    close_requested: bool,
}

impl App {
    fn new(config: SceneConfig) -> Self {
        Self {
            config,
            window: None,
            graphics: None,
            controller: None,
            overlay: None,
            pointer: PointerTracker::default(),
            timing: FrameTiming::new(TITLE.to_string()),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            close_requested: false,
        }
    }

    fn init_scene(&mut self, window: Arc<Window>) -> Result<(), RenderError> {
        let size = window.inner_size();
        let mut graphics = SurfaceContext::new(window.clone(), Capabilities::full())?;
        let mut controller =
            SceneController::new(self.config.clone(), &mut graphics, size.width, size.height);
        if let Err(err) = controller.start_loading() {
            log::error!("Could not start asset loading: {}", err);
        }
        self.overlay = Some(OverlayHost::new(&window));
        self.controller = Some(controller);
        self.graphics = Some(graphics);
        Ok(())
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.close_requested = true;
        if let (Some(controller), Some(graphics)) = (&mut self.controller, &mut self.graphics) {
            if let Some(report) = controller.teardown(graphics) {
                log::debug!("Teardown report: {:?}", report);
            }
        }
        event_loop.exit();
    }

    fn apply_ui_actions(&mut self, actions: Vec<UiAction>) {
        let Some(controller) = &mut self.controller else {
            return;
        };
        for action in actions {
            match action {
                UiAction::ToggleDarkMode => {
                    controller.toggle_dark_mode();
                }
                UiAction::ToggleZoom => {
                    controller.toggle_zoom_enabled();
                }
                UiAction::OpenModal(kind) => controller.open_modal(kind),
                UiAction::CloseModal(kind) => controller.close_modal(kind),
            }
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let (Some(controller), Some(graphics)) = (&mut self.controller, &mut self.graphics) else {
            return;
        };
        self.timing
            .update(self.window.as_deref(), now, controller.lighting_mode());
        if !controller.frame(now, graphics) {
            if !self.close_requested {
                event_loop.exit();
            }
            return;
        }

        let (Some(window), Some(overlay)) = (&self.window, &mut self.overlay) else {
            return;
        };
        let view = OverlayView::from_controller(controller, window.scale_factor() as f32);
        let (frame, actions) = overlay.frame(window, &view);
        graphics.render_overlay(&frame);
        self.apply_ui_actions(actions);
    }

    fn pointer_moved(&mut self, x: f32, y: f32) {
        let gesture = self.pointer.moved(x, y);
        let Some(controller) = &mut self.controller else {
            return;
        };
        match gesture {
            PointerGesture::Orbit { dx, dy } => controller.drag(dx, dy),
            PointerGesture::Pan { dx, dy } => controller.pan(dx, dy),
            PointerGesture::Hover => {
                if let Some(event) = self.pointer.event(Instant::now()) {
                    controller.pointer_move(&event);
                }
            }
        }
    }

    fn pointer_released(&mut self) {
        let Some(controller) = &mut self.controller else {
            return;
        };
        if let Some(event) = self.pointer.event(Instant::now()) {
            if let Some(action) = controller.click(&event) {
                log::info!("Clicked: {:?}", action);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("{}", RenderError::from(err));
                event_loop.exit();
                return;
            }
        };

        if let Err(err) = self.init_scene(window.clone()) {
            log::error!("{}", err);
            event_loop.exit();
            return;
        }
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let routing = match (self.window.as_ref(), self.overlay.as_mut()) {
            (Some(window), Some(overlay)) => overlay.route(window, &event),
            _ => Routing::Scene,
        };
        let to_overlay = routing == Routing::Overlay;

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.shutdown(event_loop);
                    return;
                }
                if to_overlay {
                    return;
                }
                let pressed = event.state == ElementState::Pressed;
                let Some(controller) = &mut self.controller else {
                    return;
                };
                match input::handle_key(event.physical_key, pressed) {
                    InputAction::ToggleDarkMode => {
                        let mode = controller.toggle_dark_mode();
                        log::info!("Lighting mode: {:?}", mode);
                    }
                    InputAction::ToggleZoom => {
                        let enabled = controller.toggle_zoom_enabled();
                        log::info!("Wheel zoom {}", if enabled { "enabled" } else { "disabled" });
                    }
                    InputAction::None => {}
                }
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(controller), Some(graphics)) = (&mut self.controller, &mut self.graphics) {
                    controller.resize(new_size.width, new_size.height, graphics);
                }
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if to_overlay {
                    self.pointer.left();
                    return;
                }
                self.pointer_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseInput { state, button, .. } => {
                if to_overlay {
                    return;
                }
                let clicked = self
                    .pointer
                    .button(button, state == ElementState::Pressed);
                if clicked {
                    self.pointer_released();
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if to_overlay {
                    return;
                }
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
                if let Some(controller) = &mut self.controller {
                    controller.wheel(notches);
                }
            }
            WindowEvent::RedrawRequested => self.render(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run(config: SceneConfig) -> Result<(), RenderError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("deskscene starting");
    log::info!("   D toggles dark mode, Z toggles wheel zoom, ESC exits");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye");
    Ok(())
}
