//! The scene controller: the only type the host shell talks to.
//!
//! Everything runs on the caller's thread. Asset decoding is the exception;
//! its results are polled and spliced in at the start of [`SceneController::frame`].

use glam::Vec3;
use std::time::{Duration, Instant};

use crate::anim::lifecycle::AnimationLifecycle;
use crate::anim::{intro, Completion, Property, TweenHost, TweenValue};
use crate::assets::{AssetError, AssetEvent, AssetPipeline, EnvironmentMap, LoadedAsset};
use crate::camera::{CameraZoomController, OrbitControls, PerspectiveCamera, ZoomState};
use crate::config::SceneConfig;
use crate::interaction::{ClickAction, HoverAffordance, InteractionRaycaster, PointerEvent, SurfaceRect};
use crate::lighting::fixtures::{ensure_lamp_fixtures, sync_lamp_fixtures};
use crate::lighting::{build_rig, LightRig, LightingMode, LightingModeController};
use crate::materials::MaterialAssigner;
use crate::render::dispose::{DisposeReport, ResourceDisposer};
use crate::render::{Capabilities, GraphicsContext};
use crate::scene::builder::SceneGraphBuilder;
use crate::scene::{MaterialClass, MeshId, SceneGraph, TextureSource};

/// Lamp fixtures keep following their lamps for this long after the splice.
const FIXTURE_SYNC_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Research,
    Robot,
    ButtonDescription,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModalFlags {
    pub research: bool,
    pub robot: bool,
    pub button_description: bool,
}

impl ModalFlags {
    pub fn get(&self, kind: ModalKind) -> bool {
        match kind {
            ModalKind::Research => self.research,
            ModalKind::Robot => self.robot,
            ModalKind::ButtonDescription => self.button_description,
        }
    }

    fn set(&mut self, kind: ModalKind, visible: bool) {
        match kind {
            ModalKind::Research => self.research = visible,
            ModalKind::Robot => self.robot = visible,
            ModalKind::ButtonDescription => self.button_description = visible,
        }
    }

    pub fn any(&self) -> bool {
        self.research || self.robot || self.button_description
    }
}

/// Tween host for one frame: scene values plus the camera rig. The orbit
/// controls are re-synchronised on every camera write.
struct FrameHost<'a> {
    scene: &'a mut SceneGraph,
    camera: &'a mut PerspectiveCamera,
    controls: &'a mut OrbitControls,
}

impl TweenHost for FrameHost<'_> {
    fn read(&self, property: Property) -> Option<TweenValue> {
        match property {
            Property::CameraPosition => Some(self.camera.position.into()),
            Property::OrbitTarget => Some(self.controls.target.into()),
            _ => self.scene.read(property),
        }
    }

    fn write(&mut self, property: Property, value: TweenValue) -> bool {
        match property {
            Property::CameraPosition | Property::OrbitTarget => {
                let Some(v) = value.as_vector() else {
                    return false;
                };
                if property == Property::CameraPosition {
                    self.camera.position = v;
                } else {
                    self.controls.target = v;
                }
                self.controls.sync(self.camera);
                true
            }
            _ => self.scene.write(property, value),
        }
    }
}

pub struct SceneController {
    config: SceneConfig,
    capabilities: Capabilities,
    scene: SceneGraph,
    rig: LightRig,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    zoom: CameraZoomController,
    lighting: LightingModeController,
    raycaster: InteractionRaycaster,
    lifecycle: AnimationLifecycle,
    builder: SceneGraphBuilder,
    assigner: MaterialAssigner,
    assets: Option<AssetPipeline>,
    surface: SurfaceRect,
    modals: ModalFlags,
    scroll_locked: bool,
    listening: bool,
    zoom_enabled: bool,
    loaded: bool,
    assembly_active: bool,
    spliced_at: Option<Instant>,
}

impl SceneController {
    /// Builds the empty scene with its lighting rig. Capabilities are
    /// queried from `ctx` once, here.
    pub fn new(config: SceneConfig, ctx: &mut dyn GraphicsContext, width: u32, height: u32) -> Self {
        let capabilities = ctx.capabilities();
        ctx.resize(width, height);

        let mut scene = SceneGraph::new();
        let rig = build_rig(&mut scene, &config.lighting, capabilities);
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let camera = PerspectiveCamera::from_config(&config.camera, aspect);
        let controls = OrbitControls::new(&config.orbit, Vec3::from(config.camera.target));
        let zoom_enabled = config.orbit.zoom_enabled;

        log::info!(
            "Scene controller ready ({}x{}, physical materials: {}, rect-area lights: {})",
            width,
            height,
            capabilities.physical_materials,
            capabilities.rect_area_lights
        );
        Self {
            capabilities,
            rig,
            camera,
            controls,
            zoom: CameraZoomController::new(&config.zoom),
            lighting: LightingModeController::new(config.lighting.clone()),
            raycaster: InteractionRaycaster::new(&config.interaction),
            lifecycle: AnimationLifecycle::new(),
            builder: SceneGraphBuilder::new(&config.placement, &config.naming),
            assigner: MaterialAssigner::new(capabilities),
            assets: None,
            surface: SurfaceRect::new(width as f32, height as f32),
            modals: ModalFlags::default(),
            scroll_locked: false,
            listening: true,
            zoom_enabled,
            loaded: false,
            assembly_active: false,
            spliced_at: None,
            scene,
            config,
        }
    }

    /// Queues the model and the environment probe on the asset worker.
    pub fn start_loading(&mut self) -> Result<(), AssetError> {
        let mut pipeline = AssetPipeline::spawn()?;
        pipeline.load_asset(self.config.assets.model.clone())?;
        pipeline.load_environment(self.config.assets.environment.clone())?;
        self.assets = Some(pipeline);
        Ok(())
    }

    /// One render-loop tick. Returns `false` once the controller has been
    /// torn down; the caller must stop scheduling frames then.
    pub fn frame(&mut self, now: Instant, ctx: &mut dyn GraphicsContext) -> bool {
        let Some(dt) = self.lifecycle.begin_frame(now) else {
            return false;
        };

        let events = self
            .assets
            .as_mut()
            .map(AssetPipeline::poll)
            .unwrap_or_default();
        for event in events {
            match event {
                AssetEvent::Model(Ok(asset)) => self.splice_asset(asset, ctx, now),
                AssetEvent::Model(Err(err)) => {
                    log::error!("Model failed to load, scene stays empty: {}", err)
                }
                AssetEvent::Environment(Ok(env)) => self.apply_environment(env),
                AssetEvent::Environment(Err(err)) => {
                    log::warn!("Environment failed to load, continuing without it: {}", err)
                }
            }
        }

        let completions = {
            let mut host = FrameHost {
                scene: &mut self.scene,
                camera: &mut self.camera,
                controls: &mut self.controls,
            };
            self.lifecycle.advance(dt, &mut host)
        };
        for completion in completions {
            self.dispatch(completion);
        }

        self.controls.update(&mut self.camera);

        let in_window = self
            .spliced_at
            .is_some_and(|at| now.saturating_duration_since(at) < FIXTURE_SYNC_WINDOW);
        if self.assembly_active || in_window {
            sync_lamp_fixtures(&mut self.scene, self.camera.position);
        }

        ctx.render(&self.scene, &self.camera);
        true
    }

    fn dispatch(&mut self, completion: Completion) {
        if self.zoom.on_completion(completion, &mut self.controls) {
            return;
        }
        if self.lighting.on_completion(completion, &mut self.lifecycle.animator) {
            return;
        }
        if completion == Completion::AssemblyFinished {
            self.finish_assembly();
        }
    }

    fn finish_assembly(&mut self) {
        self.assembly_active = false;
        if self.zoom.state() == ZoomState::Normal {
            self.controls.enabled = true;
        }
        log::info!("Assembly finished");
    }

    /// Splices a decoded model into the live scene in one step.
    pub fn splice_asset(&mut self, asset: LoadedAsset, ctx: &mut dyn GraphicsContext, now: Instant) {
        if self.loaded {
            log::warn!("Ignoring second model {}; only one asset is supported", asset.name);
            return;
        }
        let animator = &mut self.lifecycle.animator;
        let scene = &mut self.scene;

        self.builder.place_asset(scene, asset);
        self.assigner.assign_all(scene, ctx);
        self.builder.configure_all_shadows(scene);
        self.builder
            .apply_screen_materials(scene, ctx, &self.config.assets);
        self.builder.add_glow_lights(scene, &self.config.lighting);
        self.builder.collect_interactive(scene);
        ensure_lamp_fixtures(scene, self.config.debug_helpers, self.camera.position);
        intro::apply_resting_looks(scene);

        if self.config.placement.assembly && intro::start_assembly(scene, animator) > 0 {
            self.assembly_active = true;
            self.controls.enabled = false;
            self.controls.halt();
        } else {
            intro::skip_assembly(scene);
        }
        intro::start_idle_loops(scene, animator);
        self.lighting.reapply(scene, animator);

        self.loaded = true;
        self.spliced_at = Some(now);
        log::info!("Model spliced into the scene");
    }

    /// Installs the environment probe and points every lit material at it.
    pub fn apply_environment(&mut self, env: EnvironmentMap) {
        log::info!("Environment {} ({}x{})", env.path.display(), env.width, env.height);
        let texture = self
            .scene
            .add_texture("environment", TextureSource::Environment(env.path));
        self.scene.environment = Some(texture);

        let intensity = self.config.lighting.environment_intensity;
        for id in self.scene.mesh_ids() {
            let Some(mesh) = self.scene.mesh_mut(id) else {
                continue;
            };
            if mesh.material.class == MaterialClass::Basic {
                continue;
            }
            mesh.material.env_map = Some(texture);
            mesh.material.env_intensity = intensity;
            if let Some(record) = self.scene.record_mut(id) {
                if record.original_env_intensity.is_some() {
                    record.original_env_intensity = Some(intensity);
                }
            }
        }
        self.lighting
            .reapply(&mut self.scene, &mut self.lifecycle.animator);
    }

    fn accepts_pointer(&self, time: Instant) -> bool {
        if !self.listening || self.lifecycle.is_destroyed() {
            return false;
        }
        let delay = Duration::from_millis(self.config.interaction.pointer_enable_delay_ms);
        self.spliced_at
            .is_some_and(|at| time.saturating_duration_since(at) >= delay)
    }

    /// Hover handling. Returns whether the event was processed.
    pub fn pointer_move(&mut self, event: &PointerEvent) -> bool {
        if !self.accepts_pointer(event.time) {
            return false;
        }
        self.raycaster.on_pointer_move(
            event,
            &self.surface,
            &self.camera,
            &self.scene,
            &mut self.lifecycle.animator,
        )
    }

    /// Resolves a click and performs its action.
    pub fn click(&mut self, event: &PointerEvent) -> Option<ClickAction> {
        if !self.listening || self.lifecycle.is_destroyed() || !self.loaded {
            return None;
        }
        let action = self
            .raycaster
            .on_click(event, &self.surface, &self.camera, &self.scene)?;
        log::debug!("Click: {:?}", action);
        match action {
            ClickAction::OpenResearch => self.open_modal(ModalKind::Research),
            ClickAction::OpenRobot => self.open_modal(ModalKind::Robot),
            ClickAction::ToggleZoom(mesh) => self.toggle_camera_zoom(mesh),
        }
        Some(action)
    }

    fn toggle_camera_zoom(&mut self, mesh: MeshId) {
        match self.zoom.state() {
            ZoomState::Normal => {
                let Some(focus) = self.scene.world_position(mesh) else {
                    return;
                };
                self.zoom.zoom_in(
                    focus,
                    &self.camera,
                    &mut self.controls,
                    &mut self.lifecycle.animator,
                );
            }
            ZoomState::Zoomed => {
                self.zoom.zoom_out(&mut self.lifecycle.animator);
            }
            state => log::debug!("Zoom toggle ignored while {:?}", state),
        }
    }

    /// Orbit drag in window pixels.
    pub fn drag(&mut self, dx: f32, dy: f32) {
        if self.listening && self.controls.enabled {
            self.controls.rotate(dx, dy, self.surface.height);
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        if self.listening && self.controls.enabled {
            self.controls.pan(dx, dy, self.surface.height, &self.camera);
        }
    }

    pub fn wheel(&mut self, notches: f32) {
        if self.listening && self.controls.enabled {
            self.controls.dolly(notches);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32, ctx: &mut dyn GraphicsContext) {
        if !self.listening {
            return;
        }
        self.camera.set_viewport(width, height);
        self.surface = SurfaceRect::new(width as f32, height as f32);
        ctx.resize(width, height);
    }

    pub fn toggle_dark_mode(&mut self) -> LightingMode {
        self.lighting
            .toggle(&mut self.scene, &mut self.lifecycle.animator)
    }

    pub fn toggle_zoom_enabled(&mut self) -> bool {
        self.zoom_enabled = !self.zoom_enabled;
        self.controls.enable_zoom = self.zoom_enabled;
        self.zoom_enabled
    }

    pub fn open_modal(&mut self, kind: ModalKind) {
        self.modals.set(kind, true);
        self.scroll_locked = true;
        self.raycaster.hide_affordance();
        log::info!("Opened {:?} modal", kind);
    }

    /// Close notification from a modal. The scroll lock is released once no
    /// modal remains open.
    pub fn close_modal(&mut self, kind: ModalKind) {
        self.modals.set(kind, false);
        self.scroll_locked = self.modals.any();
    }

    /// Tears everything down in order. Safe to call more than once; later
    /// calls do nothing and return `None`.
    pub fn teardown(&mut self, ctx: &mut dyn GraphicsContext) -> Option<DisposeReport> {
        if !self.lifecycle.stop() {
            return None;
        }
        self.listening = false;
        self.raycaster.reset();
        let loops = self.lifecycle.cancel_animations();
        if let Some(mut assets) = self.assets.take() {
            assets.shutdown();
        }
        let report = ResourceDisposer::dispose_scene(&mut self.scene, ctx);
        ctx.dispose();
        self.controls.dispose();
        log::info!("Scene torn down ({} looping animation(s) cancelled)", loops);
        Some(report)
    }

    pub fn modals(&self) -> ModalFlags {
        self.modals
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn lighting_mode(&self) -> LightingMode {
        self.lighting.mode()
    }

    pub fn zoom_state(&self) -> ZoomState {
        self.zoom.state()
    }

    pub fn zoom_enabled(&self) -> bool {
        self.zoom_enabled
    }

    pub fn affordance(&self) -> HoverAffordance {
        self.raycaster.affordance()
    }

    pub fn hovered(&self) -> Option<MeshId> {
        self.raycaster.hovered()
    }

    pub fn raycast_count(&self) -> u64 {
        self.raycaster.raycast_count()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn rig(&self) -> LightRig {
        self.rig
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn surface(&self) -> SurfaceRect {
        self.surface
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn assembly_active(&self) -> bool {
        self.assembly_active
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }

    pub fn frames(&self) -> u64 {
        self.lifecycle.frames()
    }

    pub fn active_tweens_on(&self, property: Property) -> usize {
        self.lifecycle.animator.active_on(property)
    }

    pub fn looping_animations(&self) -> usize {
        self.lifecycle.animator.looping_handles().count()
    }
}
