//! Graphics boundary.
//!
//! The controller never talks to a GPU API directly; it drives a
//! [`GraphicsContext`]. [`HeadlessContext`] tracks which geometries,
//! materials and textures are resident, counts frame submissions and keeps
//! the last overlay batch, which is everything the controller's resource
//! lifecycle is observable through. [`surface::SurfaceContext`] puts the same
//! bookkeeping in front of a wgpu window surface.

pub mod dispose;
pub mod draw;
pub mod surface;

use std::collections::BTreeSet;

use crate::camera::PerspectiveCamera;
use crate::scene::{GeometryId, MaterialId, SceneGraph, TextureId};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window: {0}")]
    WindowCreateFailed(#[from] winit::error::OsError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("surface reports no usable texture format")]
    UnsupportedSurface,
    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Optional features, queried once at initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub physical_materials: bool,
    pub rect_area_lights: bool,
    pub shadow_maps: bool,
}

impl Capabilities {
    pub fn full() -> Self {
        Self {
            physical_materials: true,
            rect_area_lights: true,
            shadow_maps: true,
        }
    }

    pub fn minimal() -> Self {
        Self {
            physical_materials: false,
            rect_area_lights: false,
            shadow_maps: false,
        }
    }
}

/// Tessellated overlay for one frame.
pub struct OverlayFrame {
    pub clipped_primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
    pub screen_size_px: [u32; 2],
}

pub trait GraphicsContext {
    fn capabilities(&self) -> Capabilities;
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera);
    fn render_overlay(&mut self, overlay: &OverlayFrame);
    fn release_geometry(&mut self, id: GeometryId);
    fn release_material(&mut self, id: MaterialId);
    fn release_texture(&mut self, id: TextureId);
    /// Frees the context itself. Later calls are ignored.
    fn dispose(&mut self);
    fn is_disposed(&self) -> bool;
}

#[derive(Debug)]
pub struct HeadlessContext {
    capabilities: Capabilities,
    size: [u32; 2],
    frames: u64,
    geometries: BTreeSet<GeometryId>,
    materials: BTreeSet<MaterialId>,
    textures: BTreeSet<TextureId>,
    released_geometries: usize,
    released_materials: usize,
    released_textures: usize,
    overlay_primitives: usize,
    last_exposure: f32,
    last_background: [f32; 3],
    disposed: bool,
}

impl HeadlessContext {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            size: [1, 1],
            frames: 0,
            geometries: BTreeSet::new(),
            materials: BTreeSet::new(),
            textures: BTreeSet::new(),
            released_geometries: 0,
            released_materials: 0,
            released_textures: 0,
            overlay_primitives: 0,
            last_exposure: 1.0,
            last_background: [0.0, 0.0, 0.0],
            disposed: false,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn resident(&self) -> (usize, usize, usize) {
        (self.geometries.len(), self.materials.len(), self.textures.len())
    }

    pub fn is_material_resident(&self, id: MaterialId) -> bool {
        self.materials.contains(&id)
    }

    pub fn released_materials(&self) -> usize {
        self.released_materials
    }

    pub fn released_total(&self) -> usize {
        self.released_geometries + self.released_materials + self.released_textures
    }

    pub fn overlay_primitives(&self) -> usize {
        self.overlay_primitives
    }

    pub fn last_exposure(&self) -> f32 {
        self.last_exposure
    }

    pub fn last_background(&self) -> [f32; 3] {
        self.last_background
    }
}

impl GraphicsContext for HeadlessContext {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = [width.max(1), height.max(1)];
    }

    fn render(&mut self, scene: &SceneGraph, _camera: &PerspectiveCamera) {
        if self.disposed {
            return;
        }
        for mesh in scene.meshes() {
            self.geometries.insert(mesh.geometry.id);
            self.materials.insert(mesh.material.id);
            self.textures.extend(mesh.material.textures());
        }
        for sprite in scene.sprites() {
            self.geometries.insert(sprite.geometry);
            self.materials.insert(sprite.material);
        }
        self.textures.extend(scene.environment);
        self.last_exposure = scene.exposure;
        self.last_background = scene.background;
        self.frames += 1;
    }

    fn render_overlay(&mut self, overlay: &OverlayFrame) {
        if self.disposed {
            return;
        }
        self.overlay_primitives = overlay.clipped_primitives.len();
    }

    fn release_geometry(&mut self, id: GeometryId) {
        if self.geometries.remove(&id) {
            self.released_geometries += 1;
        }
    }

    fn release_material(&mut self, id: MaterialId) {
        if self.materials.remove(&id) {
            self.released_materials += 1;
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id) {
            self.released_textures += 1;
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if !self.geometries.is_empty() || !self.materials.is_empty() || !self.textures.is_empty() {
            log::warn!(
                "Disposing graphics context with {} geometries, {} materials, {} textures still resident",
                self.geometries.len(),
                self.materials.len(),
                self.textures.len()
            );
        }
        self.geometries.clear();
        self.materials.clear();
        self.textures.clear();
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::test_support::add_quad_mesh;
    use crate::scene::MeshRole;
    use glam::Vec3;

    #[test]
    fn render_uploads_and_release_frees() {
        let mut scene = SceneGraph::new();
        let id = add_quad_mesh(&mut scene, "a", Vec3::ZERO, MeshRole::Plain);
        scene.add_sprite([1.0, 1.0, 1.0], 0.2, Vec3::ZERO);
        let camera = PerspectiveCamera::default();
        let mut ctx = HeadlessContext::new(Capabilities::full());

        ctx.render(&scene, &camera);
        assert_eq!(ctx.resident(), (2, 2, 0));
        assert_eq!(ctx.frames(), 1);

        let material = scene.mesh(id).unwrap().material.id;
        ctx.release_material(material);
        ctx.release_material(material);
        assert_eq!(ctx.released_materials(), 1);
        assert!(!ctx.is_material_resident(material));
    }

    #[test]
    fn disposed_context_ignores_frames() {
        let scene = SceneGraph::new();
        let camera = PerspectiveCamera::default();
        let mut ctx = HeadlessContext::new(Capabilities::minimal());
        ctx.dispose();
        ctx.dispose();
        ctx.render(&scene, &camera);
        assert!(ctx.is_disposed());
        assert_eq!(ctx.frames(), 0);
    }
}
