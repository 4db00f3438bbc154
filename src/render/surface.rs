//! Window renderer on wgpu.
//!
//! Meshes are drawn flat-shaded from the draw list in [`super::draw`] and the
//! egui overlay is painted on top with `egui-wgpu`. Resource bookkeeping is
//! delegated to a [`HeadlessContext`], so releases and disposal behave
//! exactly as they do without a window. A frame is presented when its overlay
//! arrives through [`GraphicsContext::render_overlay`].

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::draw::{build_draws, DrawItem, DrawUniforms};
use super::{Capabilities, GraphicsContext, HeadlessContext, OverlayFrame, RenderError};
use crate::camera::PerspectiveCamera;
use crate::scene::{Geometry, GeometryId, MaterialId, SceneGraph, TextureId};

const MAX_DRAWS: usize = 512;
/// Dynamic uniform offsets must be 256-byte aligned.
const UNIFORM_STRIDE: u64 = 256;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const SHADER_SOURCE: &str = r#"
struct Draw {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    color: vec4<f32>,
    emissive: vec4<f32>,
    ambient: vec4<f32>,
    key_dir: vec4<f32>,
    key_color: vec4<f32>,
    fill_dir: vec4<f32>,
    fill_color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> draw: Draw;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) world: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    let world = draw.model * vec4<f32>(position, 1.0);
    var out: VertexOutput;
    out.clip = draw.view_proj * world;
    out.world = world.xyz;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(cross(dpdx(in.world), dpdy(in.world)));
    let base = draw.color.rgb;
    let key = draw.key_color.rgb * abs(dot(normal, draw.key_dir.xyz));
    let fill = draw.fill_color.rgb * abs(dot(normal, draw.fill_dir.xyz));
    let lit = base * (draw.ambient.rgb + key + fill);
    let shaded = select(lit, base, draw.emissive.w > 0.5);
    return vec4<f32>((shaded + draw.emissive.rgb) * draw.ambient.w, draw.color.a);
}
"#;

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

impl GpuGeometry {
    fn upload(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let positions: Vec<[f32; 3]> = geometry.positions.iter().map(|p| p.to_array()).collect();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
        }
    }
}

struct MeshPipelines {
    opaque: wgpu::RenderPipeline,
    transparent: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl MeshPipelines {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let uniform_size = std::mem::size_of::<DrawUniforms>() as u64;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniforms"),
            size: UNIFORM_STRIDE * MAX_DRAWS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(uniform_size),
                }),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, depth_write_enabled: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                // Imported winding varies; draw both sides.
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            opaque: pipeline("Opaque Mesh Pipeline", true),
            transparent: pipeline("Transparent Mesh Pipeline", false),
            uniform_buffer,
            bind_group,
        }
    }
}

pub struct SurfaceContext {
    tracker: HeadlessContext,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    pipelines: MeshPipelines,
    geometries: HashMap<GeometryId, GpuGeometry>,
    draws: Vec<DrawItem>,
    clear: wgpu::Color,
    overlay: egui_wgpu::Renderer,
}

impl SurfaceContext {
    pub fn new(window: Arc<Window>, capabilities: Capabilities) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("deskscene device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Surface ready: {} ({:?}, {:?})",
            adapter.get_info().name,
            adapter.get_info().backend,
            format
        );

        let depth_view = create_depth_view(&device, config.width, config.height);
        let pipelines = MeshPipelines::new(&device, format);
        let overlay = egui_wgpu::Renderer::new(&device, format, None, 1, false);
        let mut tracker = HeadlessContext::new(capabilities);
        tracker.resize(config.width, config.height);

        Ok(Self {
            tracker,
            surface,
            device,
            queue,
            config,
            depth_view,
            pipelines,
            geometries: HashMap::new(),
            draws: Vec::new(),
            clear: wgpu::Color::BLACK,
            overlay,
        })
    }

    /// Resident resources and frame counters, as the controller sees them.
    pub fn tracker(&self) -> &HeadlessContext {
        &self.tracker
    }

    fn present(&mut self, overlay: &OverlayFrame) {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(err) => {
                log::warn!("Skipping frame: {}", err);
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let draws = &self.draws[..self.draws.len().min(MAX_DRAWS)];
        for (slot, item) in draws.iter().enumerate() {
            self.queue.write_buffer(
                &self.pipelines.uniform_buffer,
                slot as u64 * UNIFORM_STRIDE,
                bytemuck::bytes_of(&item.uniforms),
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            for (slot, item) in draws.iter().enumerate() {
                let Some(gpu) = self.geometries.get(&item.geometry) else {
                    continue;
                };
                let pipeline = if item.transparent {
                    &self.pipelines.transparent
                } else {
                    &self.pipelines.opaque
                };
                pass.set_pipeline(pipeline);
                let offset = (slot as u64 * UNIFORM_STRIDE) as u32;
                pass.set_bind_group(0, &self.pipelines.bind_group, &[offset]);
                pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..item.index_count, 0, 0..1);
            }
        }

        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: overlay.pixels_per_point,
        };
        for (id, delta) in &overlay.textures_delta.set {
            self.overlay
                .update_texture(&self.device, &self.queue, *id, delta);
        }
        let overlay_commands = self.overlay.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &overlay.clipped_primitives,
            &screen,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Overlay Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.overlay
                .render(&mut pass, &overlay.clipped_primitives, &screen);
        }
        for id in &overlay.textures_delta.free {
            self.overlay.free_texture(id);
        }

        self.queue.submit(
            overlay_commands
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
        frame.present();
    }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl GraphicsContext for SurfaceContext {
    fn capabilities(&self) -> Capabilities {
        self.tracker.capabilities()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.tracker.resize(width, height);
        if width == 0 || height == 0 || self.tracker.is_disposed() {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, width, height);
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) {
        if self.tracker.is_disposed() {
            return;
        }
        self.tracker.render(scene, camera);
        for mesh in scene.meshes() {
            if !self.geometries.contains_key(&mesh.geometry.id) {
                let gpu = GpuGeometry::upload(&self.device, &mesh.geometry);
                self.geometries.insert(mesh.geometry.id, gpu);
            }
        }
        self.draws = build_draws(scene, camera);
        if self.draws.len() > MAX_DRAWS {
            log::debug!("Drawing {} of {} meshes", MAX_DRAWS, self.draws.len());
        }
        let [r, g, b] = scene.background;
        self.clear = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };
    }

    fn render_overlay(&mut self, overlay: &OverlayFrame) {
        if self.tracker.is_disposed() {
            return;
        }
        self.tracker.render_overlay(overlay);
        self.present(overlay);
    }

    fn release_geometry(&mut self, id: GeometryId) {
        self.tracker.release_geometry(id);
        self.geometries.remove(&id);
    }

    fn release_material(&mut self, id: MaterialId) {
        self.tracker.release_material(id);
    }

    fn release_texture(&mut self, id: TextureId) {
        self.tracker.release_texture(id);
    }

    fn dispose(&mut self) {
        if self.tracker.is_disposed() {
            return;
        }
        self.tracker.dispose();
        self.geometries.clear();
        self.draws.clear();
        log::info!("Window renderer disposed");
    }

    fn is_disposed(&self) -> bool {
        self.tracker.is_disposed()
    }
}
