//! Background asset loading.
//!
//! Decoding happens on a single worker thread that never touches the scene.
//! Results come back over a channel and are drained by the render loop with
//! [`AssetPipeline::poll`]; splicing into the live graph stays on the main
//! thread.

pub mod gltf;

use glam::{Mat4, Vec3};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to import glTF {path}: {source}")]
    Import {
        path: String,
        #[source]
        source: ::gltf::Error,
    },
    #[error("no geometry found in {path}")]
    NoGeometry { path: String },
    #[error("failed to decode image {path}: {source}")]
    DecodeImage {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("asset worker is gone")]
    WorkerGone,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaMode {
    Opaque,
    Mask(f32),
    Blend,
}

/// Image indices referenced by a material's texture slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapSlots {
    pub base_color: Option<usize>,
    pub normal: Option<usize>,
    pub metallic_roughness: Option<usize>,
    pub occlusion: Option<usize>,
    pub emissive: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub maps: MapSlots,
}

impl LoadedMaterial {
    /// Untextured opaque white, as glTF defines for primitives without one.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [1.0; 4],
            emissive: [0.0; 3],
            metallic: 1.0,
            roughness: 1.0,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            maps: MapSlots::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedMesh {
    pub name: String,
    /// Relative to the asset root.
    pub transform: Mat4,
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub vertex_colors: bool,
    pub material: LoadedMaterial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub name: String,
    pub meshes: Vec<LoadedMesh>,
    pub image_count: usize,
}

/// Linear RGB radiance probe.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub texels: Vec<f32>,
}

impl EnvironmentMap {
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let decoded = image::open(path).map_err(|source| match source {
            image::ImageError::IoError(source) => AssetError::Read {
                path: path.display().to_string(),
                source,
            },
            source => AssetError::DecodeImage {
                path: path.display().to_string(),
                source,
            },
        })?;
        let rgb = decoded.to_rgb32f();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            texels: rgb.into_raw(),
        })
    }
}

#[derive(Debug)]
pub enum AssetEvent {
    Model(Result<LoadedAsset, AssetError>),
    Environment(Result<EnvironmentMap, AssetError>),
}

enum Job {
    Model(PathBuf),
    Environment(PathBuf),
}

pub struct AssetPipeline {
    jobs: Option<Sender<Job>>,
    events: Option<Receiver<AssetEvent>>,
    worker: Option<JoinHandle<()>>,
    pending: usize,
}

impl AssetPipeline {
    pub fn spawn() -> Result<Self, AssetError> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (event_tx, event_rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("deskscene-assets".into())
            .spawn(move || {
                // A failed send means the pipeline was shut down.
                for job in job_rx {
                    let event = match job {
                        Job::Model(path) => AssetEvent::Model(self::gltf::import(&path)),
                        Job::Environment(path) => {
                            AssetEvent::Environment(EnvironmentMap::load(&path))
                        }
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                log::debug!("Asset worker exiting");
            })
            .map_err(|source| AssetError::Read {
                path: "<asset worker>".into(),
                source,
            })?;
        Ok(Self {
            jobs: Some(job_tx),
            events: Some(event_rx),
            worker: Some(worker),
            pending: 0,
        })
    }

    fn submit(&mut self, job: Job) -> Result<(), AssetError> {
        let jobs = self.jobs.as_ref().ok_or(AssetError::WorkerGone)?;
        jobs.send(job).map_err(|_| AssetError::WorkerGone)?;
        self.pending += 1;
        Ok(())
    }

    pub fn load_asset(&mut self, path: impl Into<PathBuf>) -> Result<(), AssetError> {
        let path = path.into();
        log::info!("Loading model {}", path.display());
        self.submit(Job::Model(path))
    }

    pub fn load_environment(&mut self, path: impl Into<PathBuf>) -> Result<(), AssetError> {
        let path = path.into();
        log::info!("Loading environment {}", path.display());
        self.submit(Job::Environment(path))
    }

    /// Drains finished loads without blocking.
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        let Some(receiver) = &self.events else {
            return events;
        };
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    self.pending = self.pending.saturating_sub(1);
                    events.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.pending > 0 {
                        log::warn!("Asset worker stopped with {} load(s) pending", self.pending);
                        self.pending = 0;
                    }
                    break;
                }
            }
        }
        events
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Stops accepting jobs and detaches the worker without waiting for it.
    /// A decode already running finishes in the background; its result, and
    /// every queued job, is discarded.
    pub fn shutdown(&mut self) {
        self.jobs = None;
        self.events = None;
        if self.worker.take().is_some() {
            log::debug!("Asset worker detached");
        }
        self.pending = 0;
    }
}

impl Drop for AssetPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(pipeline: &mut AssetPipeline) -> Vec<AssetEvent> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut events = Vec::new();
        while pipeline.pending() > 0 && Instant::now() < deadline {
            events.extend(pipeline.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        events
    }

    #[test]
    fn failed_loads_are_reported_not_fatal() {
        let mut pipeline = AssetPipeline::spawn().unwrap();
        pipeline.load_asset("/nonexistent/desk.glb").unwrap();
        pipeline.load_environment("/nonexistent/lounge.hdr").unwrap();
        assert_eq!(pipeline.pending(), 2);

        let events = wait_for(&mut pipeline);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AssetEvent::Model(Err(AssetError::Import { .. }))));
        assert!(matches!(events[1], AssetEvent::Environment(Err(_))));
        assert_eq!(pipeline.pending(), 0);
    }

    #[test]
    fn environment_decodes_to_linear_rgb() {
        let path = std::env::temp_dir().join(format!("deskscene_env_{}.png", std::process::id()));
        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();
        let env = EnvironmentMap::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((env.width, env.height), (4, 2));
        assert_eq!(env.texels.len(), 4 * 2 * 3);
        assert_eq!(&env.texels[..3], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn shutdown_discards_loads_in_flight() {
        let mut pipeline = AssetPipeline::spawn().unwrap();
        pipeline.load_asset("/nonexistent/desk.glb").unwrap();
        pipeline.load_environment("/nonexistent/lounge.hdr").unwrap();
        pipeline.shutdown();
        assert_eq!(pipeline.pending(), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert!(pipeline.poll().is_empty());
    }

    #[test]
    fn jobs_after_shutdown_fail() {
        let mut pipeline = AssetPipeline::spawn().unwrap();
        pipeline.shutdown();
        assert!(matches!(
            pipeline.load_asset("desk.glb"),
            Err(AssetError::WorkerGone)
        ));
        assert!(pipeline.poll().is_empty());
    }
}
