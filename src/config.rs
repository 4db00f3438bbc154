//! Scene configuration.
//!
//! Every tunable the controller reads lives here so a deployment can swap the
//! asset, rename materials, or retune the lighting presets without a rebuild.
//! All sections are `#[serde(default)]`, so a config file only needs to name
//! the fields it overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub assets: AssetPaths,
    pub camera: CameraConfig,
    pub orbit: OrbitConfig,
    pub placement: PlacementConfig,
    pub naming: NamingConfig,
    pub interaction: InteractionConfig,
    pub zoom: ZoomConfig,
    pub lighting: LightingConfig,
    /// Attach a debug helper to every generated lamp spotlight.
    pub debug_helpers: bool,
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: SceneConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    pub model: PathBuf,
    pub environment: PathBuf,
    pub screen_photo: PathBuf,
    pub screen_video: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from("assets/pc3d_2.glb"),
            environment: PathBuf::from("assets/wooden_lounge_4k.hdr"),
            screen_photo: PathBuf::from("assets/texture.jpg"),
            screen_video: PathBuf::from("assets/video.mp4"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 1.5, 4.3],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub max_polar_angle: f32,
    /// Wheel zoom starts disabled; the host toggles it.
    pub zoom_enabled: bool,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 0.6,
            pan_speed: 0.6,
            zoom_speed: 0.8,
            min_distance: 2.0,
            max_distance: 10.0,
            max_polar_angle: std::f32::consts::PI * 0.9,
            zoom_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub position: [f32; 3],
    pub scale: f32,
    /// Play the intro assembly animation once the model is spliced in.
    pub assembly: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            position: [0.2, -1.5, -3.0],
            scale: 0.8,
            assembly: true,
        }
    }
}

/// Material names the asset uses to tag special sub-meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub screen_large: String,
    pub screen_small: String,
    pub button: String,
    pub lamp: String,
    pub smoke: String,
    pub cup: String,
    pub coffee: String,
    pub table: String,
    pub mouse: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            screen_large: "schermoGrande".to_string(),
            screen_small: "schermoPiccolo".to_string(),
            button: "tastoMice".to_string(),
            lamp: "lampadina".to_string(),
            smoke: "fumo".to_string(),
            cup: "tazza".to_string(),
            coffee: "caffe".to_string(),
            table: "tavolo".to_string(),
            mouse: "mouse".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub move_throttle_ms: u64,
    /// Delay between the model splice and the first accepted pointer event.
    pub pointer_enable_delay_ms: u64,
    pub screen_hover_scale: [f32; 3],
    pub button_hover_scale: [f32; 3],
    pub affordance_offset: [f32; 2],
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            move_throttle_ms: 16,
            pointer_enable_delay_ms: 500,
            screen_hover_scale: [1.01, 1.01, 1.01],
            button_hover_scale: [1.05, 1.55, 1.05],
            affordance_offset: [10.0, -20.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub offset: [f32; 3],
    pub zoom_in_secs: f32,
    pub zoom_out_secs: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            offset: [-0.35, 0.0, 2.0],
            zoom_in_secs: 1.5,
            zoom_out_secs: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub day_background: u32,
    pub night_background: u32,
    pub fog_color: u32,
    pub day_exposure: f32,
    pub night_exposure: f32,
    pub ambient: f32,
    pub hemisphere: f32,
    pub fill: f32,
    pub rect_area: f32,
    pub main: f32,
    pub screen_glow: f32,
    pub button_glow: f32,
    pub button_pulse_peak: f32,
    pub lamp_night: f32,
    pub environment_intensity: f32,
    pub night_environment_intensity: f32,
    pub screen_day_emissive: f32,
    pub screen_night_emissive: f32,
    pub lamp_night_emissive: f32,
    pub glow_night_opacity: f32,
    pub transition_secs: f32,
    pub lamp_transition_secs: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            day_background: 0x113250,
            night_background: 0x020408,
            fog_color: 0x0b0b0b,
            day_exposure: 0.8,
            night_exposure: 0.5,
            ambient: 0.25,
            hemisphere: 0.5,
            fill: 0.6,
            rect_area: 0.5,
            main: 1.0,
            screen_glow: 0.03,
            button_glow: 0.8,
            button_pulse_peak: 1.5,
            lamp_night: 40.0,
            environment_intensity: 0.5,
            night_environment_intensity: 0.1,
            screen_day_emissive: 2.0,
            screen_night_emissive: 5.0,
            lamp_night_emissive: 2.5,
            glow_night_opacity: 0.9,
            transition_secs: 0.6,
            lamp_transition_secs: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let json = r#"{ "naming": { "lamp": "bulb" }, "zoom": { "zoom_in_secs": 2.0 } }"#;
        let config: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.naming.lamp, "bulb");
        assert_eq!(config.naming.button, "tastoMice");
        assert_eq!(config.zoom.zoom_in_secs, 2.0);
        assert_eq!(config.zoom.zoom_out_secs, 1.2);
        assert_eq!(config.interaction.move_throttle_ms, 16);
    }

    #[test]
    fn save_then_load_via_file() {
        let mut config = SceneConfig::default();
        config.lighting.lamp_night = 12.0;
        config.debug_helpers = true;

        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!("deskscene_config_{}_{}.json", std::process::id(), nonce));

        config.save(&path).unwrap();
        let loaded = SceneConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SceneConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
