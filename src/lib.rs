//! Interactive desk scene: a glTF desk with named sub-meshes, a day/night
//! lighting rig, hover and click interaction, and a camera that zooms onto
//! the laptop screen.

pub mod anim;
pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod controller;
pub mod interaction;
pub mod lighting;
pub mod materials;
pub mod render;
pub mod scene;
pub mod ui;

pub use config::SceneConfig;
pub use controller::SceneController;
