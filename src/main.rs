//! deskscene viewer.
//!
//! Usage: `deskscene [config.json]`. Without a config file the built-in
//! defaults are used.

use std::path::PathBuf;
use std::process::ExitCode;

use deskscene::SceneConfig;

fn main() -> ExitCode {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => match SceneConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load config {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => SceneConfig::default(),
    };

    match deskscene::app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
