pub mod analyze;
pub mod init;
pub mod run;

pub use analyze::analyze_command;
pub use init::init_command;
pub use run::{RunOptions, run_command};

use anyhow::{Context, Result};
use easytest_core::Settings;
use std::path::Path;
use tracing::debug;

/// Load `.easytest.json` from `explicit`, or the nearest one above the current directory
pub(crate) fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let (mut settings, path) = match explicit {
        Some(path) => {
            let settings = Settings::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            (settings, Some(path.to_path_buf()))
        }
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            Settings::discover(&cwd).context("Failed to load configuration")?
        }
    };

    match path {
        Some(path) => {
            debug!("Using configuration {}", path.display());
            settings.anchor_paths(&path);
        }
        None => debug!("No configuration file found, using defaults"),
    }

    Ok(settings)
}
