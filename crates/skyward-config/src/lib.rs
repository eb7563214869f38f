//! Settings discovery for Skyward
//!
//! The settings file is optional. When none is found the reconcile crate
//! runs on its built-in wait policies and tag policy.

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{Settings, TagSettings, WaitSettings};

use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a settings file
pub const CONFIG_PATH_ENV: &str = "SKYWARD_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "skyward.local.yaml",
    ".skyward.local.yaml",
    "skyward.yaml",
    ".skyward.yaml",
];

/// Path of the global settings file (`~/.config/skyward/config.yaml`)
pub fn global_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(config_dir.join("skyward").join("config.yaml"))
}

/// Locate the settings file
///
/// Search order:
/// 1. `SKYWARD_CONFIG_PATH` (direct path)
/// 2. current directory: skyward.local.yaml, .skyward.local.yaml, skyward.yaml, .skyward.yaml
/// 3. `./.skyward/` with the same candidates
/// 4. `~/.config/skyward/config.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points at {}, which does not exist",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    if let Some(path) = find_in_dir(&current_dir) {
        return Ok(path);
    }

    let local_dir = current_dir.join(".skyward");
    if local_dir.is_dir() {
        if let Some(path) = find_in_dir(&local_dir) {
            return Ok(path);
        }
    }

    if let Ok(global) = global_settings_path() {
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Parse and validate a settings file
pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let settings: Settings = if content.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };

    settings.validate()?;
    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings from the discovered file, or defaults when there is none
pub fn load_settings() -> Result<Settings> {
    match find_settings_file() {
        Ok(path) => load_settings_from(path),
        Err(ConfigError::SettingsFileNotFound) => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
        Err(e) => Err(e),
    }
}
