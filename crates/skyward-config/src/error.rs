use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: skyward.local.yaml, .skyward.local.yaml, skyward.yaml, .skyward.yaml\n\
        - ./.skyward/ directory\n\
        - ~/.config/skyward/config.yaml\n\
        or point SKYWARD_CONFIG_PATH at a file directly"
    )]
    SettingsFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
