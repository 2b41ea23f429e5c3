//! Configuration module
//!
//! Application settings persisted as TOML in the platform config directory.

mod settings;

pub use settings::{
    AppConfig, ReceiverSettings, ReconnectSettings, ServiceSettings, TransportSettings,
};

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No platform config directory could be determined.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be rendered as TOML.
    #[error("Render error: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("io", "navbridge", "navbridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}
