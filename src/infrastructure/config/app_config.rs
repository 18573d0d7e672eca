//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::entities::ImageFormat;
use crate::infrastructure::cache::CacheConfig;

pub(crate) const APP_NAME: &str = "imagepress";
pub(crate) const APP_QUALIFIER: &str = "dev";
pub(crate) const APP_ORGANIZATION: &str = "imagepress";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Defaults applied to batches that do not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Encoder quality, 0 to 100.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Output format for conversions.
    #[serde(default)]
    pub format: ImageFormat,

    /// Target upper bound on output size.
    #[serde(default)]
    pub max_bytes: Option<u64>,

    /// Longest edge allowed in the output.
    #[serde(default)]
    pub max_dimension: Option<u32>,
}

const fn default_concurrency() -> usize {
    4
}

const fn default_quality() -> u8 {
    80
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            quality: default_quality(),
            format: ImageFormat::default(),
            max_bytes: None,
            max_dimension: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Analysis cache capacities.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Batch defaults.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl AppConfig {
    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("imagepress.log"))
    }
}
