//! Application configuration.

pub mod app_config;
pub mod storage;

pub use app_config::{AppConfig, BatchConfig, LogLevel};
pub use storage::{ConfigError, ConfigStore};
