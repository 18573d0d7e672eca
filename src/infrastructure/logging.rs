//! Tracing subscriber setup.

use std::io;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use super::config::AppConfig;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. With a `log_path`
/// events are appended to that file without colors, otherwise they go to
/// stderr. Calling this again after a subscriber is installed is a no-op.
///
/// # Errors
///
/// Returns an error if the log file or its directory cannot be created.
pub fn init_logging(config: &AppConfig) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        if tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .try_init()
            .is_ok()
        {
            info!(path = %log_path.display(), "Logging initialized");
        }
    } else {
        let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(true);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init();
    }

    Ok(())
}
