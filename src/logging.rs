//! Tracing subscriber setup

use anyhow::{anyhow, Result};
use mirrorpub_core::config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level, the command line level over the configured one.
pub fn init(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = match level_override {
        Some(level) => level
            .parse::<Level>()
            .map_err(|_| anyhow!("Invalid log level: {}", level))?,
        None => config.parse_level()?,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
