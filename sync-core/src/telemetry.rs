//! Logging setup shared by the binaries
//!
//! Console output is pretty or JSON; an optional log file is written through a
//! non-blocking appender whose guard the caller must keep alive.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Crates whose events the configured level applies to
const CRATES: [&str; 5] = ["sync_core", "sync", "csv_sync", "csv_sync_server", "tower_http"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON lines on the console instead of the pretty format
    #[serde(default)]
    pub json: bool,
    /// Also write JSON lines to this file
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// never, daily or hourly
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
            log_file: None,
            rotation: default_rotation(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_rotation() -> String { "never".to_string() }

fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Filter directives for the configured level, e.g. `sync_core=info,sync=info`
pub fn filter_directives(log_level: &str) -> String {
    let level = parse_level(log_level);
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &TelemetryConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.log_level)));

    let console_layer = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = match &config.log_file {
        Some(log_path) => {
            let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = log_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("csv-sync.log"));

            let appender = match config.rotation.as_str() {
                "daily" => rolling::daily(dir, file_name),
                "hourly" => rolling::hourly(dir, file_name),
                _ => rolling::never(dir, file_name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
