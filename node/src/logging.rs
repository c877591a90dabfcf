// tessera/node/src/logging.rs

//! Structured logging setup for the node binary.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for log aggregation
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level directive, e.g. "info"
    pub level: String,
    pub format: LogFormat,
    /// Enable ANSI colors (for terminal output)
    pub ansi_colors: bool,
    /// Per-module overrides as (module, level)
    pub module_levels: Vec<(String, String)>,
    pub include_target: bool,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            ansi_colors: true,
            module_levels: Vec::new(),
            include_target: true,
            include_location: false,
        }
    }
}

impl LogConfig {
    fn build_filter(&self) -> String {
        let mut filter = self.level.clone();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level));
        }
        filter
    }
}

/// Initialize the logging system. `RUST_LOG` takes precedence over the
/// configured levels.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => EnvFilter::new(config.build_filter()),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(layer.json().with_ansi(false)).try_init(),
        LogFormat::Pretty => registry
            .with(layer.pretty().with_ansi(config.ansi_colors))
            .try_init(),
        LogFormat::Compact => registry
            .with(layer.compact().with_ansi(config.ansi_colors))
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}
