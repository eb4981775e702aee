//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Pipeline code only emits events: `info` per stage, `debug` per column
//! decision. Applications embedding the library call [`init_logging`] once to
//! print them.
//!
//! ```ignore
//! use tabprep::utils::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_verbosity(1))?;
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field output with colors
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// JSON lines for machine parsing
    Json,
}

/// Configuration for the global subscriber
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Fallback level when `RUST_LOG` is unset
    pub level: Level,
    pub format: LogFormat,
    pub with_timestamps: bool,
    /// Include the module path of each event
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            with_timestamps: false,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// 0 = info, 1 = debug, 2 or more = trace
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = build_env_filter(config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match (config.format, config.with_timestamps) {
        (LogFormat::Json, _) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(config.with_target),
            )
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.with_ansi)
                    .with_target(config.with_target),
            )
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(
                fmt::layer()
                    .compact()
                    .without_time()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.with_ansi)
                    .with_target(config.with_target),
            )
            .try_init(),
        (LogFormat::Pretty, true) => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.with_ansi)
                    .with_target(config.with_target),
            )
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(
                fmt::layer()
                    .without_time()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.with_ansi)
                    .with_target(config.with_target),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

/// `RUST_LOG` wins; otherwise this crate logs at `level` and others at warn
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,tabprep={}",
            level.as_str().to_lowercase()
        ))
    })
}
