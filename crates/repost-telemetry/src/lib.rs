#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! `tracing`-based structured logging init shared by every repost binary
//! (§6 CLI `--log-format`/`--log-level`, A2). Every component tick and
//! pipeline stage is expected to wrap its body in `#[tracing::instrument]`;
//! this crate only owns subscriber installation.

mod error;

pub use error::{TelemetryError, TelemetryResult};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default logging level when neither `--log-level` nor `RSSREPOST_LOG` is
/// set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable consulted ahead of `RUST_LOG`, per §6.
pub const LOG_ENV_VAR: &str = "RSSREPOST_LOG";

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, pretty-printed logs (the default outside release
    /// builds).
    Pretty,
    /// Newline-delimited JSON objects, suited to log aggregation.
    Json,
}

impl LogFormat {
    /// Parse a `--log-format` CLI value.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidLevel`] for any value other than
    /// `pretty` or `json`.
    pub fn parse(value: &str) -> TelemetryResult<Self> {
        match value {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::InvalidLevel(other.to_string())),
        }
    }

    /// Choose a sensible default for the current build profile.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) { Self::Pretty } else { Self::Json }
    }
}

/// Logging configuration passed to [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string (e.g. `info`, `repost_app=debug,info`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), format: LogFormat::infer() }
    }
}

impl LoggingConfig {
    /// Build a config from explicit CLI flags, falling back to
    /// [`LOG_ENV_VAR`] then `RUST_LOG` then [`DEFAULT_LOG_LEVEL`] for the
    /// level, and [`LogFormat::infer`] when no format flag was given.
    #[must_use]
    pub fn resolve(log_level: Option<String>, log_format: Option<LogFormat>) -> Self {
        let level = log_level
            .or_else(|| std::env::var(LOG_ENV_VAR).ok())
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let format = log_format.unwrap_or_else(LogFormat::infer);
        Self { level, format }
    }
}

/// Install the global `tracing` subscriber for this process.
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInitialized`] if a global subscriber was
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> TelemetryResult<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(false).with_thread_ids(false))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false).with_thread_ids(false)).try_init(),
    };
    result.map_err(|err| TelemetryError::AlreadyInitialized(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!(LogFormat::parse("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::parse("xml").is_err());
    }

    #[test]
    fn resolve_prefers_explicit_flags_over_environment() {
        let config = LoggingConfig::resolve(Some("debug".to_string()), Some(LogFormat::Json));
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn resolve_defaults_format_when_unset() {
        let config = LoggingConfig::resolve(Some("warn".to_string()), None);
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, LogFormat::infer());
    }
}
