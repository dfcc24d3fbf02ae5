//! Error types for configuration loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the engine's configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path:?}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The file extension is not one of `toml`, `yaml`/`yml`, or `json`.
    #[error("unrecognized configuration file extension: {0:?}")]
    UnknownExtension(PathBuf),

    /// The file parsed as the wrong format, carried an unknown field, or was
    /// otherwise structurally invalid.
    #[error("failed to parse configuration ({format}): {detail}")]
    Parse {
        /// Format dispatched on (`toml`, `yaml`, `json`).
        format: &'static str,
        /// Formatted parser diagnostic.
        detail: String,
    },

    /// A field failed a semantic validation rule not expressible as a serde
    /// type constraint (e.g. a budget of zero, an empty feed list).
    #[error("invalid configuration field {field}: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configured regex pattern failed to compile.
    #[error("invalid pattern in {field}: {pattern:?}")]
    InvalidPattern {
        /// Field the pattern was configured under.
        field: &'static str,
        /// Offending pattern source text.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The machine-derived node id could not be resolved or persisted.
    #[error("failed to resolve a stable node id")]
    NodeId {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
