//! Error type for telemetry initialization.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Errors raised while installing the global tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed (e.g. by a test harness or
    /// a prior call in the same process).
    #[error("failed to install tracing subscriber: {0}")]
    AlreadyInitialized(String),

    /// The configured log-level filter string was not a valid `EnvFilter`
    /// directive.
    #[error("invalid log level filter {0:?}")]
    InvalidLevel(String),
}
