//! Application-level error type (§7): aggregates every crate-owned error at
//! the boundary the supervisor and bootstrap operate at.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised while bootstrapping or driving the supervisor loop. Per-item
/// failures during a tick are *not* represented here — they are caught at
/// the item boundary and persisted as the item's `failed`/`skipped` state
/// (§7); this enum is for failures that abort the whole process or a whole
/// tick.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed at boot.
    #[error("configuration operation {operation} failed")]
    Config {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying configuration error.
        #[source]
        source: repost_config::ConfigError,
    },

    /// Telemetry installation failed at boot.
    #[error("telemetry operation {operation} failed")]
    Telemetry {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying telemetry error.
        #[source]
        source: repost_telemetry::TelemetryError,
    },

    /// A store or lock operation failed outside the per-item error boundary
    /// (e.g. during bootstrap, heartbeat, or feed-poll scheduling).
    #[error("data layer operation {operation} failed")]
    Data {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying data-layer error.
        #[source]
        source: repost_data::DataError,
    },

    /// An HTTP request to a collaborator (feed source, torrent fetch, local
    /// client REST API) failed outside the per-item error boundary.
    #[error("http operation {operation} failed")]
    Http {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The local qBittorrent client rejected or failed a request.
    #[error("torrent client operation {operation} failed")]
    TorrentClient {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: anyhow::Error,
    },

    /// An include/exclude pattern failed to compile. Configuration
    /// validation at boot (§7) should make this unreachable in practice;
    /// carried as a recoverable error rather than a panic in case a pattern
    /// set is ever rebuilt at runtime.
    #[error("pattern operation {operation} failed")]
    Pattern {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying pattern compile error.
        #[source]
        source: repost_core::error::CoreError,
    },
}
