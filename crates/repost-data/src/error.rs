//! Error types for the shared store and distributed lock.

use thiserror::Error;

/// Result alias for data layer operations.
pub type DataResult<T> = Result<T, DataError>;

/// Errors raised by the store and the distributed lock built on top of it.
#[derive(Debug, Error)]
pub enum DataError {
    /// Schema migration failed at boot.
    #[error("database migration failed")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// A store operation failed.
    #[error("store operation {operation} failed")]
    Query {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying SQL error.
        #[source]
        source: sqlx::Error,
    },

    /// A distributed lock operation failed for a reason other than a
    /// timeout (timeouts are reported as [`crate::lock::LockOutcome::TimedOut`]
    /// rather than an error).
    #[error("lock operation {operation} failed")]
    Lock {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying SQL error.
        #[source]
        source: sqlx::Error,
    },

    /// A persisted `rss_item.status` value did not match a known
    /// [`repost_core::ItemStatus`] variant.
    #[error("persisted item status {0:?} is not a recognized state")]
    InvalidStatus(String),

    /// A persisted `jsonb` column did not deserialize into the expected
    /// domain shape.
    #[error("persisted column {0} holds malformed json")]
    MalformedJson(&'static str),
}
