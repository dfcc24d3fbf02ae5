//! Error taxonomy for the domain/service layer.

use thiserror::Error;

/// Result alias for core domain operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while evaluating domain rules or invoking an external
/// collaborator trait. Corresponds to the Transient/Validation/Duplicate
/// kinds from the error handling design; `Skip` is modelled separately as
/// [`crate::model::PipelineOutcome`] rather than as an error variant, so it
/// can never be silently swallowed by a `?`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value failed a domain invariant (malformed title, missing mandatory
    /// metadata, unrecognized codec, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An external collaborator (torrent client, tracker, metadata source,
    /// media-info extractor, screenshot generator, image uploader) reported a
    /// transient failure.
    #[error("collaborator {operation} failed")]
    Collaborator {
        /// Operation identifier for diagnostics.
        operation: &'static str,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The target tracker reported the torrent already exists.
    #[error("duplicate post: {0}")]
    Duplicate(String),

    /// A regular expression supplied by configuration failed to compile.
    #[error("invalid pattern {pattern:?}")]
    InvalidPattern {
        /// The offending pattern source text.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}
