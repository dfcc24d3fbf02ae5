//! Shared handler state.

use repost_data::Store;

/// State threaded through every dashboard handler via axum's `State`
/// extractor.
pub(crate) struct ApiState {
    pub(crate) store: Store,
}

impl ApiState {
    pub(crate) const fn new(store: Store) -> Self {
        Self { store }
    }
}
