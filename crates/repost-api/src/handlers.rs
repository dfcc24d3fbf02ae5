//! Dashboard request handlers (A4): item listing and single-item detail.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use repost_api_models::{ItemDetail, ItemSummary};
use repost_core::ItemStatus;

use crate::errors::ApiError;
use crate::state::ApiState;

/// Non-skipped items ship to render [`Self::DEFAULT_LIMIT`] rows, newest
/// mutation first; the dashboard is a liveness view, not an archive browser.
const DEFAULT_LIMIT: i64 = 200;

/// `GET /`: every item not in the `skipped` terminal state, `updated_at desc`.
pub(crate) async fn list_items(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<ItemSummary>>, ApiError> {
    let items = state.store.list_items_excluding_status(&[ItemStatus::Skipped], DEFAULT_LIMIT).await?;
    Ok(Json(items.iter().map(ItemSummary::from).collect()))
}

/// `GET /{website}/{guid}`: full detail for one item.
pub(crate) async fn get_item(
    State(state): State<Arc<ApiState>>,
    Path((website, guid)): Path<(String, String)>,
) -> Result<Json<ItemDetail>, ApiError> {
    let item = state
        .store
        .get_item_by_website_guid(&website, &guid)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no item {website}/{guid}")))?;
    Ok(Json(ItemDetail::from(&item)))
}

#[cfg(test)]
mod tests {
    use super::DEFAULT_LIMIT;

    #[test]
    fn default_limit_is_a_sane_page_size() {
        assert!(DEFAULT_LIMIT > 0);
    }
}
