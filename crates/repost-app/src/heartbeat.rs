//! Heartbeat (C8, §5): records this node's liveness once per tick, ahead of
//! every other stage.

use chrono::Utc;
use tracing::instrument;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};

/// Record a heartbeat for this node.
///
/// # Errors
///
/// Returns [`AppError::Data`] if the store cannot be reached.
#[instrument(skip(ctx), fields(node_id = %ctx.node_id))]
pub async fn beat(ctx: &AppContext) -> AppResult<()> {
    ctx.store
        .upsert_node_heartbeat(&ctx.node_id, Utc::now())
        .await
        .map_err(|source| AppError::Data { operation: "heartbeat.upsert", source })
}
