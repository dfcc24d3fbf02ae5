//! Download reconciler (C5, §4.4): repairs stale claims, detects torrents
//! removed locally out from under the engine, tracks progress, and hands
//! completed downloads to the publish pipeline.

use chrono::Utc;
use repost_core::Item;
use tracing::{instrument, warn};

use crate::context::{AppContext, TORRENT_CATEGORY};
use crate::error::{AppError, AppResult};
use crate::publish::{self, PublishOutcome};

/// Run one download-reconcile pass.
///
/// # Errors
///
/// Returns [`AppError::Data`] if the item listing itself cannot be read;
/// per-item publish failures are caught and recorded as `failed`/`skipped`
/// without aborting the pass.
#[instrument(skip(ctx), fields(node_id = %ctx.node_id))]
pub async fn reconcile(ctx: &AppContext) -> AppResult<()> {
    let now = Utc::now();
    ctx.store
        .revert_stale_claims(&ctx.node_id, now)
        .await
        .map_err(|source| AppError::Data { operation: "download.revert_stale_claims", source })?;

    let local_torrents = ctx
        .torrent_client
        .list_in_category(TORRENT_CATEGORY)
        .await
        .map_err(|source| AppError::TorrentClient { operation: "download.list_in_category", source })?;

    let owned = ctx
        .store
        .list_items_excluding_status(
            &[
                repost_core::ItemStatus::Pending,
                repost_core::ItemStatus::Done,
                repost_core::ItemStatus::Skipped,
                repost_core::ItemStatus::Failed,
                repost_core::ItemStatus::RemovedByClient,
                repost_core::ItemStatus::RemovedBySite,
                repost_core::ItemStatus::Uploading,
            ],
            10_000,
        )
        .await
        .map_err(|source| AppError::Data { operation: "download.list_downloading", source })?;

    for item in owned {
        if item.picked_node != ctx.node_id {
            continue;
        }
        let Some(source_hash) = item.source_info_hash.as_deref() else {
            continue;
        };
        let Some(local) = local_torrents.iter().find(|t| t.hash == source_hash) else {
            if let Err(err) = ctx.store.mark_removed_by_client(item.id, Utc::now()).await {
                warn!(item_id = %item.id, %err, "failed to mark item removed-by-client");
            }
            continue;
        };

        if local.completed < local.total_size {
            if let Err(err) = write_progress(ctx, &item, local).await {
                warn!(item_id = %item.id, %err, "failed to write download progress");
            }
            continue;
        }

        match publish::publish_item(ctx, &item, local).await {
            PublishOutcome::Completed | PublishOutcome::Deferred => {}
            PublishOutcome::Failed(reason) => {
                warn!(item_id = %item.id, reason = %reason, "publish pipeline failed");
                if let Err(err) = ctx.store.transition_to_failed(item.id, &reason, Utc::now()).await {
                    warn!(item_id = %item.id, %err, "failed to record publish failure");
                }
            }
        }
    }

    Ok(())
}

async fn write_progress(
    ctx: &AppContext,
    item: &Item,
    local: &repost_core::TorrentSummary,
) -> Result<(), String> {
    let progress = if local.total_size > 0 {
        local.completed as f64 / local.total_size as f64
    } else {
        0.0
    };
    ctx.store.write_progress(item.id, progress, Utc::now()).await.map_err(|err| err.to_string())
}
