//! Upload reconciler (C7, §4.7): watches seeding re-posts for de-listing or
//! the seeding termination rule.

use chrono::Utc;
use repost_core::service::TRACKER_REMOVED_MESSAGE;
use tracing::{instrument, warn};

use crate::context::{AppContext, TORRENT_CATEGORY};
use crate::error::{AppError, AppResult};

const MIN_COMPLETED_BYTES: i64 = 4;

/// Run one upload-reconcile pass.
///
/// # Errors
///
/// Returns [`AppError::Data`]/[`AppError::TorrentClient`] if the item or
/// torrent listing itself cannot be read.
#[instrument(skip(ctx), fields(node_id = %ctx.node_id))]
pub async fn reconcile(ctx: &AppContext) -> AppResult<()> {
    let local_torrents = ctx
        .torrent_client
        .list_in_category(TORRENT_CATEGORY)
        .await
        .map_err(|source| AppError::TorrentClient { operation: "upload.list_in_category", source })?;

    let uploading = ctx
        .store
        .list_items_excluding_status(
            &[
                repost_core::ItemStatus::Pending,
                repost_core::ItemStatus::Downloading,
                repost_core::ItemStatus::Done,
                repost_core::ItemStatus::Skipped,
                repost_core::ItemStatus::Failed,
                repost_core::ItemStatus::RemovedByClient,
                repost_core::ItemStatus::RemovedBySite,
            ],
            10_000,
        )
        .await
        .map_err(|source| AppError::Data { operation: "upload.list_uploading", source })?;

    for item in uploading {
        if item.picked_node != ctx.node_id {
            continue;
        }
        let Some(target_hash) = item.target_info_hash.as_deref() else {
            continue;
        };
        let Some(local) = local_torrents.iter().find(|t| t.hash == target_hash) else {
            if let Err(err) = ctx.store.mark_removed_by_client(item.id, Utc::now()).await {
                warn!(item_id = %item.id, %err, "failed to mark uploading item removed-by-client");
            }
            continue;
        };

        match ctx.torrent_client.list_trackers(target_hash).await {
            Ok(trackers) => {
                let delisted = trackers
                    .iter()
                    .any(|tracker| tracker.tier >= 0 && tracker.message == TRACKER_REMOVED_MESSAGE);
                if delisted {
                    if let Err(err) = ctx.store.transition_to_removed_by_site(item.id, Utc::now()).await {
                        warn!(item_id = %item.id, %err, "failed to record removed-by-site");
                    }
                    continue;
                }
            }
            Err(err) => {
                warn!(item_id = %item.id, %err, "failed to list trackers for uploading item");
                continue;
            }
        }

        if local.uploaded > local.total_size && local.completed > MIN_COMPLETED_BYTES {
            if let Err(err) = ctx.store.transition_to_done(item.id, Utc::now()).await {
                warn!(item_id = %item.id, %err, "failed to record done transition");
            }
        }
    }

    Ok(())
}
