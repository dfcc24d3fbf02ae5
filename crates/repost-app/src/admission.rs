//! Admission controller (C4, §4.3): claims budget-admissible pending items
//! and drives each through torrent add, looping to fixpoint.

use std::time::Duration;

use chrono::Utc;
use repost_core::{AddTorrentRequest, CompiledPatternSet, Item};
use tracing::{instrument, warn};

use crate::context::{AppContext, TORRENT_CATEGORY, TORRENT_TAG};
use crate::error::{AppError, AppResult};

const ANIMATION_GENRE_ID: i64 = 16;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Admit and start every item the current budget allows, repeating until a
/// pass claims nothing new (§4.3: completions free budget for the next
/// pass within the same tick).
///
/// # Errors
///
/// Returns [`AppError::Data`] if the claim transaction itself cannot be
/// reached; per-item admission failures are caught and recorded as `failed`
/// or `skipped` without aborting the loop.
#[instrument(skip(ctx), fields(node_id = %ctx.node_id))]
pub async fn admit_to_fixpoint(ctx: &AppContext) -> AppResult<u64> {
    let includes = ctx
        .config
        .includes
        .compile()
        .map_err(|source| AppError::Pattern { operation: "admission.compile_includes", source })?;
    let excludes = ctx
        .config
        .excludes
        .compile()
        .map_err(|source| AppError::Pattern { operation: "admission.compile_excludes", source })?;

    let mut total = 0u64;
    loop {
        let claimed = claim_one_pass(ctx, &includes, &excludes).await?;
        if claimed.is_empty() {
            break;
        }
        total += claimed.len() as u64;
        for item in claimed {
            if let Err(reason) = start_download(ctx, &item).await {
                warn!(item_id = %item.id, reason = %reason, "admission failed for claimed item");
            }
        }
    }
    Ok(total)
}

async fn claim_one_pass(
    ctx: &AppContext,
    includes: &CompiledPatternSet,
    excludes: &CompiledPatternSet,
) -> AppResult<Vec<Item>> {
    let now = Utc::now();
    let accept = |item: &Item| -> bool {
        if excludes.matches(&item.title) {
            return false;
        }
        includes.is_empty() || includes.matches(&item.title)
    };
    ctx.store
        .claim_admissible_items(
            &ctx.node_id,
            now,
            i64::from(ctx.config.max_processing_per_node),
            ctx.config.max_processing_size.as_u64() as i64,
            ctx.config.max_single_torrent_size.as_u64() as i64,
            ctx.config.recent_release_window.0,
            accept,
        )
        .await
        .map_err(|source| AppError::Data { operation: "admission.claim_admissible_items", source })
}

/// §4.3: fetch the source torrent, hash it, and add it to the local client.
/// Returns the formatted reason on any failure, after already recording the
/// item's terminal `failed`/`skipped` state in the store.
async fn start_download(ctx: &AppContext, item: &Item) -> Result<(), String> {
    let now = Utc::now();

    if is_animation(item) {
        ctx.store
            .transition_to_skipped(item.id, "animation genre excluded by admission policy", now)
            .await
            .map_err(|err| err.to_string())?;
        return Ok(());
    }

    match fetch_and_add(ctx, item).await {
        Ok(()) => Ok(()),
        Err(reason) => {
            ctx.store
                .transition_to_failed(item.id, &reason, now)
                .await
                .map_err(|err| err.to_string())?;
            Err(reason)
        }
    }
}

fn is_animation(item: &Item) -> bool {
    item.meta_info
        .as_ref()
        .and_then(|meta| meta.get("genre_ids"))
        .and_then(|genres| genres.as_array())
        .is_some_and(|genres| genres.iter().any(|id| id.as_i64() == Some(ANIMATION_GENRE_ID)))
}

async fn fetch_and_add(ctx: &AppContext, item: &Item) -> Result<(), String> {
    let response = ctx
        .http
        .get(&item.download_link)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|err| err.to_string())?
        .error_for_status()
        .map_err(|err| err.to_string())?;
    let bytes = response.bytes().await.map_err(|err| err.to_string())?.to_vec();

    let info_hash = repost_bencode::info_hash_v1(&bytes).map_err(|err| err.to_string())?;
    let now = Utc::now();
    ctx.store
        .set_source_info_hash(item.id, &info_hash, now)
        .await
        .map_err(|err| err.to_string())?;

    ctx.torrent_client
        .add_torrent(AddTorrentRequest {
            bytes,
            save_path: None,
            category: TORRENT_CATEGORY.to_string(),
            tags: vec![TORRENT_TAG.to_string()],
            skip_checking: false,
            auto_management: true,
        })
        .await
        .map_err(|err| err.to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item(meta_info: Option<serde_json::Value>) -> Item {
        Item {
            id: uuid::Uuid::new_v4(),
            source_guid: "guid".to_string(),
            website: "site".to_string(),
            title: "Movie.2024.1080p".to_string(),
            download_link: "https://example.invalid/t.torrent".to_string(),
            released_at: Utc::now(),
            size_bytes: 100,
            imdb_id: None,
            douban_id: None,
            source_info_hash: None,
            target_info_hash: None,
            picked_node: "node-a".to_string(),
            status: repost_core::ItemStatus::Downloading,
            progress: 0.0,
            failure_reason: None,
            meta_info,
            hardcode_subtitle: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn is_animation_detects_genre_sixteen() {
        let item = sample_item(Some(json!({ "genre_ids": [16, 18] })));
        assert!(is_animation(&item));
    }

    #[test]
    fn is_animation_false_without_matching_genre() {
        let item = sample_item(Some(json!({ "genre_ids": [18] })));
        assert!(!is_animation(&item));
        assert!(!is_animation(&sample_item(None)));
    }
}
