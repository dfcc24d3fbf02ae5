//! Publish pipeline (C6, §4.5): the nine-step sequence that turns a
//! completed local download into a re-post on the target tracker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use repost_core::{
    AddTorrentRequest, CoreError, CoreResult, CreatePostRequest, ImageFormat, Item, MediaInfo,
    ResolvedMetadata, TitleGuess, TitleType, TorrentSummary,
};

use crate::context::{AppContext, TORRENT_CATEGORY, TORRENT_TAG};

const TARGET_SCREENSHOT_COUNT: usize = 4;
const UPLOAD_ATTEMPTS: usize = 5;
const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "ts"];

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(?P<season>\d+)E(?P<episode>\d+)\b").expect("static pattern"));

/// Result of one publish attempt, distinguishing a failure from a benign
/// defer (§4.5 step 1: "abort, logged, not a failure transition").
pub enum PublishOutcome {
    /// The item transitioned to `uploading`.
    Completed,
    /// Nothing to do yet this pass; retry on the next reconcile.
    Deferred,
    /// A stage raised; the caller should transition the item to `failed`.
    Failed(String),
}

/// Run the publish pipeline for one completed download.
pub async fn publish_item(ctx: &AppContext, item: &Item, local: &TorrentSummary) -> PublishOutcome {
    match run(ctx, item, local).await {
        Ok(Some(())) => PublishOutcome::Completed,
        Ok(None) => PublishOutcome::Deferred,
        Err(err) => PublishOutcome::Failed(err.to_string()),
    }
}

async fn run(ctx: &AppContext, item: &Item, local: &TorrentSummary) -> anyhow::Result<Option<()>> {
    let source_hash = item
        .source_info_hash
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("item has no source info hash"))?;

    // Step 1: pick the primary video file.
    let files = ctx.torrent_client.list_files(source_hash).await?;
    let mut video_files: Vec<_> = files
        .into_iter()
        .filter(|file| has_video_extension(&file.name))
        .collect();
    video_files.sort_by(|a, b| b.size.cmp(&a.size));
    let Some(primary) = video_files.first() else {
        tracing::warn!(item_id = %item.id, "no video file found in torrent, deferring");
        return Ok(None);
    };
    let video_path = Path::new(&local.save_path).join(&primary.name);
    if !video_path.exists() {
        tracing::warn!(item_id = %item.id, path = %video_path.display(), "primary video missing on disk, deferring");
        return Ok(None);
    }
    let file_names: Vec<String> = video_files.iter().map(|file| file.name.clone()).collect();

    // Step 2: cached media-info, else extract and cache.
    let media_info = match ctx.store.get_mediainfo(source_hash).await? {
        Some(info) => info,
        None => {
            let (text, doc) = ctx.media_info_extractor.extract(&video_path).await?;
            let info = MediaInfo { mediainfo_text: text, mediainfo_json: doc };
            ctx.store.insert_mediainfo(source_hash, &info).await?;
            info
        }
    };

    // Validate before any screenshot/image work begins (§8 S6): a null media
    // document must abort the pipeline before a single `image` row is
    // written, so a failed item never leaves partial rows behind.
    let media = media_info
        .mediainfo_json
        .media
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("media-info has no usable tracks"))?;

    // Step 3: screenshots, subtitle detection, upload.
    let existing_images = ctx.store.list_image_urls(source_hash).await?;
    let hardcode_subtitle = if existing_images.len() < TARGET_SCREENSHOT_COUNT {
        regenerate_screenshots(ctx, item, source_hash, &video_path).await?
    } else {
        item.hardcode_subtitle
    };
    let images = ctx.store.list_image_urls(source_hash).await?;

    // Step 4: metadata resolution.
    let guess = guess_title(&item.title);
    let mut resolved = ctx.metadata_source.resolve(&guess).await?;
    resolve_douban(ctx, &mut resolved).await?;
    let meta_info_json = serde_json::to_value(&resolved)?;
    ctx.store.set_meta_info(item.id, &meta_info_json, Utc::now()).await?;

    // Step 5: re-serialize and re-hash the torrent.
    let original_bytes = ctx.torrent_client.export_torrent(source_hash).await?;
    let sanitized = repost_bencode::sanitize(&original_bytes)?;

    // Step 6: target-site option dictionary.
    let kind = repost_core::site::guess_kind(guess.season, guess.episode);
    let options = repost_core::site::build_site_options(
        &item.title,
        kind,
        guess.season,
        guess.episode,
        media,
        &resolved.genre_ids,
        &resolved.origin_country,
        hardcode_subtitle,
    )?;

    // Step 7: TV title rewrite.
    let release_name = if resolved.title_type == TitleType::Episode
        && resolved.episode_count.is_some_and(|count| (file_names.len() as u32) < count)
    {
        repost_core::title::rewrite_tv_title(&item.title, &file_names)
    } else {
        item.title.clone()
    };

    // Step 8: submit to the target tracker, re-add locally.
    let stamped = ctx
        .tracker
        .create_post(CreatePostRequest {
            sanitized_torrent: sanitized,
            release_name,
            mediainfo_text: media_info.mediainfo_text.clone(),
            images,
            options,
            meta_info: resolved,
        })
        .await?;
    ctx.torrent_client
        .add_torrent(AddTorrentRequest {
            bytes: stamped.clone(),
            save_path: Some(local.save_path.clone()),
            skip_checking: true,
            category: TORRENT_CATEGORY.to_string(),
            tags: vec![TORRENT_TAG.to_string()],
            auto_management: false,
        })
        .await?;

    // Step 9: atomic transition.
    let target_hash = repost_bencode::info_hash_v1(&stamped)?;
    ctx.store.transition_to_uploading(item.id, &target_hash, Utc::now()).await?;

    Ok(Some(()))
}

fn has_video_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

async fn regenerate_screenshots(
    ctx: &AppContext,
    item: &Item,
    source_hash: &str,
    video_path: &Path,
) -> anyhow::Result<bool> {
    ctx.store.delete_images(source_hash).await?;
    let format = if repost_core::title::is_web_dl(&item.title) { ImageFormat::Jpg } else { ImageFormat::Png };
    let out_dir = std::env::temp_dir().join(format!("repost-screens-{source_hash}"));
    let screenshots = ctx
        .screenshot_generator
        .generate(video_path, TARGET_SCREENSHOT_COUNT, &out_dir, format)
        .await?;
    let hardcode_subtitle = ctx.subtitle_detector.detect(&screenshots).await?;
    ctx.store.set_hardcode_subtitle(item.id, hardcode_subtitle, Utc::now()).await?;

    let mut tasks = tokio::task::JoinSet::new();
    for screenshot in screenshots {
        let uploader = Arc::clone(&ctx.image_uploader);
        tasks.spawn(async move { upload_with_retries(uploader, screenshot).await });
    }
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(url)) => {
                if let Err(err) = ctx.store.insert_image(source_hash, &url, Utc::now()).await {
                    tracing::warn!(item_id = %item.id, %err, "failed to record uploaded screenshot");
                }
            }
            Ok(Err(err)) => tracing::warn!(item_id = %item.id, %err, "screenshot upload exhausted retries"),
            Err(err) => tracing::warn!(item_id = %item.id, %err, "screenshot upload task panicked"),
        }
    }

    Ok(hardcode_subtitle)
}

async fn upload_with_retries(uploader: Arc<dyn repost_core::ImageUploader>, path: PathBuf) -> CoreResult<String> {
    let mut last_err = None;
    for _ in 0..UPLOAD_ATTEMPTS {
        match uploader.upload(&path).await {
            Ok(url) => return Ok(url),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| CoreError::Validation("screenshot upload never attempted".to_string())))
}

async fn resolve_douban(ctx: &AppContext, resolved: &mut ResolvedMetadata) -> anyhow::Result<()> {
    if resolved.douban_id.is_some() {
        return Ok(());
    }
    let Some(imdb_id) = resolved.imdb_id.clone() else {
        return Ok(());
    };
    if let Some(cached) = ctx.store.get_douban_id(&imdb_id).await? {
        resolved.douban_id = Some(cached);
        return Ok(());
    }
    let douban_id = ctx.douban_resolver.resolve(&imdb_id).await?;
    ctx.store.cache_imdb_douban(&imdb_id, douban_id.as_deref()).await?;
    resolved.douban_id = douban_id;
    Ok(())
}

fn guess_title(title: &str) -> TitleGuess {
    if let Some(captures) = SEASON_EPISODE.captures(title) {
        let season = captures.name("season").and_then(|m| m.as_str().parse().ok());
        let episode = captures.name("episode").and_then(|m| m.as_str().parse().ok());
        TitleGuess { title: title.to_string(), season, episode }
    } else {
        TitleGuess { title: title.to_string(), season: None, episode: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_video_extension_is_case_insensitive() {
        assert!(has_video_extension("Movie.MKV"));
        assert!(has_video_extension("movie.mp4"));
        assert!(!has_video_extension("movie.srt"));
    }

    #[test]
    fn guess_title_extracts_season_and_episode() {
        let guess = guess_title("Name.S02E05.1080p.WEB-DL");
        assert_eq!(guess.season, Some(2));
        assert_eq!(guess.episode, Some(5));
    }

    #[test]
    fn guess_title_movie_has_no_season_or_episode() {
        let guess = guess_title("Name.2024.1080p.WEB-DL");
        assert_eq!(guess.season, None);
        assert_eq!(guess.episode, None);
    }
}
