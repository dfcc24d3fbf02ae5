//! Feed poller (C3, §4.2): claims at most one due feed per tick under the
//! `schedule` advisory lock, fetches and parses it, and upserts its items.

use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use repost_core::{CompiledPatternSet, Feed, RunStatus};
use repost_data::lock::LockMode;
use repost_data::store::NewItem;
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{AppError, AppResult};

const SCHEDULE_LOCK_KEY: &str = "schedule";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

static DOUBAN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://movie\.douban\.com/subject/(\d+)/?").expect("static pattern"));

/// Poll at most one due feed (§4.2). Returns `true` if a feed was processed.
///
/// # Errors
///
/// Returns [`AppError::Data`] if the lock or the store cannot be reached.
/// Fetch/parse failures for the claimed feed are caught internally and
/// recorded as a `failed` run rather than propagated.
#[instrument(skip(ctx), fields(node_id = %ctx.node_id))]
pub async fn poll_due_feed(ctx: &AppContext) -> AppResult<bool> {
    let guard = match ctx
        .lock
        .acquire(SCHEDULE_LOCK_KEY, LockMode::Exclusive, Some(Duration::from_secs(10)))
        .await
        .map_err(|source| AppError::Data { operation: "feed.lock_acquire", source })?
    {
        repost_data::lock::LockOutcome::Acquired(guard) => guard,
        repost_data::lock::LockOutcome::TimedOut => {
            info!("schedule lock timed out this tick, deferring feed poll");
            return Ok(false);
        }
    };

    let now = Utc::now();
    let claimed = ctx
        .store
        .claim_due_feed_run(&ctx.node_id, now)
        .await
        .map_err(|source| AppError::Data { operation: "feed.claim_due_feed_run", source })?;

    guard.release().await.map_err(|source| AppError::Data { operation: "feed.lock_release", source })?;

    let Some((feed, run_id)) = claimed else {
        return Ok(false);
    };

    match process_feed(ctx, &feed).await {
        Ok(()) => {
            ctx.store
                .finish_run(run_id, RunStatus::Success, None)
                .await
                .map_err(|source| AppError::Data { operation: "feed.finish_run_success", source })?;
        }
        Err(reason) => {
            warn!(feed_id = feed.id, reason = %reason, "feed poll failed");
            ctx.store
                .finish_run(run_id, RunStatus::Failed, Some(&reason))
                .await
                .map_err(|source| AppError::Data { operation: "feed.finish_run_failed", source })?;
        }
    }

    Ok(true)
}

async fn process_feed(ctx: &AppContext, feed: &Feed) -> Result<(), String> {
    let includes = feed.includes.compile().map_err(|err| err.to_string())?;
    let excludes = feed.excludes.compile().map_err(|err| err.to_string())?;
    let global_includes = ctx.config.includes.compile().map_err(|err| err.to_string())?;
    let global_excludes = ctx.config.excludes.compile().map_err(|err| err.to_string())?;

    let now = Utc::now();
    let main_items = fetch_and_parse(ctx, &feed.url).await.map_err(|err| err.to_string())?;
    for item in main_items {
        if !admit_by_patterns(&item.title, &includes, &excludes, &global_includes, &global_excludes) {
            continue;
        }
        let new_item = to_new_item(item, feed);
        ctx.store
            .insert_pending_item(&new_item, now)
            .await
            .map_err(|err| err.to_string())?;
    }

    if let Some(exclude_url) = &feed.exclude_url {
        let excluded_items = fetch_and_parse(ctx, exclude_url).await.map_err(|err| err.to_string())?;
        for item in excluded_items {
            let new_item = to_new_item(item, feed);
            ctx.store
                .upsert_skipped_item(&new_item, now)
                .await
                .map_err(|err| err.to_string())?;
        }
    }

    Ok(())
}

fn admit_by_patterns(
    title: &str,
    includes: &CompiledPatternSet,
    excludes: &CompiledPatternSet,
    global_includes: &CompiledPatternSet,
    global_excludes: &CompiledPatternSet,
) -> bool {
    if excludes.matches(title) || global_excludes.matches(title) {
        return false;
    }
    let include_ok = (includes.is_empty() || includes.matches(title))
        && (global_includes.is_empty() || global_includes.matches(title));
    include_ok
}

struct ParsedItem {
    guid: String,
    title: String,
    download_link: String,
    size_bytes: i64,
    released_at: DateTime<Utc>,
    imdb_id: Option<String>,
    douban_id: Option<String>,
}

fn to_new_item(item: ParsedItem, feed: &Feed) -> NewItem {
    NewItem {
        source_guid: item.guid,
        website: feed.website.clone(),
        title: item.title,
        download_link: item.download_link,
        released_at: item.released_at,
        size_bytes: item.size_bytes,
        imdb_id: item.imdb_id,
        douban_id: item.douban_id,
    }
}

async fn fetch_and_parse(ctx: &AppContext, url: &str) -> AppResult<Vec<ParsedItem>> {
    let response = ctx
        .http
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|source| AppError::Http { operation: "feed.fetch", source })?;
    let bytes = response.bytes().await.map_err(|source| AppError::Http { operation: "feed.read_body", source })?;
    let channel = rss::Channel::read_from(&bytes[..])
        .map_err(|source| AppError::TorrentClient { operation: "feed.parse", source: source.into() })?;

    Ok(channel.items().iter().filter_map(parse_item).collect())
}

fn parse_item(item: &rss::Item) -> Option<ParsedItem> {
    let title = item.title()?.to_string();
    let guid = item.guid().map(|g| g.value().to_string())?;
    let enclosure = item.enclosure()?;
    let download_link = enclosure.url().to_string();
    let size_bytes = enclosure.length().parse::<i64>().unwrap_or(0);
    let released_at = item
        .pub_date()
        .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let imdb_id = extract_torznab_attr(item, "imdb");
    let douban_id = item
        .description()
        .and_then(|description| DOUBAN_PATTERN.captures(description))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string());

    Some(ParsedItem { guid, title, download_link, size_bytes, released_at, imdb_id, douban_id })
}

fn extract_torznab_attr(item: &rss::Item, name: &str) -> Option<String> {
    item.extensions()
        .get("torznab")
        .and_then(|group| group.get("attr"))
        .and_then(|extensions| {
            extensions.iter().find_map(|extension| {
                let attrs = extension.attrs();
                if attrs.get("name").map(String::as_str) == Some(name) {
                    attrs.get("value").cloned()
                } else {
                    None
                }
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repost_core::PatternSet;

    #[test]
    fn admit_by_patterns_rejects_when_exclude_matches() {
        let includes = PatternSet::new().compile().unwrap();
        let excludes = PatternSet(vec![vec!["XviD".to_string()]]).compile().unwrap();
        let global_includes = PatternSet::new().compile().unwrap();
        let global_excludes = PatternSet::new().compile().unwrap();
        assert!(!admit_by_patterns("Movie.2024.XviD", &includes, &excludes, &global_includes, &global_excludes));
    }

    #[test]
    fn admit_by_patterns_accepts_when_include_set_empty() {
        let empty = PatternSet::new().compile().unwrap();
        assert!(admit_by_patterns("Movie.2024.1080p", &empty, &empty, &empty, &empty));
    }

    #[test]
    fn douban_pattern_extracts_subject_id() {
        let captures = DOUBAN_PATTERN.captures("see https://movie.douban.com/subject/12345678/ for details").unwrap();
        assert_eq!(&captures[1], "12345678");
    }
}
