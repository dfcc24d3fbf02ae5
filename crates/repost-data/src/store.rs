//! The shared store: one Postgres-backed façade over feeds, runs, items,
//! nodes, and the media-info/image/imdb caches. Const SQL strings, a thin
//! `FromRow` row struct per table translated into the matching
//! `repost_core::model` type, and a pool-holding struct that runs
//! `sqlx::migrate!` at construction time.

use chrono::{DateTime, Utc};
use repost_core::{Feed, Item, ItemStatus, MediaInfo, Node, PatternSet, RunStatus};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{DataError, DataResult};

/// A new item discovered by the feed poller, prior to admission (§4.2 step 6).
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Source GUID, unique together with `website`.
    pub source_guid: String,
    /// Target-site tag (matches the owning feed's `website`).
    pub website: String,
    /// Release title as published by the feed.
    pub title: String,
    /// Direct download link for the original torrent.
    pub download_link: String,
    /// Release timestamp reported by the feed (or discovery time if absent).
    pub released_at: DateTime<Utc>,
    /// Size in bytes, as reported by the feed enclosure.
    pub size_bytes: i64,
    /// IMDb id extracted from feed metadata, if present.
    pub imdb_id: Option<String>,
    /// Douban id extracted from the feed description, if present.
    pub douban_id: Option<String>,
}

struct FeedRow {
    id: i64,
    url: String,
    exclude_url: Option<String>,
    website: String,
    includes: sqlx::types::Json<Vec<Vec<String>>>,
    excludes: sqlx::types::Json<Vec<Vec<String>>>,
    interval_secs: i64,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            exclude_url: row.exclude_url,
            website: row.website,
            includes: PatternSet(row.includes.0),
            excludes: PatternSet(row.excludes.0),
            interval_secs: row.interval_secs,
        }
    }
}

struct ItemRow {
    id: Uuid,
    source_guid: String,
    website: String,
    title: String,
    download_link: String,
    released_at: DateTime<Utc>,
    size_bytes: i64,
    imdb_id: Option<String>,
    douban_id: Option<String>,
    source_info_hash: Option<String>,
    target_info_hash: Option<String>,
    picked_node: String,
    status: String,
    progress: f64,
    failure_reason: Option<String>,
    meta_info: Option<serde_json::Value>,
    hardcode_subtitle: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = DataError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ItemStatus>()
            .map_err(DataError::InvalidStatus)?;
        Ok(Self {
            id: row.id,
            source_guid: row.source_guid,
            website: row.website,
            title: row.title,
            download_link: row.download_link,
            released_at: row.released_at,
            size_bytes: row.size_bytes,
            imdb_id: row.imdb_id,
            douban_id: row.douban_id,
            source_info_hash: row.source_info_hash,
            target_info_hash: row.target_info_hash,
            picked_node: row.picked_node,
            status,
            progress: row.progress,
            failure_reason: row.failure_reason,
            meta_info: row.meta_info,
            hardcode_subtitle: row.hardcode_subtitle,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ITEM_COLUMNS: &str = "id, source_guid, website, title, download_link, released_at, \
    size_bytes, imdb_id, douban_id, source_info_hash, target_info_hash, picked_node, status, \
    progress, failure_reason, meta_info, hardcode_subtitle, created_at, updated_at";

/// Façade over the shared Postgres store. Cheap to clone (wraps a pool).
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect to `database_url`, running pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] if the pool cannot be established or
    /// [`DataError::Migration`] if a migration fails.
    pub async fn connect(database_url: &str) -> DataResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|source| DataError::Query { operation: "connect", source })?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DataError::Migration)?;
        Ok(Self { pool })
    }

    /// Wrap an already-constructed pool (migrations assumed already applied,
    /// used by tests that share one disposable instance across cases).
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers (e.g. [`crate::lock::Lock`]) that
    /// need direct access.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Replace the configured feed set with `feeds`, upserting by id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn sync_feeds(&self, feeds: &[Feed]) -> DataResult<()> {
        for feed in feeds {
            sqlx::query(
                "INSERT INTO rss (id, url, exclude_url, website, includes, excludes, interval_secs) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET \
                    url = EXCLUDED.url, exclude_url = EXCLUDED.exclude_url, \
                    website = EXCLUDED.website, includes = EXCLUDED.includes, \
                    excludes = EXCLUDED.excludes, interval_secs = EXCLUDED.interval_secs",
            )
            .bind(feed.id)
            .bind(&feed.url)
            .bind(&feed.exclude_url)
            .bind(&feed.website)
            .bind(sqlx::types::Json(&feed.includes.0))
            .bind(sqlx::types::Json(&feed.excludes.0))
            .bind(feed.interval_secs)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "sync_feeds", source })?;
        }
        Ok(())
    }

    /// List every configured feed, ordered by id (§4.2 step 2 iterates in
    /// this order).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn list_feeds(&self) -> DataResult<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRowRaw>(
            "SELECT id, url, exclude_url, website, includes, excludes, interval_secs \
             FROM rss ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "list_feeds", source })?;
        Ok(rows.into_iter().map(FeedRowRaw::into_feed).collect())
    }

    /// Record (or refresh) this node's heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn upsert_node_heartbeat(&self, node_id: &str, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO node (id, last_seen) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET last_seen = EXCLUDED.last_seen",
        )
        .bind(node_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "upsert_node_heartbeat", source })?;
        Ok(())
    }

    /// List every known node.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn list_nodes(&self) -> DataResult<Vec<Node>> {
        let rows = sqlx::query("SELECT id, last_seen FROM node ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "list_nodes", source })?;
        Ok(rows
            .into_iter()
            .map(|row| Node {
                id: row.get("id"),
                last_seen: row.get("last_seen"),
            })
            .collect())
    }

    /// §4.2 step 2: within a caller-managed serializable transaction, claim
    /// the first feed whose most recent run is older than its interval by
    /// inserting a `running` run row. Returns `None` if every feed was
    /// polled within its interval.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn claim_due_feed_run(
        &self,
        node_id: &str,
        now: DateTime<Utc>,
    ) -> DataResult<Option<(Feed, i64)>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| DataError::Query { operation: "claim_due_feed_run begin", source })?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|source| DataError::Query { operation: "claim_due_feed_run isolation", source })?;

        let feeds = sqlx::query_as::<_, FeedRowRaw>(
            "SELECT id, url, exclude_url, website, includes, excludes, interval_secs \
             FROM rss ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|source| DataError::Query { operation: "claim_due_feed_run list", source })?;

        for row in feeds {
            let due: Option<bool> = sqlx::query_scalar(
                "SELECT NOT EXISTS ( \
                    SELECT 1 FROM rss_run \
                    WHERE feed_id = $1 AND started_at >= $2 - ($3 * INTERVAL '1 second') \
                 )",
            )
            .bind(row.id)
            .bind(now)
            .bind(row.interval_secs as f64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|source| DataError::Query { operation: "claim_due_feed_run probe", source })?;

            if due.unwrap_or(false) {
                let run_id: i64 = sqlx::query_scalar(
                    "INSERT INTO rss_run (feed_id, node_id, started_at, status) \
                     VALUES ($1, $2, $3, 'running') RETURNING id",
                )
                .bind(row.id)
                .bind(node_id)
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .map_err(|source| DataError::Query { operation: "claim_due_feed_run insert", source })?;

                let feed = row.into_feed();
                tx.commit()
                    .await
                    .map_err(|source| DataError::Query { operation: "claim_due_feed_run commit", source })?;
                return Ok(Some((feed, run_id)));
            }
        }

        tx.commit()
            .await
            .map_err(|source| DataError::Query { operation: "claim_due_feed_run commit empty", source })?;
        Ok(None)
    }

    /// §4.2 step 7: mark a claimed run terminal.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        failure_reason: Option<&str>,
    ) -> DataResult<()> {
        sqlx::query("UPDATE rss_run SET status = $2, failure_reason = $3 WHERE id = $1")
            .bind(run_id)
            .bind(status.as_str())
            .bind(failure_reason)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "finish_run", source })?;
        Ok(())
    }

    /// §4.2 step 6, main-URL branch: insert as `pending`, doing nothing on a
    /// `(website, source_guid)` conflict.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn insert_pending_item(&self, item: &NewItem, now: DateTime<Utc>) -> DataResult<()> {
        self.insert_item(item, ItemStatus::Pending, now, true).await
    }

    /// §4.2 step 6, exclusion-URL branch: upsert as `skipped`, overwriting an
    /// existing `pending` row.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn upsert_skipped_item(&self, item: &NewItem, now: DateTime<Utc>) -> DataResult<()> {
        self.insert_item(item, ItemStatus::Skipped, now, false).await
    }

    async fn insert_item(
        &self,
        item: &NewItem,
        status: ItemStatus,
        now: DateTime<Utc>,
        do_nothing_on_conflict: bool,
    ) -> DataResult<()> {
        let id = Uuid::new_v4();
        let conflict_clause = if do_nothing_on_conflict {
            "ON CONFLICT (website, source_guid) DO NOTHING"
        } else {
            "ON CONFLICT (website, source_guid) DO UPDATE SET status = EXCLUDED.status, \
             updated_at = EXCLUDED.updated_at"
        };
        let sql = format!(
            "INSERT INTO rss_item (id, source_guid, website, title, download_link, released_at, \
             size_bytes, imdb_id, douban_id, picked_node, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '', $10, $11, $11) {conflict_clause}"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(&item.source_guid)
            .bind(&item.website)
            .bind(&item.title)
            .bind(&item.download_link)
            .bind(item.released_at)
            .bind(item.size_bytes)
            .bind(&item.imdb_id)
            .bind(&item.douban_id)
            .bind(status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "insert_item", source })?;
        Ok(())
    }

    /// §4.3: claim admissible pending items for `node_id` within one
    /// serializable transaction. `max_single_torrent_size` and `rest`
    /// filtering happen here; per-feed/global include-exclude re-filtering
    /// is the caller's responsibility before calling this (the caller
    /// already has compiled pattern sets; the store only enforces size and
    /// recency).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn claim_admissible_items(
        &self,
        node_id: &str,
        now: DateTime<Utc>,
        max_processing_per_node: i64,
        max_processing_size: i64,
        max_single_torrent_size: i64,
        recent_release_seconds: i64,
        mut accept: impl FnMut(&Item) -> bool,
    ) -> DataResult<Vec<Item>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| DataError::Query { operation: "claim_admissible_items begin", source })?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|source| DataError::Query { operation: "claim_admissible_items isolation", source })?;

        let owned_sql = format!(
            "SELECT {ITEM_COLUMNS} FROM rss_item \
             WHERE picked_node = $1 AND status IN ('downloading', 'uploading')"
        );
        let owned_rows = sqlx::query_as::<_, ItemRowRaw>(&owned_sql)
            .bind(node_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|source| DataError::Query { operation: "claim_admissible_items owned", source })?;

        let current_count = i64::try_from(owned_rows.len()).unwrap_or(i64::MAX);
        if current_count >= max_processing_per_node {
            tx.commit()
                .await
                .map_err(|source| DataError::Query { operation: "claim_admissible_items commit full", source })?;
            return Ok(Vec::new());
        }

        let current_total_size: i64 = owned_rows.iter().map(|row| row.size_bytes).sum();
        let mut rest = max_processing_size - current_total_size;
        let released_after = now - chrono::Duration::seconds(recent_release_seconds);

        let candidates_sql = format!(
            "SELECT {ITEM_COLUMNS} FROM rss_item \
             WHERE status = 'pending' AND size_bytes <= $1 AND released_at >= $2 \
             ORDER BY released_at DESC"
        );
        let candidate_rows = sqlx::query_as::<_, ItemRowRaw>(&candidates_sql)
            .bind(rest)
            .bind(released_after)
            .fetch_all(&mut *tx)
            .await
            .map_err(|source| DataError::Query { operation: "claim_admissible_items candidates", source })?;

        let mut claimed = Vec::new();
        let mut claimed_count = current_count;
        for row in candidate_rows {
            if claimed_count >= max_processing_per_node {
                break;
            }
            let item: Item = row.try_into_item()?;
            if item.size_bytes > max_single_torrent_size || item.size_bytes > rest {
                continue;
            }
            if !accept(&item) {
                continue;
            }

            sqlx::query(
                "UPDATE rss_item SET status = 'downloading', picked_node = $2, updated_at = $3 \
                 WHERE id = $1",
            )
            .bind(item.id)
            .bind(node_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|source| DataError::Query { operation: "claim_admissible_items claim", source })?;

            rest -= item.size_bytes;
            claimed_count += 1;
            claimed.push(Item {
                status: ItemStatus::Downloading,
                picked_node: node_id.to_string(),
                updated_at: now,
                ..item
            });
        }

        tx.commit()
            .await
            .map_err(|source| DataError::Query { operation: "claim_admissible_items commit", source })?;
        Ok(claimed)
    }

    /// §4.4: revert items claimed by this node that never reached a
    /// recorded source-info-hash back to `pending` (crash between claim and
    /// torrent-add).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn revert_stale_claims(&self, node_id: &str, now: DateTime<Utc>) -> DataResult<u64> {
        let result = sqlx::query(
            "UPDATE rss_item SET status = 'pending', picked_node = '', updated_at = $2 \
             WHERE status = 'downloading' AND picked_node = $1 \
             AND (source_info_hash IS NULL OR source_info_hash = '')",
        )
        .bind(node_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "revert_stale_claims", source })?;
        Ok(result.rows_affected())
    }

    /// Persist the source torrent's info-hash onto a claimed item.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn set_source_info_hash(&self, item_id: Uuid, hash: &str, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query("UPDATE rss_item SET source_info_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(item_id)
            .bind(hash)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "set_source_info_hash", source })?;
        Ok(())
    }

    /// §4.4/§4.7: local torrent client no longer reports a `downloading` or
    /// `uploading` item.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn mark_removed_by_client(&self, item_id: Uuid, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query(
            "UPDATE rss_item SET status = 'removed-by-client', updated_at = $2 \
             WHERE id = $1 AND status IN ('downloading', 'uploading')",
        )
        .bind(item_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "mark_removed_by_client", source })?;
        Ok(())
    }

    /// §4.1: write download progress; write failures must be swallowed by
    /// the caller, never state-affecting.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn write_progress(&self, item_id: Uuid, progress: f64, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query("UPDATE rss_item SET progress = $2, updated_at = $3 WHERE id = $1")
            .bind(item_id)
            .bind(progress)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "write_progress", source })?;
        Ok(())
    }

    /// Transition to `failed`, recording the formatted cause.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn transition_to_failed(&self, item_id: Uuid, reason: &str, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query(
            "UPDATE rss_item SET status = 'failed', failure_reason = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(item_id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "transition_to_failed", source })?;
        Ok(())
    }

    /// Transition to `skipped`, recording the signal's reason.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn transition_to_skipped(&self, item_id: Uuid, reason: &str, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query(
            "UPDATE rss_item SET status = 'skipped', failure_reason = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(item_id)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "transition_to_skipped", source })?;
        Ok(())
    }

    /// §4.5 step 9: the atomic transition out of the publish pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn transition_to_uploading(
        &self,
        item_id: Uuid,
        target_info_hash: &str,
        now: DateTime<Utc>,
    ) -> DataResult<()> {
        sqlx::query(
            "UPDATE rss_item SET status = 'uploading', target_info_hash = $2, progress = 0, \
             updated_at = $3 WHERE id = $1",
        )
        .bind(item_id)
        .bind(target_info_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "transition_to_uploading", source })?;
        Ok(())
    }

    /// §4.1: seeding termination rule satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn transition_to_done(&self, item_id: Uuid, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query("UPDATE rss_item SET status = 'done', updated_at = $2 WHERE id = $1")
            .bind(item_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "transition_to_done", source })?;
        Ok(())
    }

    /// §4.7: the target tracker de-listed the re-post.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn transition_to_removed_by_site(&self, item_id: Uuid, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query(
            "UPDATE rss_item SET status = 'removed-by-site', updated_at = $2 WHERE id = $1",
        )
        .bind(item_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "transition_to_removed_by_site", source })?;
        Ok(())
    }

    /// §4.5 step 4: persist the resolved metadata snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn set_meta_info(&self, item_id: Uuid, meta_info: &serde_json::Value, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query("UPDATE rss_item SET meta_info = $2, updated_at = $3 WHERE id = $1")
            .bind(item_id)
            .bind(meta_info)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "set_meta_info", source })?;
        Ok(())
    }

    /// §4.5 step 7: set the hardcoded Chinese-subtitle flag detected while
    /// generating screenshots.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn set_hardcode_subtitle(&self, item_id: Uuid, hardcode_subtitle: bool, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query("UPDATE rss_item SET hardcode_subtitle = $2, updated_at = $3 WHERE id = $1")
            .bind(item_id)
            .bind(hardcode_subtitle)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "set_hardcode_subtitle", source })?;
        Ok(())
    }

    /// §4.5 step 2: fetch a cached media-info document for `source_info_hash`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn get_mediainfo(&self, source_info_hash: &str) -> DataResult<Option<MediaInfo>> {
        let row = sqlx::query(
            "SELECT mediainfo_text, mediainfo_json FROM mediainfo WHERE source_info_hash = $1",
        )
        .bind(source_info_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "get_mediainfo", source })?;
        row.map(|row| {
            let mediainfo_text: String = row.get("mediainfo_text");
            let mediainfo_json: serde_json::Value = row.get("mediainfo_json");
            let mediainfo_json = serde_json::from_value(mediainfo_json)
                .map_err(|_| DataError::MalformedJson("mediainfo.mediainfo_json"))?;
            Ok(MediaInfo { mediainfo_text, mediainfo_json })
        })
        .transpose()
    }

    /// §4.5 step 2: insert a freshly extracted media-info document,
    /// conflict-free (the first writer wins).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn insert_mediainfo(&self, source_info_hash: &str, info: &MediaInfo) -> DataResult<()> {
        let mediainfo_json = serde_json::to_value(&info.mediainfo_json)
            .map_err(|_| DataError::MalformedJson("mediainfo.mediainfo_json"))?;
        sqlx::query(
            "INSERT INTO mediainfo (source_info_hash, mediainfo_text, mediainfo_json) \
             VALUES ($1, $2, $3) ON CONFLICT (source_info_hash) DO NOTHING",
        )
        .bind(source_info_hash)
        .bind(&info.mediainfo_text)
        .bind(mediainfo_json)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "insert_mediainfo", source })?;
        Ok(())
    }

    /// §4.5 step 3: existing screenshot URLs for a source hash.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn list_image_urls(&self, source_info_hash: &str) -> DataResult<Vec<String>> {
        let rows = sqlx::query("SELECT url FROM image WHERE source_info_hash = $1 ORDER BY id")
            .bind(source_info_hash)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "list_image_urls", source })?;
        Ok(rows.into_iter().map(|row| row.get("url")).collect())
    }

    /// §4.5 step 3: drop existing screenshot rows before regenerating.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn delete_images(&self, source_info_hash: &str) -> DataResult<()> {
        sqlx::query("DELETE FROM image WHERE source_info_hash = $1")
            .bind(source_info_hash)
            .execute(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "delete_images", source })?;
        Ok(())
    }

    /// §4.5 step 3: record one successfully uploaded screenshot.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn insert_image(&self, source_info_hash: &str, url: &str, now: DateTime<Utc>) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO image (source_info_hash, url, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (source_info_hash, url) DO NOTHING",
        )
        .bind(source_info_hash)
        .bind(url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "insert_image", source })?;
        Ok(())
    }

    /// §4.5 step 4: look up a cached Douban id for an IMDb id.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn get_douban_id(&self, imdb_id: &str) -> DataResult<Option<String>> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT douban_id FROM imdb WHERE imdb_id = $1",
        )
        .bind(imdb_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "get_douban_id", source })?;
        Ok(row.flatten())
    }

    /// §4.5 step 4: cache a resolved IMDb→Douban mapping.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn cache_imdb_douban(&self, imdb_id: &str, douban_id: Option<&str>) -> DataResult<()> {
        sqlx::query(
            "INSERT INTO imdb (imdb_id, douban_id) VALUES ($1, $2) \
             ON CONFLICT (imdb_id) DO UPDATE SET douban_id = EXCLUDED.douban_id",
        )
        .bind(imdb_id)
        .bind(douban_id)
        .execute(&self.pool)
        .await
        .map_err(|source| DataError::Query { operation: "cache_imdb_douban", source })?;
        Ok(())
    }

    /// Dashboard query (grounded on `server.py`'s item listing): items not in
    /// any of `excluded_statuses`, newest-updated first.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn list_items_excluding_status(
        &self,
        excluded_statuses: &[ItemStatus],
        limit: i64,
    ) -> DataResult<Vec<Item>> {
        let excluded: Vec<&'static str> = excluded_statuses.iter().map(|s| s.as_str()).collect();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM rss_item WHERE NOT (status = ANY($1)) \
             ORDER BY updated_at DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ItemRowRaw>(&sql)
            .bind(&excluded)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "list_items_excluding_status", source })?;
        rows.into_iter().map(ItemRowRaw::try_into_item).collect()
    }

    /// Dashboard query: one item by its feed-scoped identity.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Query`] on failure.
    pub async fn get_item_by_website_guid(&self, website: &str, source_guid: &str) -> DataResult<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM rss_item WHERE website = $1 AND source_guid = $2");
        let row = sqlx::query_as::<_, ItemRowRaw>(&sql)
            .bind(website)
            .bind(source_guid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| DataError::Query { operation: "get_item_by_website_guid", source })?;
        row.map(ItemRowRaw::try_into_item).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct FeedRowRaw {
    id: i64,
    url: String,
    exclude_url: Option<String>,
    website: String,
    includes: sqlx::types::Json<Vec<Vec<String>>>,
    excludes: sqlx::types::Json<Vec<Vec<String>>>,
    interval_secs: i64,
}

impl FeedRowRaw {
    fn into_feed(self) -> Feed {
        FeedRow {
            id: self.id,
            url: self.url,
            exclude_url: self.exclude_url,
            website: self.website,
            includes: self.includes,
            excludes: self.excludes,
            interval_secs: self.interval_secs,
        }
        .into()
    }
}

#[derive(sqlx::FromRow)]
struct ItemRowRaw {
    id: Uuid,
    source_guid: String,
    website: String,
    title: String,
    download_link: String,
    released_at: DateTime<Utc>,
    size_bytes: i64,
    imdb_id: Option<String>,
    douban_id: Option<String>,
    source_info_hash: Option<String>,
    target_info_hash: Option<String>,
    picked_node: String,
    status: String,
    progress: f64,
    failure_reason: Option<String>,
    meta_info: Option<serde_json::Value>,
    hardcode_subtitle: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRowRaw {
    fn try_into_item(self) -> DataResult<Item> {
        ItemRow {
            id: self.id,
            source_guid: self.source_guid,
            website: self.website,
            title: self.title,
            download_link: self.download_link,
            released_at: self.released_at,
            size_bytes: self.size_bytes,
            imdb_id: self.imdb_id,
            douban_id: self.douban_id,
            source_info_hash: self.source_info_hash,
            target_info_hash: self.target_info_hash,
            picked_node: self.picked_node,
            status: self.status,
            progress: self.progress,
            failure_reason: self.failure_reason,
            meta_info: self.meta_info,
            hardcode_subtitle: self.hardcode_subtitle,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .try_into()
    }
}
