//! Core domain types: the item state machine, feeds, runs, nodes, and the
//! auxiliary media-info/site-option shapes used by the publish pipeline.

mod patterns;

pub use patterns::{CompiledPatternSet, PatternSet};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one [`Item`] as it moves through §4.1's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    /// Discovered, not yet claimed by a node.
    Pending,
    /// Claimed by a node; the source torrent is being fetched.
    Downloading,
    /// Re-posted to the target tracker; seeding towards the termination rule.
    Uploading,
    /// Seeding termination rule satisfied. Terminal.
    Done,
    /// Force-excluded by configuration or a `Skip` signal. Terminal.
    Skipped,
    /// A pipeline stage raised; operator intervention required. Semi-terminal.
    Failed,
    /// The local torrent client no longer has the torrent. Semi-terminal.
    RemovedByClient,
    /// The target tracker de-listed the re-post. Terminal.
    RemovedBySite,
}

impl ItemStatus {
    /// Terminal states are never revisited by the engine.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::RemovedBySite)
    }

    /// Semi-terminal states stop automatic processing but may be reset to
    /// `pending` by an operator; the engine never retries them on its own.
    #[must_use]
    pub const fn is_semi_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::RemovedByClient)
    }

    /// Non-terminal processing states that count against a node's admission
    /// budget (§4.3, Open Question 3).
    #[must_use]
    pub const fn is_processing(self) -> bool {
        matches!(self, Self::Downloading | Self::Uploading)
    }

    /// Stable lowercase-hyphenated representation, matching the `kebab-case`
    /// serde rename used for the column/JSON representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::RemovedByClient => "removed-by-client",
            Self::RemovedBySite => "removed-by-site",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "uploading" => Ok(Self::Uploading),
            "done" => Ok(Self::Done),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            "removed-by-client" => Ok(Self::RemovedByClient),
            "removed-by-site" => Ok(Self::RemovedBySite),
            other => Err(format!("unknown item status {other:?}")),
        }
    }
}

/// A monitored RSS/Torznab source (§3 Feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// Stable numeric id, assigned from configuration order.
    pub id: i64,
    /// Primary feed URL.
    pub url: String,
    /// Optional exclusion URL; items discovered there are force-`skipped`.
    pub exclude_url: Option<String>,
    /// Target-site tag this feed publishes under.
    pub website: String,
    /// Per-feed include patterns (disjunction of conjunctions).
    pub includes: PatternSet,
    /// Per-feed exclude patterns.
    pub excludes: PatternSet,
    /// Polling interval, in seconds.
    pub interval_secs: i64,
}

/// One release candidate sourced from a feed (§3 Item).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Surrogate primary key.
    pub id: uuid::Uuid,
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
    /// Info-hash of the original torrent, filled in after admission.
    pub source_info_hash: Option<String>,
    /// Info-hash of the sanitized, re-emitted torrent.
    pub target_info_hash: Option<String>,
    /// Node id that currently owns this item, empty when unclaimed.
    pub picked_node: String,
    /// Current lifecycle state.
    pub status: ItemStatus,
    /// Download progress in `[0, 1]`, meaningful only in `downloading`.
    pub progress: f64,
    /// Formatted failure reason, set on transition into `failed`.
    pub failure_reason: Option<String>,
    /// Captured metadata snapshot (`meta_info` in §4.5 step 4).
    pub meta_info: Option<serde_json::Value>,
    /// Hardcoded Chinese-subtitle flag detected from generated screenshots.
    pub hardcode_subtitle: bool,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Row last-mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// `true` once the item has left every non-terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Terminal status of one feed-poll attempt (§3 Run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The run has been claimed but has not finished.
    Running,
    /// The feed was fetched and parsed without error.
    Success,
    /// The run raised; `failure_reason` carries the formatted exception.
    Failed,
}

impl RunStatus {
    /// Stable lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single feed-poll attempt, append-only (§3 Run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Surrogate primary key.
    pub id: i64,
    /// Feed this run belongs to.
    pub feed_id: i64,
    /// Node that claimed the run.
    pub node_id: String,
    /// When the run was claimed.
    pub started_at: DateTime<Utc>,
    /// Terminal status.
    pub status: RunStatus,
    /// Formatted failure, present only when `status` is `failed`.
    pub failure_reason: Option<String>,
}

/// Node liveness record (§3 Node).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable node identifier (configuration `node-id`).
    pub id: String,
    /// Last heartbeat timestamp.
    pub last_seen: DateTime<Utc>,
}

impl Node {
    /// A node is live if `last_seen` is within `stale_after` of `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_seen) <= stale_after
    }
}

/// One video track parsed out of a media-info JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTrack {
    /// Pixel width, used to select the standard/resolution selector.
    pub width: u32,
    /// Video codec name (e.g. `HEVC`, `AVC`).
    pub format: String,
    /// Free-form HDR format string, if present.
    pub hdr_format_string: Option<String>,
    /// HDR format identifier, if present.
    pub hdr_format: Option<String>,
    /// HDR format compatibility string, if present.
    pub hdr_format_compatibility: Option<String>,
}

/// One audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Audio codec name (e.g. `DTS-HD`, `AAC`).
    pub format: String,
}

/// One embedded subtitle/text track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTrack {
    /// ISO-ish language code as reported by the extractor.
    pub language: String,
    /// Free-form language string (e.g. `Chinese (Simplified)`).
    pub language_string: String,
    /// Track title, as authored by the muxer.
    pub title: String,
}

/// The `media` object of a media-info JSON document. Absent (`null`) when
/// the extractor could not identify any tracks — §8 S6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfoMedia {
    /// Video tracks, ordered as reported by the extractor.
    #[serde(default)]
    pub video: Vec<MediaTrack>,
    /// Audio tracks.
    #[serde(default)]
    pub audio: Vec<AudioTrack>,
    /// Embedded subtitle/text tracks.
    #[serde(default)]
    pub text: Vec<TextTrack>,
}

/// Top-level media-info JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfoDoc {
    /// `null` when the extractor produced no usable document (§8 S6).
    pub media: Option<MediaInfoMedia>,
}

/// Cached media-info pair for one source hash (§3 Mediainfo table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Human-readable media-info report, embedded verbatim in the post.
    pub mediainfo_text: String,
    /// Structured document used to derive [`SiteOptions`].
    pub mediainfo_json: MediaInfoDoc,
}

/// Closed set of option keys the `ssd` target-site adapter may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteOptionKey {
    /// Season pack flag.
    Pack,
    /// Posting type selector.
    Type,
    /// Medium (source) selector.
    MediumSel,
    /// Resolution/standard selector.
    StandardSel,
    /// Video codec selector.
    CodecSel,
    /// Audio codec selector.
    AudiocodecSel,
    /// Dolby Vision flag.
    Dovi,
    /// HDR10 flag.
    Hdr10,
    /// HDR10+ flag.
    Hdr10Plus,
    /// HDR Vivid flag.
    HdrVivid,
    /// Hardcoded/embedded Chinese subtitle flag.
    SubtitleZh,
    /// Origin-country source selector (§8 P7).
    SourceSel,
    /// Animation genre flag.
    Animation,
}

/// Sparse map from a closed set of keys to string values, built by the
/// target-site adapter and merged into the final posting payload (§9
/// "Dynamic config shapes").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteOptions(BTreeMap<SiteOptionKey, String>);

impl SiteOptions {
    /// An empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one key.
    pub fn set(&mut self, key: SiteOptionKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    /// Read one key.
    #[must_use]
    pub fn get(&self, key: SiteOptionKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Iterate over the populated keys in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (SiteOptionKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Title classification used by the metadata resolver and the title rewrite
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleType {
    /// A standalone film.
    Movie,
    /// A television episode or season pack.
    Episode,
}

/// Metadata resolved from the external movie/TV database plus the
/// IMDb→Douban cache (§4.5 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    /// Resolved title classification.
    pub title_type: TitleType,
    /// IMDb id, when resolvable.
    pub imdb_id: Option<String>,
    /// Douban id, resolved from the IMDb→Douban cache.
    pub douban_id: Option<String>,
    /// Total episode count, when `title_type` is `episode`.
    pub episode_count: Option<u32>,
    /// TMDB-style genre ids; `16` signals animation (§4.3).
    pub genre_ids: Vec<i64>,
    /// ISO country codes of production origin, used by the region mapping
    /// (§8 P7).
    pub origin_country: Vec<String>,
    /// Alternate titles, deduplicated and joined as the post's sub-title.
    pub names: Vec<String>,
}

/// Tagged outcome of one pipeline stage, replacing exception-based control
/// flow (§9 "Skip-signal tagged result").
#[derive(Debug)]
pub enum PipelineOutcome<T> {
    /// The stage completed normally.
    Ok(T),
    /// A recognized non-error condition short-circuited the pipeline; the
    /// item should transition to `skipped` with this reason.
    Skip(String),
    /// The stage failed; the item should transition to `failed`.
    Fail(crate::error::CoreError),
}

impl<T> PipelineOutcome<T> {
    /// Map the success value, leaving `Skip`/`Fail` untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PipelineOutcome<U> {
        match self {
            Self::Ok(value) => PipelineOutcome::Ok(f(value)),
            Self::Skip(reason) => PipelineOutcome::Skip(reason),
            Self::Fail(err) => PipelineOutcome::Fail(err),
        }
    }
}
