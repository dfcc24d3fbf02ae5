#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Shared HTTP DTOs for the read-only dashboard (A4, §6 "CLI"): a thin,
//! serializable projection of [`repost_core::Item`], decoupled from the
//! store's row shape so the wire format can evolve independently.

use chrono::{DateTime, Utc};
use repost_core::{Item, ItemStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One item as rendered on the dashboard's item list (`GET /`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSummary {
    /// Surrogate primary key.
    pub id: Uuid,
    /// Target-site tag.
    pub website: String,
    /// Source GUID, unique together with `website`.
    pub source_guid: String,
    /// Release title as published by the feed.
    pub title: String,
    /// Current lifecycle state.
    pub status: ItemStatus,
    /// Download progress in `[0, 1]`, meaningful only in `downloading`.
    pub progress: f64,
    /// Node id that currently owns this item, empty when unclaimed.
    pub picked_node: String,
    /// Row last-mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            website: item.website.clone(),
            source_guid: item.source_guid.clone(),
            title: item.title.clone(),
            status: item.status,
            progress: item.progress,
            picked_node: item.picked_node.clone(),
            updated_at: item.updated_at,
        }
    }
}

/// Full single-item projection (`GET /{website}/{guid}`): every field a
/// dashboard detail view needs, omitting only the store's internal row
/// bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDetail {
    /// Surrogate primary key.
    pub id: Uuid,
    /// Target-site tag.
    pub website: String,
    /// Source GUID, unique together with `website`.
    pub source_guid: String,
    /// Release title as published by the feed.
    pub title: String,
    /// Direct download link for the original torrent.
    pub download_link: String,
    /// Release timestamp reported by the feed.
    pub released_at: DateTime<Utc>,
    /// Size in bytes, as reported by the feed enclosure.
    pub size_bytes: i64,
    /// IMDb id, if resolved.
    pub imdb_id: Option<String>,
    /// Douban id, if resolved.
    pub douban_id: Option<String>,
    /// Info-hash of the original torrent, once fetched.
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
    /// Captured metadata snapshot, if resolved.
    pub meta_info: Option<serde_json::Value>,
    /// Hardcoded Chinese-subtitle flag detected from generated screenshots.
    pub hardcode_subtitle: bool,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Row last-mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&Item> for ItemDetail {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            website: item.website.clone(),
            source_guid: item.source_guid.clone(),
            title: item.title.clone(),
            download_link: item.download_link.clone(),
            released_at: item.released_at,
            size_bytes: item.size_bytes,
            imdb_id: item.imdb_id.clone(),
            douban_id: item.douban_id.clone(),
            source_info_hash: item.source_info_hash.clone(),
            target_info_hash: item.target_info_hash.clone(),
            picked_node: item.picked_node.clone(),
            status: item.status,
            progress: item.progress,
            failure_reason: item.failure_reason.clone(),
            meta_info: item.meta_info.clone(),
            hardcode_subtitle: item.hardcode_subtitle,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// RFC9457-style problem document surfaced on a dashboard error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    /// Detailed diagnostic message, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        Item {
            id: Uuid::new_v4(),
            source_guid: "guid-1".to_string(),
            website: "ssd".to_string(),
            title: "Name.S01E01.1080p.WEB-DL".to_string(),
            download_link: "https://example.invalid/t.torrent".to_string(),
            released_at: Utc::now(),
            size_bytes: 1_000,
            imdb_id: None,
            douban_id: None,
            source_info_hash: None,
            target_info_hash: None,
            picked_node: String::new(),
            status: ItemStatus::Pending,
            progress: 0.0,
            failure_reason: None,
            meta_info: None,
            hardcode_subtitle: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_projects_the_list_view_fields() {
        let item = sample_item();
        let summary = ItemSummary::from(&item);
        assert_eq!(summary.id, item.id);
        assert_eq!(summary.title, item.title);
    }

    #[test]
    fn detail_projects_every_field() {
        let item = sample_item();
        let detail = ItemDetail::from(&item);
        assert_eq!(detail.download_link, item.download_link);
        assert_eq!(detail.size_bytes, item.size_bytes);
    }
}
