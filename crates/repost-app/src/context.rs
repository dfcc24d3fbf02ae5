//! Application context: the shared dependencies every supervisor stage
//! (C3-C9) is handed.

use std::sync::Arc;

use repost_core::{DoubanResolver, ImageUploader, MediaInfoExtractor, MetadataSource, ScreenshotGenerator, SubtitleDetector, TorrentClient, Tracker};
use repost_data::{Lock, Store};

use repost_config::AppConfig;

/// Category tag applied to every torrent this engine manages in the local
/// client (§4.2, §4.3, §4.7).
pub const TORRENT_CATEGORY: &str = "pt-repost";

/// Tag applied alongside [`TORRENT_CATEGORY`] on re-imported torrents.
pub const TORRENT_TAG: &str = "pt-repost";

/// Bundles every dependency a supervisor tick needs. Cheap to clone: every
/// field is already reference-counted or a pool handle.
#[derive(Clone)]
pub struct AppContext {
    /// This node's resolved identifier.
    pub node_id: String,
    /// Loaded, validated configuration.
    pub config: Arc<AppConfig>,
    /// Shared Postgres-backed store.
    pub store: Store,
    /// Distributed lock client, sharing the store's pool.
    pub lock: Lock,
    /// Local torrent client binding.
    pub torrent_client: Arc<dyn TorrentClient>,
    /// Target-tracker posting client.
    pub tracker: Arc<dyn Tracker>,
    /// Movie/TV metadata resolver.
    pub metadata_source: Arc<dyn MetadataSource>,
    /// IMDb-to-Douban id resolver.
    pub douban_resolver: Arc<dyn DoubanResolver>,
    /// Media-info extractor.
    pub media_info_extractor: Arc<dyn MediaInfoExtractor>,
    /// Screenshot generator.
    pub screenshot_generator: Arc<dyn ScreenshotGenerator>,
    /// Hardcode-subtitle detector.
    pub subtitle_detector: Arc<dyn SubtitleDetector>,
    /// Image-host uploader.
    pub image_uploader: Arc<dyn ImageUploader>,
    /// Shared `reqwest` client for feed/torrent fetches (proxy-configured).
    pub http: reqwest::Client,
}

#[allow(clippy::too_many_arguments)]
impl AppContext {
    /// Assemble a context from its already-constructed parts.
    #[must_use]
    pub fn new(
        node_id: String,
        config: Arc<AppConfig>,
        store: Store,
        lock: Lock,
        torrent_client: Arc<dyn TorrentClient>,
        tracker: Arc<dyn Tracker>,
        metadata_source: Arc<dyn MetadataSource>,
        douban_resolver: Arc<dyn DoubanResolver>,
        media_info_extractor: Arc<dyn MediaInfoExtractor>,
        screenshot_generator: Arc<dyn ScreenshotGenerator>,
        subtitle_detector: Arc<dyn SubtitleDetector>,
        image_uploader: Arc<dyn ImageUploader>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            node_id,
            config,
            store,
            lock,
            torrent_client,
            tracker,
            metadata_source,
            douban_resolver,
            media_info_extractor,
            screenshot_generator,
            subtitle_detector,
            image_uploader,
            http,
        }
    }
}
