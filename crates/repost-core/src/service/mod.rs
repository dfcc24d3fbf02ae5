//! Trait boundaries for every external collaborator named in §6: the local
//! torrent client, the target tracker, the metadata/media-info sources, the
//! screenshot generator, the hardcode-subtitle detector, and the image
//! uploader. Production implementations live outside this crate (repost-app
//! for the torrent client; operator-supplied adapters for the rest); this
//! module also ships `stub` fakes sufficient to compile, run, and test the
//! engine end to end.

use std::path::Path;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::model::{MediaInfoDoc, ResolvedMetadata};

/// One file within a torrent, as reported by the local torrent client.
#[derive(Debug, Clone)]
pub struct TorrentFileInfo {
    /// File name (not full path) within the torrent's save directory.
    pub name: String,
    /// File size in bytes.
    pub size: i64,
}

/// Summary of one torrent tracked by the local torrent client.
#[derive(Debug, Clone)]
pub struct TorrentSummary {
    /// Info-hash (v1, lowercase hex) of the torrent.
    pub hash: String,
    /// Final save path on disk.
    pub save_path: String,
    /// Declared total size in bytes.
    pub total_size: i64,
    /// Bytes completed so far.
    pub completed: i64,
    /// Bytes uploaded so far (used by the seeding termination rule).
    pub uploaded: i64,
    /// Category tag (`pt-repost` for engine-owned torrents).
    pub category: String,
}

/// One tracker entry for a torrent, as reported by the local torrent client.
#[derive(Debug, Clone)]
pub struct TorrentTrackerEntry {
    /// Tracker tier; tier `>= 0` is a real (non-DHT/PEX) tracker entry.
    pub tier: i64,
    /// Status message reported by the tracker.
    pub message: String,
}

/// Fixed message the target tracker uses to signal de-listing (§4.7).
pub const TRACKER_REMOVED_MESSAGE: &str = "Torrent not registered with this tracker";

/// Request to add a torrent to the local client (§6 torrent-client binding).
#[derive(Debug, Clone)]
pub struct AddTorrentRequest {
    /// Raw (possibly sanitized) `.torrent` bytes.
    pub bytes: Vec<u8>,
    /// Save path override; `None` lets the client choose its default.
    pub save_path: Option<String>,
    /// Skip the initial hash check (used when re-adding a completed
    /// download under its original save path).
    pub skip_checking: bool,
    /// Category tag to apply.
    pub category: String,
    /// Tags to apply.
    pub tags: Vec<String>,
    /// Whether the client's automatic torrent management should be enabled.
    pub auto_management: bool,
}

/// The only operations the core consumes from a local BitTorrent client
/// (§6).
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// List torrents tagged with `category`.
    async fn list_in_category(&self, category: &str) -> CoreResult<Vec<TorrentSummary>>;

    /// List files within the torrent identified by `hash`.
    async fn list_files(&self, hash: &str) -> CoreResult<Vec<TorrentFileInfo>>;

    /// List tracker entries for the torrent identified by `hash`.
    async fn list_trackers(&self, hash: &str) -> CoreResult<Vec<TorrentTrackerEntry>>;

    /// Export the raw `.torrent` bytes for `hash`.
    async fn export_torrent(&self, hash: &str) -> CoreResult<Vec<u8>>;

    /// Add a new torrent.
    async fn add_torrent(&self, request: AddTorrentRequest) -> CoreResult<()>;

    /// Liveness/version probe.
    async fn app_version(&self) -> CoreResult<String>;
}

/// Request to submit a sanitized repost to the target tracker (§6).
#[derive(Debug, Clone)]
pub struct CreatePostRequest {
    /// Sanitized `.torrent` bytes (private flag forced, announce stripped).
    pub sanitized_torrent: Vec<u8>,
    /// Release title, possibly rewritten by §4.6.
    pub release_name: String,
    /// Human-readable media-info report.
    pub mediainfo_text: String,
    /// Hosted screenshot URLs.
    pub images: Vec<String>,
    /// Sparse target-site option dictionary.
    pub options: crate::model::SiteOptions,
    /// Resolved metadata, used for the sub-title and post URL.
    pub meta_info: ResolvedMetadata,
}

/// The target-tracker posting client (§6).
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Submit the post, returning the re-downloaded (tracker-stamped)
    /// torrent bytes.
    async fn create_post(&self, request: CreatePostRequest) -> CoreResult<Vec<u8>>;
}

/// A guessed title, as produced by title-guessing ahead of metadata
/// resolution (§4.5 step 4).
#[derive(Debug, Clone)]
pub struct TitleGuess {
    /// The (possibly un-rewritten) release title.
    pub title: String,
    /// Season number, when detected.
    pub season: Option<u32>,
    /// Episode number, when detected.
    pub episode: Option<u32>,
}

/// Movie/TV metadata resolver (§6 metadata lookup binding (a)). Production
/// adapters additionally consult the IMDb→Douban cache (§6 binding (b))
/// internally and populate [`ResolvedMetadata::douban_id`].
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve metadata for a guessed title.
    async fn resolve(&self, guess: &TitleGuess) -> CoreResult<ResolvedMetadata>;
}

/// IMDb id to Douban id cache/resolver (§6 metadata lookup binding (b)).
#[async_trait]
pub trait DoubanResolver: Send + Sync {
    /// Resolve a Douban id for the given IMDb id, if known.
    async fn resolve(&self, imdb_id: &str) -> CoreResult<Option<String>>;
}

/// Media-info extractor (§6 metadata lookup binding (c)).
#[async_trait]
pub trait MediaInfoExtractor: Send + Sync {
    /// Extract a `(text, structured)` media-info pair from a video file on
    /// disk.
    async fn extract(&self, video: &Path) -> CoreResult<(String, MediaInfoDoc)>;
}

/// Target image format for generated screenshots (§4.5 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Used for non-WEB-DL releases.
    Png,
    /// Used when the release title matches `\b(web-dl|webdl)\b`.
    Jpg,
}

/// Screenshot generator, invoking an external video tool (§1 out of scope,
/// specified only as a trait).
#[async_trait]
pub trait ScreenshotGenerator: Send + Sync {
    /// Generate `count` representative screenshots from `video` into
    /// `out_dir`, in `format`.
    async fn generate(
        &self,
        video: &Path,
        count: usize,
        out_dir: &Path,
        format: ImageFormat,
    ) -> CoreResult<Vec<std::path::PathBuf>>;
}

/// Hardcoded (burned-in) Chinese subtitle detector.
#[async_trait]
pub trait SubtitleDetector: Send + Sync {
    /// `true` if any of `images` shows burned-in Chinese subtitles.
    async fn detect(&self, images: &[std::path::PathBuf]) -> CoreResult<bool>;
}

/// Image-host uploader (§1 out of scope, specified only as a trait).
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload one image file, returning its hosted URL.
    async fn upload(&self, path: &Path) -> CoreResult<String>;
}

/// Minimal fakes sufficient to compile, run, and test the engine end to end
/// against recorded/deterministic collaborators (§1).
pub mod stub {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{
        AddTorrentRequest, CreatePostRequest, ImageFormat, TitleGuess, TorrentFileInfo,
        TorrentSummary, TorrentTrackerEntry,
    };
    use crate::error::CoreResult;
    use crate::model::{MediaInfoDoc, MediaInfoMedia, ResolvedMetadata, TitleType};

    /// In-memory [`super::TorrentClient`] fake backed by a fixed catalog.
    #[derive(Default)]
    pub struct FakeTorrentClient {
        torrents: Mutex<Vec<TorrentSummary>>,
        files: Mutex<std::collections::HashMap<String, Vec<TorrentFileInfo>>>,
        trackers: Mutex<std::collections::HashMap<String, Vec<TorrentTrackerEntry>>>,
        added: Mutex<Vec<AddTorrentRequest>>,
    }

    impl FakeTorrentClient {
        /// Seed a torrent summary, its files, and its trackers.
        pub fn seed(
            &self,
            summary: TorrentSummary,
            files: Vec<TorrentFileInfo>,
            trackers: Vec<TorrentTrackerEntry>,
        ) {
            let hash = summary.hash.clone();
            self.torrents.lock().unwrap().push(summary);
            self.files.lock().unwrap().insert(hash.clone(), files);
            self.trackers.lock().unwrap().insert(hash, trackers);
        }

        /// Remove a previously seeded torrent, simulating client-side removal.
        pub fn remove(&self, hash: &str) {
            self.torrents.lock().unwrap().retain(|t| t.hash != hash);
        }

        /// Torrents handed to [`super::TorrentClient::add_torrent`] so far.
        pub fn added_torrents(&self) -> Vec<AddTorrentRequest> {
            self.added.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl super::TorrentClient for FakeTorrentClient {
        async fn list_in_category(&self, category: &str) -> CoreResult<Vec<TorrentSummary>> {
            Ok(self
                .torrents
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.category == category)
                .cloned()
                .collect())
        }

        async fn list_files(&self, hash: &str) -> CoreResult<Vec<TorrentFileInfo>> {
            Ok(self.files.lock().unwrap().get(hash).cloned().unwrap_or_default())
        }

        async fn list_trackers(&self, hash: &str) -> CoreResult<Vec<TorrentTrackerEntry>> {
            Ok(self
                .trackers
                .lock()
                .unwrap()
                .get(hash)
                .cloned()
                .unwrap_or_default())
        }

        async fn export_torrent(&self, hash: &str) -> CoreResult<Vec<u8>> {
            Ok(format!("d4:name{}e", hash.len()).into_bytes())
        }

        async fn add_torrent(&self, request: AddTorrentRequest) -> CoreResult<()> {
            self.added.lock().unwrap().push(request);
            Ok(())
        }

        async fn app_version(&self) -> CoreResult<String> {
            Ok("v0.0.0-fake".to_string())
        }
    }

    /// Deterministic [`super::Tracker`] fake: echoes the sanitized torrent
    /// back unchanged, unless configured to report a duplicate.
    #[derive(Default)]
    pub struct FakeTracker {
        reject_as_duplicate: bool,
    }

    impl FakeTracker {
        /// Build a fake that reports every submission as a duplicate.
        #[must_use]
        pub const fn always_duplicate() -> Self {
            Self {
                reject_as_duplicate: true,
            }
        }
    }

    #[async_trait]
    impl super::Tracker for FakeTracker {
        async fn create_post(&self, request: CreatePostRequest) -> CoreResult<Vec<u8>> {
            if self.reject_as_duplicate {
                return Err(crate::error::CoreError::Duplicate(
                    "torrent already exists".to_string(),
                ));
            }
            Ok(request.sanitized_torrent)
        }
    }

    /// [`super::MetadataSource`] fake returning a fixed, configurable
    /// response for every guess.
    pub struct FakeMetadataSource {
        response: ResolvedMetadata,
    }

    impl FakeMetadataSource {
        /// Build a fake that always resolves to `response`.
        #[must_use]
        pub const fn new(response: ResolvedMetadata) -> Self {
            Self { response }
        }

        /// A plausible default movie response with no special genres.
        #[must_use]
        pub fn movie() -> Self {
            Self::new(ResolvedMetadata {
                title_type: TitleType::Movie,
                imdb_id: Some("tt0000000".to_string()),
                douban_id: None,
                episode_count: None,
                genre_ids: Vec::new(),
                origin_country: vec!["US".to_string()],
                names: vec!["Example".to_string()],
            })
        }
    }

    #[async_trait]
    impl super::MetadataSource for FakeMetadataSource {
        async fn resolve(&self, _guess: &TitleGuess) -> CoreResult<ResolvedMetadata> {
            Ok(self.response.clone())
        }
    }

    /// [`super::DoubanResolver`] fake backed by a fixed map.
    #[derive(Default)]
    pub struct FakeDoubanResolver(std::collections::HashMap<String, String>);

    impl FakeDoubanResolver {
        /// Build a fake seeded with one imdb→douban mapping.
        #[must_use]
        pub fn with_mapping(imdb_id: impl Into<String>, douban_id: impl Into<String>) -> Self {
            let mut map = std::collections::HashMap::new();
            map.insert(imdb_id.into(), douban_id.into());
            Self(map)
        }
    }

    #[async_trait]
    impl super::DoubanResolver for FakeDoubanResolver {
        async fn resolve(&self, imdb_id: &str) -> CoreResult<Option<String>> {
            Ok(self.0.get(imdb_id).cloned())
        }
    }

    /// [`super::MediaInfoExtractor`] fake returning a fixed document.
    pub struct FakeMediaInfoExtractor {
        text: String,
        doc: MediaInfoDoc,
    }

    impl FakeMediaInfoExtractor {
        /// Build a fake returning `text`/`doc` for every video.
        #[must_use]
        pub const fn new(text: String, doc: MediaInfoDoc) -> Self {
            Self { text, doc }
        }

        /// A plausible default 1080p HEVC/AAC document.
        #[must_use]
        pub fn plausible() -> Self {
            Self::new(
                "General\nComplete name: example.mkv\n".to_string(),
                MediaInfoDoc {
                    media: Some(MediaInfoMedia {
                        video: vec![crate::model::MediaTrack {
                            width: 1920,
                            format: "HEVC".to_string(),
                            hdr_format_string: None,
                            hdr_format: None,
                            hdr_format_compatibility: None,
                        }],
                        audio: vec![crate::model::AudioTrack {
                            format: "AAC".to_string(),
                        }],
                        text: Vec::new(),
                    }),
                },
            )
        }
    }

    #[async_trait]
    impl super::MediaInfoExtractor for FakeMediaInfoExtractor {
        async fn extract(&self, _video: &Path) -> CoreResult<(String, MediaInfoDoc)> {
            Ok((self.text.clone(), self.doc.clone()))
        }
    }

    /// [`super::ScreenshotGenerator`] fake that writes empty placeholder
    /// files instead of invoking a video tool.
    #[derive(Default)]
    pub struct FakeScreenshotGenerator;

    #[async_trait]
    impl super::ScreenshotGenerator for FakeScreenshotGenerator {
        async fn generate(
            &self,
            _video: &Path,
            count: usize,
            out_dir: &Path,
            format: ImageFormat,
        ) -> CoreResult<Vec<PathBuf>> {
            let ext = match format {
                ImageFormat::Png => "png",
                ImageFormat::Jpg => "jpg",
            };
            let mut paths = Vec::with_capacity(count);
            for index in 0..count {
                let path = out_dir.join(format!("shot-{index}.{ext}"));
                std::fs::write(&path, []).map_err(|source| crate::error::CoreError::Collaborator {
                    operation: "fake_screenshot_generator.generate",
                    source: source.into(),
                })?;
                paths.push(path);
            }
            Ok(paths)
        }
    }

    /// [`super::SubtitleDetector`] fake that always reports `false`.
    #[derive(Default)]
    pub struct FakeSubtitleDetector;

    #[async_trait]
    impl super::SubtitleDetector for FakeSubtitleDetector {
        async fn detect(&self, _images: &[PathBuf]) -> CoreResult<bool> {
            Ok(false)
        }
    }

    /// [`super::ImageUploader`] fake that returns deterministic, increasing
    /// URLs and can be configured to fail its first N attempts (exercising
    /// the publish pipeline's retry budget).
    pub struct FakeImageUploader {
        failures_remaining: AtomicUsize,
        uploaded: AtomicUsize,
    }

    impl FakeImageUploader {
        /// Build a fake that never fails.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                failures_remaining: AtomicUsize::new(0),
                uploaded: AtomicUsize::new(0),
            }
        }

        /// Build a fake whose first `failures` calls fail.
        #[must_use]
        pub const fn failing(failures: usize) -> Self {
            Self {
                failures_remaining: AtomicUsize::new(failures),
                uploaded: AtomicUsize::new(0),
            }
        }
    }

    impl Default for FakeImageUploader {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl super::ImageUploader for FakeImageUploader {
        async fn upload(&self, path: &Path) -> CoreResult<String> {
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n > 0).then_some(n - 1)
                })
                .is_ok()
            {
                return Err(crate::error::CoreError::Collaborator {
                    operation: "fake_image_uploader.upload",
                    source: anyhow::anyhow!("simulated transient failure"),
                });
            }
            let index = self.uploaded.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "https://img.example.test/{index}/{}",
                path.file_name().and_then(|n| n.to_str()).unwrap_or("img")
            ))
        }
    }
}
