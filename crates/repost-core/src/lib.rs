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

//! Domain model, item state machine, and external-collaborator traits shared
//! by every node of the repost engine.

pub mod error;
pub mod model;
pub mod service;
pub mod site;
pub mod title;

pub use error::{CoreError, CoreResult};
pub use model::{
    AudioTrack, CompiledPatternSet, Feed, Item, ItemStatus, MediaInfo, MediaInfoDoc,
    MediaInfoMedia, MediaTrack, Node, PatternSet, PipelineOutcome, ResolvedMetadata, Run,
    RunStatus, SiteOptionKey, SiteOptions, TextTrack, TitleType,
};
pub use service::{
    AddTorrentRequest, CreatePostRequest, DoubanResolver, ImageFormat, ImageUploader,
    MediaInfoExtractor, MetadataSource, ScreenshotGenerator, SubtitleDetector, TitleGuess,
    TorrentClient, TorrentFileInfo, TorrentSummary, TorrentTrackerEntry, Tracker,
};
