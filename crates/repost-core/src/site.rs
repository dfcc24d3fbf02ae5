//! The `ssd` target-site adapter (§4.5 "Target-site option mapping"): maps
//! media attributes to the sparse [`crate::model::SiteOptions`] dictionary
//! consumed by [`crate::service::CreatePostRequest`], plus the deterministic
//! sub-title and post-URL helpers used alongside it. This is the only
//! shipped target-site adapter; other sites would implement the same shape
//! against their own option vocabulary.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::model::{MediaInfoMedia, SiteOptionKey, SiteOptions};

/// Release classification derived from title-guessing, ahead of metadata
/// resolution (§4.5 step 4). `Other` covers releases guessit-style guessing
/// would not confidently call a movie or an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessedKind {
    /// A standalone film.
    Movie,
    /// A television episode or season pack.
    Episode,
    /// Neither; posted under the catch-all posting type.
    Other,
}

/// Guess a release's [`GuessedKind`] from the season/episode fields already
/// extracted onto [`crate::service::TitleGuess`]: any season or episode
/// number present makes it an episode, otherwise it is a movie.
#[must_use]
pub const fn guess_kind(season: Option<u32>, episode: Option<u32>) -> GuessedKind {
    if season.is_some() || episode.is_some() {
        GuessedKind::Episode
    } else {
        GuessedKind::Movie
    }
}

static MEDIUM_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\bRemux\b", "4"),
    (r"(?i)\bMiniBD\b", "2"),
    (r"(?i)\bBlu-?Ray\b", "1"),
    (r"(?i)\bBDRip\b", "6"),
    (r"(?i)\bWEB-?DL\b", "7"),
    (r"(?i)\bWEBRip\b", "8"),
    (r"(?i)\bHDTV\b", "5"),
    (r"(?i)\bTVRip\b", "9"),
    (r"(?i)\bDVDRip\b", "10"),
    (r"(?i)\bDVD\b", "3"),
    (r"(?i)\bCD\b", "11"),
];

/// Medium (source) selector, guessed from tokens present in `release_name`.
/// Defaults to `99` ("other") when no known token is found.
#[must_use]
pub fn medium_selector(release_name: &str) -> &'static str {
    static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
        MEDIUM_PATTERNS
            .iter()
            .map(|(pattern, value)| (Regex::new(pattern).expect("static pattern"), *value))
            .collect()
    });
    COMPILED
        .iter()
        .find(|(pattern, _)| pattern.is_match(release_name))
        .map_or("99", |(_, value)| value)
}

/// Origin-country to source selector mapping (§8 P7). Total over the
/// supported codes; unmapped countries fall through to `99`.
#[must_use]
pub fn region_source_selector(origin_country: &[String]) -> u8 {
    let has = |code: &str| origin_country.iter().any(|c| c.eq_ignore_ascii_case(code));
    if has("CN") {
        1
    } else if has("HK") {
        2
    } else if has("TW") {
        3
    } else if has("US") || has("BE") || has("FR") {
        4
    } else if has("JP") {
        5
    } else if has("KR") {
        6
    } else if has("IN") {
        7
    } else if has("RU") {
        8
    } else {
        99
    }
}

static PATTERN_1080I: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)1080i").expect("static pattern"));
static PATTERN_DOVI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bDolby Vision\b").expect("static pattern"));
static PATTERN_HDR10: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bHDR10\b").expect("static pattern"));
static PATTERN_HDR10_PLUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bHDR10\+\b").expect("static pattern"));
static PATTERN_HDR_VIVID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bHDR Vivid\b").expect("static pattern"));

const SUBTITLE_ZH_WORDS: &[&str] = &["zh", "zh-cn", "chinese", "cmn-hans", "cmn-hant"];

/// Build the sparse [`SiteOptions`] dictionary for one release (§4.5
/// "Target-site option mapping").
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the primary video track's resolution
/// or codec, or the primary audio track's codec, is not one the adapter
/// recognizes — matching the original's "fail the pipeline" behavior for
/// unsupported media.
pub fn build_site_options(
    release_name: &str,
    kind: GuessedKind,
    season: Option<u32>,
    episode: Option<u32>,
    media: &MediaInfoMedia,
    genre_ids: &[i64],
    origin_country: &[String],
    hardcode_subtitle: bool,
) -> CoreResult<SiteOptions> {
    let mut options = SiteOptions::new();

    if season.is_some() && episode.is_none() {
        options.set(SiteOptionKey::Pack, "1");
    }

    let posting_type = match kind {
        GuessedKind::Movie => "501",
        GuessedKind::Episode => "502",
        GuessedKind::Other => "509",
    };
    options.set(SiteOptionKey::Type, posting_type);

    options.set(SiteOptionKey::MediumSel, medium_selector(release_name));

    let video = media
        .video
        .first()
        .ok_or_else(|| CoreError::Validation("media-info has no video track".to_string()))?;
    let standard_sel = match video.width {
        3840 => "1",
        1920 => {
            if PATTERN_1080I.is_match(release_name) {
                "3"
            } else {
                "2"
            }
        }
        other => {
            return Err(CoreError::Validation(format!(
                "unsupported video resolution (width {other})"
            )));
        }
    };
    options.set(SiteOptionKey::StandardSel, standard_sel);

    let codec_sel = match video.format.as_str() {
        "HEVC" => "1",
        "AVC" => "2",
        other => {
            return Err(CoreError::Validation(format!(
                "unsupported video codec {other:?}"
            )));
        }
    };
    options.set(SiteOptionKey::CodecSel, codec_sel);

    let audio = media
        .audio
        .first()
        .ok_or_else(|| CoreError::Validation("media-info has no audio track".to_string()))?;
    let audiocodec_sel = match audio.format.as_str() {
        "DTS-HD" => "1",
        "TrueHD" => "2",
        "LPCM" => "6",
        "DTS" => "3",
        "E-AC-3" => "11",
        "AC-3" => "4",
        "AAC" => "5",
        "FLAC" => "7",
        "APE" => "8",
        "WAV" => "9",
        "MP3" => "10",
        other => {
            return Err(CoreError::Validation(format!(
                "unsupported audio codec {other:?}"
            )));
        }
    };
    options.set(SiteOptionKey::AudiocodecSel, audiocodec_sel);

    for track in &media.video {
        for field in [
            track.hdr_format_string.as_deref(),
            track.hdr_format.as_deref(),
            track.hdr_format_compatibility.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if PATTERN_DOVI.is_match(field) {
                options.set(SiteOptionKey::Dovi, "1");
            }
            if PATTERN_HDR10.is_match(field) && !PATTERN_HDR10_PLUS.is_match(field) {
                options.set(SiteOptionKey::Hdr10, "1");
            }
            if PATTERN_HDR10_PLUS.is_match(field) {
                options.set(SiteOptionKey::Hdr10Plus, "1");
            }
            if PATTERN_HDR_VIVID.is_match(field) {
                options.set(SiteOptionKey::HdrVivid, "1");
            }
        }
    }

    let detected_zh = media.text.iter().any(|track| {
        let language = track.language.to_ascii_lowercase();
        let title = track.title.to_ascii_lowercase();
        let language_string = track.language_string.to_ascii_lowercase();
        SUBTITLE_ZH_WORDS
            .iter()
            .any(|word| language.contains(word) || title.contains(word))
            || language_string.contains("chinese")
    });
    if hardcode_subtitle || detected_zh {
        options.set(SiteOptionKey::SubtitleZh, "1");
    }

    options.set(
        SiteOptionKey::SourceSel,
        region_source_selector(origin_country).to_string(),
    );

    if genre_ids.contains(&16) {
        options.set(SiteOptionKey::Animation, "1");
    }
    if genre_ids.contains(&99) {
        options.set(SiteOptionKey::Type, "503");
    }

    Ok(options)
}

/// Join deduplicated alternate titles with ` / `, preserving first-seen order
/// (§4.5 "sub-title line").
#[must_use]
pub fn sub_title(names: &[String]) -> String {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .filter(|name| !name.is_empty() && seen.insert(name.as_str()))
        .cloned()
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Derive the post URL from resolved ids: Douban preferred, else IMDb
/// (§4.5 "The post URL is the Douban subject page if a Douban id is
/// present, else the IMDb title page").
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if neither id is present.
pub fn post_url(douban_id: Option<&str>, imdb_id: Option<&str>) -> CoreResult<String> {
    if let Some(id) = douban_id {
        Ok(format!("https://movie.douban.com/subject/{id}/"))
    } else if let Some(id) = imdb_id {
        Ok(format!("https://www.imdb.com/title/{id}/"))
    } else {
        Err(CoreError::Validation(
            "missing media site id: neither douban_id nor imdb_id is present".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioTrack, MediaTrack, TextTrack};

    fn media_1080p_hevc_aac() -> MediaInfoMedia {
        MediaInfoMedia {
            video: vec![MediaTrack {
                width: 1920,
                format: "HEVC".to_string(),
                hdr_format_string: None,
                hdr_format: None,
                hdr_format_compatibility: None,
            }],
            audio: vec![AudioTrack {
                format: "AAC".to_string(),
            }],
            text: Vec::new(),
        }
    }

    #[test]
    fn p7_region_mapping_is_total() {
        assert_eq!(region_source_selector(&["CN".to_string()]), 1);
        assert_eq!(region_source_selector(&["HK".to_string()]), 2);
        assert_eq!(region_source_selector(&["TW".to_string()]), 3);
        assert_eq!(region_source_selector(&["US".to_string()]), 4);
        assert_eq!(region_source_selector(&["BE".to_string()]), 4);
        assert_eq!(region_source_selector(&["FR".to_string()]), 4);
        assert_eq!(region_source_selector(&["JP".to_string()]), 5);
        assert_eq!(region_source_selector(&["KR".to_string()]), 6);
        assert_eq!(region_source_selector(&["IN".to_string()]), 7);
        assert_eq!(region_source_selector(&["RU".to_string()]), 8);
        assert_eq!(region_source_selector(&["XX".to_string()]), 99);
        assert_eq!(region_source_selector(&[]), 99);
    }

    #[test]
    fn standard_selector_distinguishes_1080i() {
        let media = media_1080p_hevc_aac();
        let options =
            build_site_options("Name.S01E01.1080p.WEB-DL", GuessedKind::Episode, Some(1), Some(1), &media, &[], &[], false)
                .unwrap();
        assert_eq!(options.get(SiteOptionKey::StandardSel), Some("2"));

        let options =
            build_site_options("Name.S01E01.1080i.HDTV", GuessedKind::Episode, Some(1), Some(1), &media, &[], &[], false)
                .unwrap();
        assert_eq!(options.get(SiteOptionKey::StandardSel), Some("3"));
    }

    #[test]
    fn unsupported_resolution_is_rejected() {
        let mut media = media_1080p_hevc_aac();
        media.video[0].width = 1280;
        let err = build_site_options("Name.720p", GuessedKind::Movie, None, None, &media, &[], &[], false)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn animation_genre_sets_flag_and_genre_99_forces_type() {
        let media = media_1080p_hevc_aac();
        let options = build_site_options(
            "Name.Movie.2024.1080p",
            GuessedKind::Movie,
            None,
            None,
            &media,
            &[16],
            &["US".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(options.get(SiteOptionKey::Animation), Some("1"));
        assert_eq!(options.get(SiteOptionKey::Type), Some("501"));

        let options = build_site_options(
            "Name.Movie.2024.1080p",
            GuessedKind::Movie,
            None,
            None,
            &media,
            &[99],
            &["US".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(options.get(SiteOptionKey::Type), Some("503"));
    }

    #[test]
    fn hardcode_subtitle_forces_subtitle_zh() {
        let media = media_1080p_hevc_aac();
        let options =
            build_site_options("Name", GuessedKind::Movie, None, None, &media, &[], &[], true).unwrap();
        assert_eq!(options.get(SiteOptionKey::SubtitleZh), Some("1"));
    }

    #[test]
    fn detected_chinese_text_track_sets_subtitle_zh() {
        let mut media = media_1080p_hevc_aac();
        media.text.push(TextTrack {
            language: "zh".to_string(),
            language_string: "Chinese (Simplified)".to_string(),
            title: String::new(),
        });
        let options =
            build_site_options("Name", GuessedKind::Movie, None, None, &media, &[], &[], false).unwrap();
        assert_eq!(options.get(SiteOptionKey::SubtitleZh), Some("1"));
    }

    #[test]
    fn season_without_episode_sets_pack_flag() {
        let media = media_1080p_hevc_aac();
        let options =
            build_site_options("Name.S02", GuessedKind::Episode, Some(2), None, &media, &[], &[], false)
                .unwrap();
        assert_eq!(options.get(SiteOptionKey::Pack), Some("1"));
    }

    #[test]
    fn medium_selector_matches_known_tokens() {
        assert_eq!(medium_selector("Name.2160p.Blu-ray.REMUX"), "4");
        assert_eq!(medium_selector("Name.1080p.WEB-DL"), "7");
        assert_eq!(medium_selector("Name.1080p.HDTV"), "5");
        assert_eq!(medium_selector("Name.Unknown.Source"), "99");
    }

    #[test]
    fn sub_title_dedupes_and_joins() {
        assert_eq!(
            sub_title(&["A".to_string(), "B".to_string(), "A".to_string()]),
            "A / B"
        );
        assert_eq!(sub_title(&[]), "");
    }

    #[test]
    fn post_url_prefers_douban() {
        assert_eq!(
            post_url(Some("123"), Some("tt1")).unwrap(),
            "https://movie.douban.com/subject/123/"
        );
        assert_eq!(
            post_url(None, Some("tt1")).unwrap(),
            "https://www.imdb.com/title/tt1/"
        );
        assert!(post_url(None, None).is_err());
    }
}
