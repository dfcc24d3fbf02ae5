//! Deterministic TV title rewrite rule (§4.6): inject a missing episode
//! range into a season-level title, derived from the file names actually
//! present in the torrent.

use once_cell::sync::Lazy;
use regex::Regex;

static ALREADY_TAGGED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS\d+E\d+\b").expect("static pattern"));

static FILE_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS\d+E(?P<ep>\d+)\b").expect("static pattern"));

static SEASON_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(S\d+)\b").expect("static pattern"));

/// `true` if `title` already contains a season-and-episode token
/// (`S\d+E\d+`), in which case the rewrite rule is a no-op.
#[must_use]
pub fn already_tagged(title: &str) -> bool {
    ALREADY_TAGGED.is_match(title)
}

/// Extract the `(min, max)` episode numbers found across `file_names` by
/// matching `\bS\d+E(\d+)\b` on each name. Returns `None` if no file name
/// carries an episode number.
#[must_use]
pub fn episode_range(file_names: &[String]) -> Option<(u32, u32)> {
    let mut episodes: Vec<u32> = file_names
        .iter()
        .filter_map(|name| FILE_EPISODE.captures(name))
        .filter_map(|caps| caps.name("ep").and_then(|m| m.as_str().parse().ok()))
        .collect();
    if episodes.is_empty() {
        return None;
    }
    episodes.sort_unstable();
    Some((episodes[0], *episodes.last().unwrap()))
}

/// Apply the full rewrite rule (§4.6): if `title` already carries an
/// episode tag, return it unchanged. Otherwise derive the episode range
/// from `file_names` and inject `E{min}[-E{max}]` immediately after the
/// first season token (`\bS\d+\b`). If no season token or no episode range
/// can be derived, `title` is returned unchanged.
#[must_use]
pub fn rewrite_tv_title(title: &str, file_names: &[String]) -> String {
    if already_tagged(title) {
        return title.to_string();
    }
    let Some((min, max)) = episode_range(file_names) else {
        return title.to_string();
    };
    let suffix = if min == max {
        format!("E{min:02}")
    } else {
        format!("E{min:02}-E{max:02}")
    };
    if let Some(m) = SEASON_TOKEN.find(title) {
        let mut rewritten = String::with_capacity(title.len() + suffix.len());
        rewritten.push_str(&title[..m.end()]);
        rewritten.push_str(&suffix);
        rewritten.push_str(&title[m.end()..]);
        rewritten
    } else {
        title.to_string()
    }
}

/// `true` if `title` matches the WEB-DL screenshot-format selector pattern
/// (§4.5 step 3): `\b(web-dl|webdl)\b`, case-insensitive.
#[must_use]
pub fn is_web_dl(title: &str) -> bool {
    static WEB_DL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(web-dl|webdl)\b").expect("static pattern"));
    WEB_DL.is_match(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_injects_episode_range() {
        let title = "Name.S02.1080p.WEB-DL.H264-GRP";
        let files = vec![
            "Name.S02E01.1080p.WEB-DL.H264-GRP.mkv".to_string(),
            "Name.S02E02.1080p.WEB-DL.H264-GRP.mkv".to_string(),
            "Name.S02E03.1080p.WEB-DL.H264-GRP.mkv".to_string(),
            "Name.S02E04.1080p.WEB-DL.H264-GRP.mkv".to_string(),
        ];
        assert_eq!(
            rewrite_tv_title(title, &files),
            "Name.S02E01-E04.1080p.WEB-DL.H264-GRP"
        );
    }

    #[test]
    fn s2_already_tagged_is_unchanged() {
        let title = "Name.S02E11.1080p.WEB-DL.H264-GRP";
        let files = vec!["Name.S02E11.1080p.WEB-DL.H264-GRP.mkv".to_string()];
        assert_eq!(rewrite_tv_title(title, &files), title);
    }

    #[test]
    fn single_episode_file_yields_single_tag() {
        let title = "Name.S01.2160p.WEB-DL.H265-GRP";
        let files = vec!["Name.S01E07.2160p.WEB-DL.H265-GRP.mkv".to_string()];
        assert_eq!(
            rewrite_tv_title(title, &files),
            "Name.S01E07.2160p.WEB-DL.H265-GRP"
        );
    }

    #[test]
    fn no_episode_files_is_unchanged() {
        let title = "Name.S01.2160p.WEB-DL.H265-GRP";
        assert_eq!(rewrite_tv_title(title, &[]), title);
    }

    #[test]
    fn no_season_token_is_unchanged() {
        let title = "Name.Movie.2160p.WEB-DL.H265-GRP";
        let files = vec!["Name.S01E01.mkv".to_string()];
        assert_eq!(rewrite_tv_title(title, &files), title);
    }

    #[test]
    fn web_dl_detection_is_case_insensitive() {
        assert!(is_web_dl("Name.S02.1080p.WEB-DL.H264-GRP"));
        assert!(is_web_dl("Name.S02.1080p.webdl.H264-GRP"));
        assert!(!is_web_dl("Name.S02.1080p.BluRay.H264-GRP"));
    }
}
