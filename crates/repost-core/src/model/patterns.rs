//! Include/exclude pattern sets: a disjunction of pattern conjunctions,
//! matched against a release title (§4.2).

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Raw, serializable pattern set: each inner `Vec<String>` is a conjunction
/// (all patterns must match); the outer `Vec` is a disjunction (any group
/// matching is enough).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet(pub Vec<Vec<String>>);

impl PatternSet {
    /// An empty set. `matches` on an empty include-set is conventionally
    /// treated as "matches everything" by callers (§4.2: an include set only
    /// narrows when non-empty); an empty exclude-set never matches.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// `true` when no groups are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compile every pattern, failing fast on the first invalid regex.
    pub fn compile(&self) -> CoreResult<CompiledPatternSet> {
        let groups = self
            .0
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|pattern| {
                        Regex::new(pattern).map_err(|source| CoreError::InvalidPattern {
                            pattern: pattern.clone(),
                            source,
                        })
                    })
                    .collect::<CoreResult<Vec<_>>>()
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(CompiledPatternSet(groups))
    }
}

/// A [`PatternSet`] with every pattern pre-compiled, ready for repeated
/// matching during a feed poll or admission pass.
pub struct CompiledPatternSet(Vec<Vec<Regex>>);

impl CompiledPatternSet {
    /// `true` if any conjunction group matches `text` in full (every pattern
    /// in the group matches).
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.0
            .iter()
            .any(|group| group.iter().all(|pattern| pattern.is_match(text)))
    }

    /// `true` when no groups are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_matches_nothing() {
        let compiled = PatternSet::new().compile().unwrap();
        assert!(!compiled.matches("Anything.S01E01.1080p"));
        assert!(compiled.is_empty());
    }

    #[test]
    fn disjunction_of_conjunctions() {
        let set = PatternSet(vec![
            vec!["(?i)1080p".to_string(), "(?i)HEVC".to_string()],
            vec!["(?i)2160p".to_string()],
        ]);
        let compiled = set.compile().unwrap();
        assert!(compiled.matches("Show.S01E01.1080p.HEVC-GRP"));
        assert!(compiled.matches("Show.S01E01.2160p.AVC-GRP"));
        assert!(!compiled.matches("Show.S01E01.1080p.AVC-GRP"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let set = PatternSet(vec![vec!["(unclosed".to_string()]]);
        assert!(set.compile().is_err());
    }
}
