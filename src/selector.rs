//! # Response Selector
//!
//! Decides between answering directly with the top match and offering the
//! best alternatives. Only the top score is compared against the threshold.

use tracing::debug;

use crate::matching::{MatchResult, MatcherKind, Ranking};

pub const DEFAULT_TFIDF_THRESHOLD: f64 = 0.45;
pub const DEFAULT_SEQUENCE_THRESHOLD: f64 = 0.4;
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 1.0;
pub const DEFAULT_TOP_N: usize = 3;

/// Outcome of selecting a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Top match met the threshold
    Answer(MatchResult),
    /// Low confidence; best matches for the user to look at
    Alternatives(Vec<MatchResult>),
    /// The candidate set is empty
    NoData,
}

/// Per-matcher confidence thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub tfidf: f64,
    pub sequence: f64,
    pub keyword_overlap: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tfidf: DEFAULT_TFIDF_THRESHOLD,
            sequence: DEFAULT_SEQUENCE_THRESHOLD,
            keyword_overlap: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn for_kind(&self, kind: MatcherKind) -> f64 {
        match kind {
            MatcherKind::TfIdf => self.tfidf,
            MatcherKind::Sequence => self.sequence,
            MatcherKind::KeywordOverlap => self.keyword_overlap,
        }
    }
}

/// Select from matches already ranked best-first.
pub fn select(matches: &[MatchResult], threshold: f64, top_n: usize) -> Selection {
    let Some(top) = matches.first() else {
        return Selection::NoData;
    };

    if top.score >= threshold {
        debug!(score = top.score, threshold, "Top match accepted");
        Selection::Answer(top.clone())
    } else {
        debug!(score = top.score, threshold, "Top match below threshold, offering alternatives");
        Selection::Alternatives(matches.iter().take(top_n.max(1)).cloned().collect())
    }
}

/// Select using the threshold that belongs to the ranking's matcher
pub fn select_ranking(ranking: &Ranking, thresholds: &Thresholds, top_n: usize) -> Selection {
    select(&ranking.matches, thresholds.for_kind(ranking.kind), top_n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matches_is_no_data() {
        assert_eq!(select(&[], 0.0, 3), Selection::NoData);
        assert_eq!(select(&[], 100.0, 0), Selection::NoData);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let matches = vec![MatchResult::new("yes", 0.45)];
        assert_eq!(
            select(&matches, 0.45, 3),
            Selection::Answer(MatchResult::new("yes", 0.45))
        );
    }

    #[test]
    fn test_below_threshold_returns_top_n() {
        let matches = vec![
            MatchResult::new("a", 0.3),
            MatchResult::new("b", 0.2),
            MatchResult::new("c", 0.1),
            MatchResult::new("d", 0.05),
        ];
        match select(&matches, 0.45, 3) {
            Selection::Alternatives(alts) => {
                assert_eq!(alts.len(), 3);
                assert_eq!(alts[0].text, "a");
            }
            other => panic!("Unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn test_thresholds_follow_matcher_kind() {
        let thresholds = Thresholds::default();
        let ranking = Ranking {
            kind: MatcherKind::KeywordOverlap,
            matches: vec![MatchResult::new("answer", 1.0)],
        };
        assert!(matches!(
            select_ranking(&ranking, &thresholds, 3),
            Selection::Answer(_)
        ));
        assert_eq!(thresholds.for_kind(MatcherKind::TfIdf), DEFAULT_TFIDF_THRESHOLD);
    }
}
