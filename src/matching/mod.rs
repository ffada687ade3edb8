//! # Matching Module
//!
//! Scores free text against the stored reply candidates and returns a ranked
//! list of matches. Three strategies are available:
//!
//! - `tfidf`: cosine similarity over TF-IDF vectors (unigrams + bigrams)
//! - `sequence`: normalized sequence-similarity ratio, used when the TF-IDF
//!   index cannot be built for the current candidate set
//! - `keywords`: keyword-set overlap for question/answer datasets
//!
//! All strategies are pure functions over a candidate snapshot. Rankings are
//! sorted by descending score and ties keep the candidate order.

pub mod keywords;
pub mod sequence;
pub mod tfidf;

use std::cmp::Ordering;
use std::fmt;

use tracing::{debug, info, warn};

pub use keywords::{extract_keywords, overlap_ranking, rank_by_overlap};
pub use sequence::{rank_by_sequence, sequence_ratio};
pub use tfidf::{TfIdfConfig, TfIdfIndex};

/// A stored text eligible to be returned as a reply.
///
/// Plain response lists only carry `text`. Question/answer datasets match on
/// the question (`text`) and reply with `answer`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCandidate {
    pub text: String,
    pub answer: Option<String>,
    pub keywords: Vec<String>,
}

impl ResponseCandidate {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            answer: None,
            keywords: Vec::new(),
        }
    }

    pub fn question_answer(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question = question.into();
        let keywords = extract_keywords(&question);
        Self {
            text: question,
            answer: Some(answer.into()),
            keywords,
        }
    }

    /// Text delivered to the user when this candidate wins
    pub fn reply(&self) -> &str {
        self.answer.as_deref().unwrap_or(&self.text)
    }
}

/// One scored candidate
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub text: String,
    pub score: f64,
}

impl MatchResult {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Which strategy produced a ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    TfIdf,
    Sequence,
    KeywordOverlap,
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherKind::TfIdf => write!(f, "tfidf"),
            MatcherKind::Sequence => write!(f, "sequence"),
            MatcherKind::KeywordOverlap => write!(f, "keyword-overlap"),
        }
    }
}

/// Ranked matches together with the strategy that scored them
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub kind: MatcherKind,
    pub matches: Vec<MatchResult>,
}

impl Ranking {
    pub fn top(&self) -> Option<&MatchResult> {
        self.matches.first()
    }
}

/// Errors raised while building a matcher index
#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    /// No candidates were supplied
    NoCandidates,
    /// Document-frequency pruning cannot keep any term for this corpus size
    DegenerateCorpus(String),
    /// Tokenization produced no usable terms
    EmptyVocabulary,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::NoCandidates => write!(f, "No candidates to index"),
            MatchError::DegenerateCorpus(msg) => write!(f, "Degenerate corpus: {msg}"),
            MatchError::EmptyVocabulary => {
                write!(f, "Empty vocabulary; candidates contain only stop words or single letters")
            }
        }
    }
}

impl std::error::Error for MatchError {}

/// Stable descending sort, truncated to `limit` (at least one entry)
pub(crate) fn rank_scored(mut scored: Vec<MatchResult>, limit: usize) -> Vec<MatchResult> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit.max(1));
    scored
}

/// Snapshot of the candidate set with its optional TF-IDF index.
///
/// Rebuilt whenever the stored candidates change; there is no incremental
/// update.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    candidates: Vec<ResponseCandidate>,
    tfidf: Option<TfIdfIndex>,
}

impl CandidateIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index over `candidates`, falling back to sequence matching
    /// when vectorization fails.
    pub fn build(candidates: Vec<ResponseCandidate>) -> Self {
        Self::build_with_config(candidates, &TfIdfConfig::default())
    }

    pub fn build_with_config(candidates: Vec<ResponseCandidate>, config: &TfIdfConfig) -> Self {
        if candidates.is_empty() {
            debug!("Candidate index is empty");
            return Self::empty();
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let tfidf = match TfIdfIndex::fit(&texts, config) {
            Ok(index) => {
                info!(
                    candidates = candidates.len(),
                    vocabulary = index.vocabulary_len(),
                    "TF-IDF index built"
                );
                Some(index)
            }
            Err(e) => {
                warn!(
                    candidates = candidates.len(),
                    error = %e,
                    "Failed building TF-IDF index, falling back to sequence matching"
                );
                None
            }
        };

        Self { candidates, tfidf }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[ResponseCandidate] {
        &self.candidates
    }

    /// Strategy used for queries against this snapshot
    pub fn matcher_kind(&self) -> MatcherKind {
        if self.tfidf.is_some() {
            MatcherKind::TfIdf
        } else {
            MatcherKind::Sequence
        }
    }

    /// Rank candidates for `query`; an empty snapshot yields an empty ranking.
    pub fn find_best(&self, query: &str, limit: usize) -> Ranking {
        let kind = self.matcher_kind();
        if self.candidates.is_empty() {
            return Ranking {
                kind,
                matches: Vec::new(),
            };
        }

        let matches = match &self.tfidf {
            Some(index) => {
                let scored = index
                    .similarities(query)
                    .into_iter()
                    .zip(&self.candidates)
                    .map(|(score, candidate)| MatchResult::new(candidate.reply(), score))
                    .collect();
                rank_scored(scored, limit)
            }
            None => rank_by_sequence(query, &self.candidates, limit),
        };

        debug!(
            matcher = %kind,
            results = matches.len(),
            top_score = matches.first().map(|m| m.score).unwrap_or(0.0),
            "Ranked candidates"
        );

        Ranking { kind, matches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(texts: &[&str]) -> Vec<ResponseCandidate> {
        texts.iter().map(|t| ResponseCandidate::plain(*t)).collect()
    }

    #[test]
    fn test_empty_index_returns_no_matches() {
        let index = CandidateIndex::empty();
        let ranking = index.find_best("anything", 3);
        assert!(ranking.matches.is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_single_candidate_falls_back_to_sequence() {
        // One document cannot satisfy max_df pruning, so vectorization fails
        let index = CandidateIndex::build(plain(&["delivery takes two days"]));
        assert_eq!(index.matcher_kind(), MatcherKind::Sequence);

        let ranking = index.find_best("how long is delivery", 3);
        assert_eq!(ranking.kind, MatcherKind::Sequence);
        assert_eq!(ranking.matches.len(), 1);
        assert!(ranking.matches[0].score > 0.0);
    }

    #[test]
    fn test_tfidf_ranking_prefers_overlapping_candidate() {
        let index = CandidateIndex::build(plain(&[
            "our shop opens at nine",
            "delivery takes two days",
            "payment by card is accepted",
            "returns are possible within two weeks",
        ]));
        assert_eq!(index.matcher_kind(), MatcherKind::TfIdf);

        let ranking = index.find_best("how many days does delivery take", 2);
        assert_eq!(ranking.matches.len(), 2);
        assert_eq!(ranking.matches[0].text, "delivery takes two days");
        assert!(ranking.matches[0].score >= ranking.matches[1].score);
    }

    #[test]
    fn test_question_answer_candidate_replies_with_answer() {
        let candidate = ResponseCandidate::question_answer("How much is shipping?", "Shipping is free");
        assert_eq!(candidate.reply(), "Shipping is free");
        assert!(candidate.keywords.contains(&"shipping".to_string()));
    }

    #[test]
    fn test_rank_scored_is_stable_for_ties() {
        let ranked = rank_scored(
            vec![
                MatchResult::new("first", 0.5),
                MatchResult::new("second", 0.9),
                MatchResult::new("third", 0.5),
            ],
            3,
        );
        let texts: Vec<&str> = ranked.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first", "third"]);
    }
}
