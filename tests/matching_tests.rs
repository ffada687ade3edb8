//! # Matching Tests
//!
//! Ranking properties of the candidate index and the selector decisions
//! built on top of it.

use replybot::matching::{
    overlap_ranking, rank_by_overlap, rank_by_sequence, sequence_ratio, CandidateIndex,
    MatchResult, MatcherKind, ResponseCandidate,
};
use replybot::selector::{select, select_ranking, Selection, Thresholds};

fn plain(texts: &[&str]) -> Vec<ResponseCandidate> {
    texts.iter().map(|t| ResponseCandidate::plain(*t)).collect()
}

fn assert_sorted_in_unit_range(scores: &[f64]) {
    for window in scores.windows(2) {
        assert!(window[0] >= window[1], "scores not descending: {scores:?}");
    }
    for score in scores {
        assert!((0.0..=1.0).contains(score), "score out of range: {score}");
    }
}

#[test]
fn test_tfidf_ranking_is_non_empty_and_sorted() {
    let index = CandidateIndex::build(plain(&[
        "our shop opens at nine",
        "delivery takes two days",
        "you can pay by card or cash",
        "returns are accepted within two weeks",
    ]));
    assert_eq!(index.matcher_kind(), MatcherKind::TfIdf);

    for query in ["when does the shop open", "pay by card", "zzz", ""] {
        let ranking = index.find_best(query, 3);
        assert!(!ranking.matches.is_empty(), "empty ranking for {query:?}");
        assert!(ranking.matches.len() <= 3);
        let scores: Vec<f64> = ranking.matches.iter().map(|m| m.score).collect();
        assert_sorted_in_unit_range(&scores);
    }
}

#[test]
fn test_sequence_ranking_is_non_empty_and_sorted() {
    let candidates = plain(&["hello there", "good morning", "see you later"]);
    for query in ["helo", "morning!", "", "completely unrelated"] {
        let matches = rank_by_sequence(query, &candidates, 10);
        assert_eq!(matches.len(), 3);
        let scores: Vec<f64> = matches.iter().map(|m| m.score).collect();
        assert_sorted_in_unit_range(&scores);
    }
}

#[test]
fn test_how_r_u_under_sequence_matcher() {
    // One candidate cannot be vectorized, so the index uses sequence matching
    let index = CandidateIndex::build(vec![ResponseCandidate::question_answer(
        "how are you",
        "good",
    )]);
    assert_eq!(index.matcher_kind(), MatcherKind::Sequence);

    let ratio = sequence_ratio("how r u", "how are you");
    let ranking = index.find_best("how r u", 3);
    let thresholds = Thresholds {
        sequence: 0.4,
        ..Thresholds::default()
    };

    match select_ranking(&ranking, &thresholds, 3) {
        Selection::Answer(best) => {
            assert!(ratio >= 0.4);
            assert_eq!(best.text, "good");
        }
        Selection::Alternatives(matches) => {
            assert!(ratio < 0.4);
            assert!(matches.iter().any(|m| m.text == "good" && m.score == ratio));
        }
        Selection::NoData => panic!("candidate set is not empty"),
    }
}

#[test]
fn test_empty_candidates_always_no_data() {
    let index = CandidateIndex::empty();
    for query in ["hello", "", "anything at all"] {
        let ranking = index.find_best(query, 3);
        assert_eq!(
            select_ranking(&ranking, &Thresholds::default(), 3),
            Selection::NoData
        );
    }
    assert_eq!(select(&[], -1.0, 3), Selection::NoData);
}

#[test]
fn test_overlap_scores_are_integers() {
    let candidates = vec![
        ResponseCandidate::question_answer("What are your opening hours", "From 9 to 18"),
        ResponseCandidate::question_answer("How much does delivery cost", "Delivery is free"),
    ];
    let ranking = rank_by_overlap("delivery cost please", &candidates, 5);
    assert_eq!(ranking.first().map(|m| m.text.as_str()), Some("Delivery is free"));
    for m in &ranking {
        assert_eq!(m.score.fract(), 0.0);
        assert!(m.score >= 0.0);
    }

    let thresholds = Thresholds::default();
    assert_eq!(
        select_ranking(&overlap_ranking("opening hours today", &candidates, 3), &thresholds, 3),
        Selection::Answer(MatchResult::new("From 9 to 18", 2.0))
    );
    // Stop words alone never reach the keyword threshold
    assert!(matches!(
        select_ranking(&overlap_ranking("the and of", &candidates, 3), &thresholds, 3),
        Selection::Alternatives(_)
    ));
}
