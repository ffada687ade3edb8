//! Sequence-similarity ratio.
//!
//! `ratio = 2 * M / T` where `M` is the number of characters covered by the
//! recursively found longest matching blocks and `T` is the combined length
//! of both strings. Comparison is case-insensitive.

use std::collections::HashMap;

use super::{rank_scored, MatchResult, ResponseCandidate};

/// Similarity of two strings in `[0, 1]`; two empty strings are identical.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, ch) in b.iter().enumerate() {
        b2j.entry(*ch).or_default().push(j);
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = find_longest_match(a, &b2j, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common block in `a[alo..ahi]` x `b[blo..bhi]`; earliest wins ties.
fn find_longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_lengths = HashMap::new();
        if let Some(positions) = b2j.get(ch) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let run = j
                    .checked_sub(1)
                    .and_then(|prev| run_lengths.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_lengths.insert(j, run);
                if run > best_size {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_size = run;
                }
            }
        }
        run_lengths = next_lengths;
    }

    (best_i, best_j, best_size)
}

/// Rank candidates by sequence ratio against their matching text
pub fn rank_by_sequence(
    query: &str,
    candidates: &[ResponseCandidate],
    limit: usize,
) -> Vec<MatchResult> {
    let scored = candidates
        .iter()
        .map(|candidate| MatchResult::new(candidate.reply(), sequence_ratio(query, &candidate.text)))
        .collect();
    rank_scored(scored, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(sequence_ratio("Hello", "hello"), 1.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
    }

    #[test]
    fn test_disjoint_strings() {
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_known_ratio() {
        // "abcd" vs "bcde": block "bcd" → 2*3/8
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        // "how r u" vs "how are you": "how " + "r" + " " + "u" = 7 → 14/18
        assert!((sequence_ratio("how r u", "how are you") - 14.0 / 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_handles_multibyte_text() {
        let ratio = sequence_ratio("привет", "привет мир");
        assert!((ratio - 12.0 / 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_by_sequence_orders_descending() {
        let candidates = vec![
            ResponseCandidate::plain("goodbye"),
            ResponseCandidate::plain("good morning"),
            ResponseCandidate::plain("good morning!"),
        ];
        let ranked = rank_by_sequence("good morning", &candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "good morning");
        assert!(ranked[0].score >= ranked[1].score);
    }
}
