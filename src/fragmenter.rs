//! # Message Fragmenter
//!
//! Splits one reply into several shorter messages so the bot reads like a
//! person typing. Splitting prefers line breaks, then sentence boundaries,
//! then comma boundaries, then plain word counts. Random choices come from
//! the caller's `Rng`, so a seeded generator makes the output reproducible.
//!
//! Chunks are built from the words and lines of the input, so no
//! non-whitespace character is lost or added. The result is never empty.

use rand::Rng;
use tracing::trace;

/// Chunk sent when the reply has no visible content
pub const FALLBACK_CHUNK: &str = "ok";

/// Word count below which a message is considered short
pub const SHORT_MESSAGE_WORDS: usize = 8;
/// Word count from which a message is considered long
pub const LONG_MESSAGE_WORDS: usize = 15;

/// Tunable probabilities and piece counts
#[derive(Debug, Clone)]
pub struct FragmenterConfig {
    /// Chance that a reply of one or two lines stays one message
    pub keep_short_lines_merged: f64,
    /// Chance that three or more lines are sent in two-line bundles
    pub bundle_lines: f64,
    /// Chance that a short single-line reply is cut in half
    pub split_short_message: f64,
    /// Piece range for medium replies
    pub medium_pieces: (usize, usize),
    /// Piece range for long replies
    pub long_pieces: (usize, usize),
}

impl Default for FragmenterConfig {
    fn default() -> Self {
        Self {
            keep_short_lines_merged: 0.5,
            bundle_lines: 0.4,
            split_short_message: 0.3,
            medium_pieces: (2, 3),
            long_pieces: (2, 4),
        }
    }
}

/// Splits replies according to a `FragmenterConfig`
#[derive(Debug, Clone, Default)]
pub struct Fragmenter {
    config: FragmenterConfig,
}

impl Fragmenter {
    pub fn new(config: FragmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FragmenterConfig {
        &self.config
    }

    /// Split `text` into an ordered, non-empty list of non-empty chunks.
    pub fn split<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Vec<String> {
        let trimmed = text.trim();

        let chunks = if trimmed.contains('\n') {
            self.split_lines(trimmed, rng)
        } else {
            self.split_words(trimmed, rng)
        };

        let chunks: Vec<String> = chunks
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect();

        trace!(chunks = chunks.len(), "Fragmented reply");

        if chunks.is_empty() {
            vec![FALLBACK_CHUNK.to_string()]
        } else {
            chunks
        }
    }

    fn split_lines<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Vec<String> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        match lines.len() {
            0 => Vec::new(),
            1 => vec![lines[0].to_string()],
            2 => {
                if rng.gen_bool(self.config.keep_short_lines_merged) {
                    vec![lines.join("\n")]
                } else {
                    lines.iter().map(|line| line.to_string()).collect()
                }
            }
            _ => {
                if rng.gen_bool(self.config.bundle_lines) {
                    lines.chunks(2).map(|pair| pair.join("\n")).collect()
                } else {
                    lines.iter().map(|line| line.to_string()).collect()
                }
            }
        }
    }

    fn split_words<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let count = words.len();

        if count < SHORT_MESSAGE_WORDS {
            if count >= 2 && rng.gen_bool(self.config.split_short_message) {
                let (first, second) = words.split_at(count / 2);
                return vec![first.join(" "), second.join(" ")];
            }
            return vec![text.to_string()];
        }

        if count < LONG_MESSAGE_WORDS {
            let (low, high) = self.config.medium_pieces;
            let pieces = rng.gen_range(low..=high.max(low));
            split_at_boundaries(&words, pieces, 3)
        } else {
            let (low, high) = self.config.long_pieces;
            let pieces = rng.gen_range(low..=high.max(low));
            split_at_boundaries(&words, pieces, pieces)
        }
    }
}

/// Split with the default configuration
pub fn split_message<R: Rng + ?Sized>(text: &str, rng: &mut R) -> Vec<String> {
    Fragmenter::default().split(text, rng)
}

fn ends_sentence(word: &str) -> bool {
    word.ends_with(['.', '!', '?', '…'])
}

fn ends_clause(word: &str) -> bool {
    word.ends_with([',', ';', ':'])
}

/// Group consecutive words, closing a group after each word matching `is_end`
fn group_words<'a>(words: &[&'a str], is_end: fn(&str) -> bool) -> Vec<Vec<&'a str>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for word in words {
        current.push(*word);
        if is_end(word) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Sentences first, then clauses, then `raw_pieces` equal word runs
fn split_at_boundaries(words: &[&str], pieces: usize, raw_pieces: usize) -> Vec<String> {
    let sentences = group_words(words, ends_sentence);
    if sentences.len() >= 2 {
        return group_evenly(&sentences, pieces);
    }

    let clauses = group_words(words, ends_clause);
    if clauses.len() >= 2 {
        return group_evenly(&clauses, pieces);
    }

    let singles: Vec<Vec<&str>> = words.iter().map(|word| vec![*word]).collect();
    group_evenly(&singles, raw_pieces)
}

/// Merge `groups` into at most `target` contiguous, nearly equal bins
fn group_evenly(groups: &[Vec<&str>], target: usize) -> Vec<String> {
    let bins = target.clamp(1, groups.len().max(1));
    let base = groups.len() / bins;
    let extra = groups.len() % bins;

    let mut result = Vec::with_capacity(bins);
    let mut start = 0;
    for bin in 0..bins {
        let size = base + usize::from(bin < extra);
        let words: Vec<&str> = groups[start..start + size]
            .iter()
            .flatten()
            .copied()
            .collect();
        result.push(words.join(" "));
        start += size;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn compact(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_group_evenly_distributes_remainder_first() {
        let groups: Vec<Vec<&str>> = ["a", "b", "c", "d", "e"].iter().map(|w| vec![*w]).collect();
        assert_eq!(group_evenly(&groups, 2), vec!["a b c", "d e"]);
        assert_eq!(group_evenly(&groups, 10), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_group_words_keeps_trailing_words() {
        let words = ["One.", "Two", "three!", "four"];
        let groups = group_words(&words, ends_sentence);
        assert_eq!(groups, vec![vec!["One."], vec!["Two", "three!"], vec!["four"]]);
    }

    #[test]
    fn test_empty_input_yields_fallback() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(split_message("   \n  ", &mut rng), vec![FALLBACK_CHUNK]);
        assert_eq!(split_message("", &mut rng), vec![FALLBACK_CHUNK]);
    }

    #[test]
    fn test_medium_message_always_splits() {
        let text = "I checked the order. It left the warehouse today, arriving soon.";
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chunks = split_message(text, &mut rng);
            assert!((2..=3).contains(&chunks.len()), "seed {seed}: {chunks:?}");
            assert_eq!(compact(&chunks.concat()), compact(text));
        }
    }

    #[test]
    fn test_medium_message_prefers_sentences() {
        let text = "Thanks for waiting. The parcel is packed and ships tomorrow morning.";
        let mut rng = StdRng::seed_from_u64(7);
        let chunks = split_message(text, &mut rng);
        assert_eq!(
            chunks,
            vec!["Thanks for waiting.", "The parcel is packed and ships tomorrow morning."]
        );
    }

    #[test]
    fn test_long_message_without_punctuation_splits_by_words() {
        let text = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen";
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chunks = split_message(text, &mut rng);
            assert!((2..=4).contains(&chunks.len()));
            assert_eq!(chunks.join(" "), text);
        }
    }

    #[test]
    fn test_custom_config_never_merges_lines() {
        let fragmenter = Fragmenter::new(FragmenterConfig {
            keep_short_lines_merged: 0.0,
            bundle_lines: 0.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(fragmenter.split("a\nb", &mut rng), vec!["a", "b"]);
        assert_eq!(fragmenter.split("a\n\nb\nc", &mut rng), vec!["a", "b", "c"]);
        assert_eq!(fragmenter.config().split_short_message, 0.3);
    }
}
