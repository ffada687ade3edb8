//! Keyword-overlap matching for question/answer datasets.
//!
//! The score is the size of the intersection between the query keyword set
//! and the candidate keyword set. It is an integer and is not normalized.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use super::{rank_scored, MatchResult, MatcherKind, Ranking, ResponseCandidate};

/// Keywords shorter than this (in characters) are ignored
pub const MIN_KEYWORD_CHARS: usize = 3;

lazy_static! {
    static ref PUNCTUATION_REGEX: Regex =
        Regex::new(r"[^\w\s]").expect("Punctuation pattern should be valid");
    static ref STOP_WORDS: HashSet<&'static str> = [
        // Russian
        "и", "в", "не", "что", "он", "на", "я", "с", "как", "а", "то", "она", "но", "да", "ты",
        "к", "у", "же", "вы", "за", "бы", "по", "мне", "было", "от", "меня", "нет", "о", "из",
        "ему", "когда", "даже", "ну", "ли", "уже", "или", "быть", "был", "до", "вас", "сказал",
        "там", "потом", "себя", "ей", "может", "они", "тут", "где", "есть", "надо", "для", "мы",
        "их", "чем", "была", "сам", "чтоб", "без", "будто", "чего", "раз", "тоже", "себе", "под",
        "жизнь", "будет", "тогда", "кто", "этот", "говорил", "того", "потому", "этого", "какой",
        "совсем", "ним", "здесь", "этом", "один", "почти", "мой", "тем", "чтобы", "нее",
        "кажется", "сейчас", "были", "куда", "зачем", "сказать", "всех", "никогда", "сегодня",
        "можно", "при", "наконец", "два", "об", "другой", "хоть", "после", "над", "больше", "тот",
        "через", "эти", "нас", "про", "всего", "них", "какая", "много", "разве", "сказала", "три",
        "эту", "моя", "перед", "иногда", "лучше", "чуть", "том", "нельзя", "такой", "им", "более",
        "всегда", "конечно", "всю", "между",
        // English
        "the", "and", "for", "are", "but", "not", "you", "your", "with", "this", "that", "have",
        "from", "was", "were", "what", "when", "where", "which", "who", "why", "how", "can",
        "could", "would", "should", "will", "about", "there", "their", "they", "them", "then",
        "than", "does", "did", "has", "had", "any", "all", "our", "out", "its", "into",
    ]
    .into_iter()
    .collect();
}

/// Lowercase keywords of `text`, stop words and short tokens removed.
///
/// Order follows the text; duplicates are kept.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = PUNCTUATION_REGEX.replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Number of distinct keywords shared by `query_keywords` and the candidate
pub fn overlap_score(query_keywords: &HashSet<String>, candidate: &ResponseCandidate) -> usize {
    let candidate_keywords: HashSet<String> = if candidate.keywords.is_empty() {
        extract_keywords(&candidate.text).into_iter().collect()
    } else {
        candidate.keywords.iter().cloned().collect()
    };
    query_keywords.intersection(&candidate_keywords).count()
}

/// Rank candidates by keyword overlap; scores are whole numbers
pub fn rank_by_overlap(
    query: &str,
    candidates: &[ResponseCandidate],
    limit: usize,
) -> Vec<MatchResult> {
    let query_keywords: HashSet<String> = extract_keywords(query).into_iter().collect();
    let scored = candidates
        .iter()
        .map(|candidate| {
            MatchResult::new(
                candidate.reply(),
                overlap_score(&query_keywords, candidate) as f64,
            )
        })
        .collect();
    rank_scored(scored, limit)
}

/// Overlap ranking tagged for the selector; ties keep dataset order
pub fn overlap_ranking(query: &str, candidates: &[ResponseCandidate], limit: usize) -> Ranking {
    Ranking {
        kind: MatcherKind::KeywordOverlap,
        matches: rank_by_overlap(query, candidates, limit),
    }
}
