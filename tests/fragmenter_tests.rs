//! # Fragmenter and Typing Tests
//!
//! Chunking guarantees of the fragmenter and the timing bounds of the
//! typing simulator, checked across many seeds.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use replybot::fragmenter::{split_message, Fragmenter, FragmenterConfig, FALLBACK_CHUNK};
use replybot::typing::{plan_typing, TypingConfig};

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

const SAMPLES: &[&str] = &[
    "hi",
    "Sure, I can help with that!",
    "Your order was shipped yesterday and should arrive in about three days.",
    "First line\nSecond line",
    "Hello.\nHow are you?\nGreat day!\nSee you soon.",
    "We open at nine, close at six, and on Sundays we rest. Call us any time before that! Or write here, we answer quickly.",
    "   padded   text   ",
    "Привет! Как дела? Всё хорошо, спасибо, а у тебя?",
];

#[test]
fn test_chunks_are_non_empty_and_preserve_content() {
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        for text in SAMPLES {
            let chunks = split_message(text, &mut rng);
            assert!(!chunks.is_empty());
            assert!(chunks.iter().all(|c| !c.trim().is_empty()), "{chunks:?}");
            assert_eq!(compact(&chunks.concat()), compact(text), "seed {seed}");
        }
    }
}

#[test]
fn test_whitespace_only_input_yields_fallback_chunk() {
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(split_message(" \n\t ", &mut rng), vec![FALLBACK_CHUNK]);
}

#[test]
fn test_short_sentence_without_split_is_single_trimmed_chunk() {
    let fragmenter = Fragmenter::new(FragmenterConfig {
        split_short_message: 0.0,
        ..Default::default()
    });
    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        assert_eq!(
            fragmenter.split("  Thanks, see you tomorrow!  ", &mut rng),
            vec!["Thanks, see you tomorrow!"]
        );
    }
}

#[test]
fn test_three_lines_are_single_or_bundled() {
    let text = "Hello.\nHow are you?\nGreat day!";
    let lines: Vec<&str> = text.lines().collect();
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let chunks = split_message(text, &mut rng);
        assert!((2..=3).contains(&chunks.len()), "seed {seed}: {chunks:?}");

        let rebuilt: Vec<&str> = chunks.iter().flat_map(|c| c.lines()).collect();
        assert_eq!(rebuilt, lines);
    }
}

#[test]
fn test_same_seed_same_chunks() {
    let text = SAMPLES[5];
    let a = split_message(text, &mut StdRng::seed_from_u64(42));
    let b = split_message(text, &mut StdRng::seed_from_u64(42));
    assert_eq!(a, b);
}

#[test]
fn test_typing_duration_bounds() {
    let config = TypingConfig::default();
    let short = "0123456789";
    let long = "x".repeat(500);
    for seed in 0..50 {
        let mut rng = StdRng::seed_from_u64(seed);
        let duration = config.typing_duration(short, &mut rng);
        assert!(duration >= Duration::from_secs_f64(1.5));
        assert!(duration <= Duration::from_secs(12));
        assert_eq!(config.typing_duration(&long, &mut rng), Duration::from_secs(12));
    }
}

#[test]
fn test_plan_follows_fragmented_chunks() {
    let config = TypingConfig::default();
    let mut rng = StdRng::seed_from_u64(9);
    let chunks = split_message(SAMPLES[5], &mut rng);
    let plan = plan_typing(&config, &chunks, &mut rng);

    assert_eq!(plan.chunks.len(), chunks.len());
    for (timing, text) in plan.chunks.iter().zip(&chunks) {
        assert_eq!(&timing.text, text);
        assert!(timing.indicators >= 1);
    }
    assert!(plan.chunks.last().is_some_and(|c| c.pause_after.is_none()));
    assert!(plan.initial_delay >= Duration::from_secs(1));
    assert!(plan.total_duration() > plan.initial_delay);
}
