//! # Typing Simulator
//!
//! Computes how long each chunk should "type" before it is sent, how often
//! the typing indicator is refreshed, and the pauses around chunks. All
//! functions are pure; the delivery runner performs the actual waiting.

use std::time::Duration;

use rand::Rng;

/// Chunks up to this many characters type at the fast rate
pub const SHORT_CHUNK_CHARS: usize = 20;
/// Seconds of typing budget covered by one indicator signal
pub const INDICATOR_INTERVAL_SECS: f64 = 4.0;

/// Typing cadence settings, all values in seconds
#[derive(Debug, Clone)]
pub struct TypingConfig {
    pub short_per_char: (f64, f64),
    pub long_per_char: (f64, f64),
    pub min_duration: f64,
    pub max_duration: f64,
    pub initial_delay: (f64, f64),
    pub short_pause: (f64, f64),
    pub long_pause: (f64, f64),
    /// Chunks longer than this (characters) get the long pause after them
    pub long_pause_chars: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            short_per_char: (0.15, 0.25),
            long_per_char: (0.25, 0.4),
            min_duration: 1.5,
            max_duration: 12.0,
            initial_delay: (1.0, 3.0),
            short_pause: (0.5, 1.5),
            long_pause: (1.5, 3.5),
            long_pause_chars: 60,
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (low, high): (f64, f64)) -> f64 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}

impl TypingConfig {
    /// Typing time for `text`, clamped to `[min_duration, max_duration]`
    pub fn typing_duration<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Duration {
        let chars = text.chars().count();
        let per_char = if chars <= SHORT_CHUNK_CHARS {
            uniform(rng, self.short_per_char)
        } else {
            uniform(rng, self.long_per_char)
        };
        let seconds = (chars as f64 * per_char).clamp(self.min_duration, self.max_duration);
        Duration::from_secs_f64(seconds)
    }

    /// Delay between receiving a message and starting to type
    pub fn initial_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs_f64(uniform(rng, self.initial_delay))
    }

    /// Pause after `text` was sent and before the next chunk starts typing
    pub fn pause_after<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Duration {
        let range = if text.chars().count() > self.long_pause_chars {
            self.long_pause
        } else {
            self.short_pause
        };
        Duration::from_secs_f64(uniform(rng, range))
    }
}

/// Number of typing signals for a typing budget, at least one
pub fn indicator_count(duration: Duration) -> usize {
    let count = (duration.as_secs_f64() / INDICATOR_INTERVAL_SECS).ceil() as usize;
    count.max(1)
}

/// Timing for one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTiming {
    pub text: String,
    pub typing: Duration,
    pub indicators: usize,
    /// Pause before the next chunk; `None` for the last chunk
    pub pause_after: Option<Duration>,
}

impl ChunkTiming {
    /// Even spacing between indicator signals
    pub fn indicator_spacing(&self) -> Duration {
        self.typing / self.indicators.max(1) as u32
    }
}

/// Full timing plan for one reply
#[derive(Debug, Clone, PartialEq)]
pub struct TypingPlan {
    pub initial_delay: Duration,
    pub chunks: Vec<ChunkTiming>,
}

impl TypingPlan {
    /// Sum of all delays in the plan
    pub fn total_duration(&self) -> Duration {
        self.chunks.iter().fold(self.initial_delay, |acc, chunk| {
            acc + chunk.typing + chunk.pause_after.unwrap_or_default()
        })
    }
}

/// Plan the timing for `chunks` in order
pub fn plan_typing<R: Rng + ?Sized>(
    config: &TypingConfig,
    chunks: &[String],
    rng: &mut R,
) -> TypingPlan {
    let initial_delay = config.initial_delay(rng);
    let last = chunks.len().saturating_sub(1);

    let chunks = chunks
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let typing = config.typing_duration(text, rng);
            let pause_after = (i < last).then(|| config.pause_after(text, rng));
            ChunkTiming {
                text: text.clone(),
                typing,
                indicators: indicator_count(typing),
                pause_after,
            }
        })
        .collect();

    TypingPlan {
        initial_delay,
        chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_short_text_duration_bounds() {
        let config = TypingConfig::default();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let secs = config.typing_duration("0123456789", &mut rng).as_secs_f64();
            assert!((1.5..=12.0).contains(&secs), "{secs}");
        }
    }

    #[test]
    fn test_long_text_is_clamped() {
        let config = TypingConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        let text = "x".repeat(500);
        assert_eq!(config.typing_duration(&text, &mut rng), Duration::from_secs(12));
    }

    #[test]
    fn test_empty_text_uses_minimum() {
        let config = TypingConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(config.typing_duration("", &mut rng), Duration::from_secs_f64(1.5));
    }

    #[test]
    fn test_indicator_count() {
        assert_eq!(indicator_count(Duration::from_secs_f64(1.5)), 1);
        assert_eq!(indicator_count(Duration::from_secs(4)), 1);
        assert_eq!(indicator_count(Duration::from_secs_f64(4.1)), 2);
        assert_eq!(indicator_count(Duration::from_secs(12)), 3);
    }

    #[test]
    fn test_plan_has_no_pause_after_last_chunk() {
        let config = TypingConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        let chunks = vec!["first".to_string(), "a much longer second chunk of text".to_string()];
        let plan = plan_typing(&config, &chunks, &mut rng);

        assert_eq!(plan.chunks.len(), 2);
        assert!(plan.chunks[0].pause_after.is_some());
        assert!(plan.chunks[1].pause_after.is_none());
        assert!(plan.total_duration() >= plan.initial_delay + plan.chunks[0].typing);
        assert!(plan.chunks[0].indicator_spacing() <= plan.chunks[0].typing);
    }
}
