//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for the generation API.
//! It stops calling the API for a while after it failed repeatedly, so users
//! get an immediate "try later" answer instead of waiting for timeouts.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::llm_config::RecoveryConfig;

/// Circuit breaker for generation requests
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold reached, requests fail fast
/// - **Half-Open**: Reset timeout elapsed; the next request is let through
///
/// Uses `RecoveryConfig::circuit_breaker_threshold` (default: 5) and
/// `RecoveryConfig::circuit_breaker_reset_secs` (default: 60s).
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // A poisoned counter is still a valid counter
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the circuit is open (blocking requests)
    ///
    /// Resets to closed once the reset timeout has elapsed since the last
    /// failure.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs)
                {
                    return true;
                }
                info!("Circuit breaker reset after timeout");
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failed request
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        if state.failure_count == self.config.circuit_breaker_threshold {
            warn!(
                failures = state.failure_count,
                reset_secs = self.config.circuit_breaker_reset_secs,
                "Circuit breaker opened"
            );
        }
    }

    /// Record a successful request, closing the circuit
    pub fn record_success(&self) {
        *self.lock() = BreakerState::default();
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, reset_secs: u64) -> RecoveryConfig {
        RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: reset_secs,
            ..Default::default()
        }
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(config(3, 60));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_closes_circuit() {
        let breaker = CircuitBreaker::new(config(1, 60));
        breaker.record_failure();
        assert!(breaker.is_open());
        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_resets_after_timeout() {
        let breaker = CircuitBreaker::new(config(1, 0));
        breaker.record_failure();
        assert!(!breaker.is_open());
        assert_eq!(breaker.failure_count(), 0);
    }
}
