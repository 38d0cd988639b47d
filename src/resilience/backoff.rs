//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Upper bound of the jitter, as a fraction of the exponential delay.
pub const JITTER_RATIO: f64 = 0.2;

/// Source of the uniform jitter sample in `[0, 1)`.
pub trait JitterSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Constant jitter sample, for deterministic delays.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Calculate the delay before retrying after attempt `attempt` (zero-based).
///
/// `delay = min(base * 2^attempt + jitter, max)` where
/// `jitter = sample * JITTER_RATIO * base * 2^attempt` and `sample ∈ [0, 1)`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, sample: f64) -> Duration {
    let exponential = base_ms as f64 * 2f64.powi(attempt.min(62) as i32);
    let jitter = exponential * JITTER_RATIO * sample.clamp(0.0, 1.0);
    let capped = (exponential + jitter).min(max_ms as f64);
    Duration::from_millis(capped.floor() as u64)
}
