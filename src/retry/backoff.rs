//! Exponential backoff policy for node retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff/attempt-budget policy. Defaults match the engine's documented
/// behavior: 3 retries after the initial attempt, 1s initial delay,
/// doubling, capped at 30s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry attempt `k` (0-indexed): `min(initial * mult^k, max)`.
    pub fn delay_for_attempt(&self, k: u32) -> Duration {
        let ms = self.initial_delay_ms as f64 * self.multiplier.powi(k as i32);
        let ms = ms.min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }

    /// Total attempts made, including the initial one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
