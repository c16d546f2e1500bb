//! Retry policy for gateway calls

use std::time::Duration;

/// Exponential backoff policy applied to transient gateway failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts per operation, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter factor (0.0 - 1.0) randomizing delays so concurrent
    /// retries do not synchronize into a storm.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after `attempt` failed attempts (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32 - 1);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let jitter = 1.0 + (rand::random::<f64>() - 0.5) * 2.0 * self.jitter;
        let final_ms = delay_ms * jitter;

        Duration::from_millis(final_ms.max(0.0) as u64)
    }
}
