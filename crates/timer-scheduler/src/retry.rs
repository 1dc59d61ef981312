//! Retry delay computation.
//!
//! Exponential delays are produced by `backoff::ExponentialBackoff` with
//! randomization disabled, so the same attempt always waits the same time.
//! The backoff is seeded at the interval for the requested attempt, which
//! keeps the cost independent of the attempt number.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use timer_types::{BackoffKind, RetryPolicy};

/// Delay before retry number `attempt` (1-based).
pub fn retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    match policy.backoff {
        BackoffKind::Fixed { delay_ms } => Duration::from_millis(delay_ms),
        BackoffKind::Exponential {
            initial_ms,
            multiplier,
            max_ms,
        } => {
            let initial = Duration::from_millis(initial_ms);
            let max = Duration::from_millis(max_ms);

            // initial * multiplier^(attempt - 1), capped at max
            let exponent = i32::try_from(attempt.max(1) - 1).unwrap_or(i32::MAX);
            let scaled = initial_ms as f64 * multiplier.powi(exponent);
            let current = if scaled.is_finite() && scaled < max_ms as f64 {
                Duration::from_millis(scaled as u64)
            } else {
                max
            };

            let mut backoff = ExponentialBackoff {
                current_interval: current,
                initial_interval: initial,
                randomization_factor: 0.0,
                multiplier,
                max_interval: max,
                max_elapsed_time: None,
                ..Default::default()
            };
            backoff.next_backoff().unwrap_or(max).min(max)
        }
    }
}
