//! Retry backoff for upload jobs.

use std::time::Duration;

use rand::Rng;

/// Delay before the first retry.
pub const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Upper bound on any single retry delay.
pub const BACKOFF_CAP: Duration = Duration::from_secs(300);

/// Default number of delivery attempts before a job is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Exponential backoff for the retry following attempt number `attempt`
/// (1-based): `base * 2^(attempt - 1)`, capped at [`BACKOFF_CAP`].
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    BACKOFF_BASE
        .saturating_mul(1u32 << exponent)
        .min(BACKOFF_CAP)
}

/// Add up to 10% random jitter so retries of a failed batch spread out.
pub fn with_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = (delay.as_millis() / 10) as u64;
    if max_jitter_ms == 0 {
        return delay;
    }
    let jitter = rand::rng().random_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter)
}

/// Whether another attempt is allowed after `attempts` deliveries.
pub fn should_retry(attempts: i32, max_attempts: i32) -> bool {
    attempts < max_attempts
}
