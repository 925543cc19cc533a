// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry policy for queued mutations, plus a bounded connect-retry helper.
//!
//! The drain loop never sleeps: a failed record is deferred by stamping a
//! future not-before timestamp and left `pending`, so the policy here only
//! computes delays and decides when the budget is exhausted.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

/// Retry budget and backoff schedule for one record.
///
/// Defaults match the outbox contract: 3 attempts, delay after the n-th failure
/// is `2^n` seconds (2 s, 4 s, then terminal).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts before a record is marked terminally failed
    pub max_attempts: u32,
    /// Base of the exponential schedule (delay = base * 2^(n-1))
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Whether a record that has now failed `retry_count` times is out of budget.
    #[must_use]
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_attempts
    }

    /// Delay to apply after the `retry_count`-th failure (1-based).
    ///
    /// With the default base this is `2^retry_count` seconds. Saturates rather
    /// than overflowing for absurd counts.
    #[must_use]
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_count.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// `backoff_delay` as an epoch-millis offset, for stamping not-before gates.
    #[must_use]
    pub fn backoff_ms(&self, retry_count: u32) -> i64 {
        self.backoff_delay(retry_count).as_millis() as i64
    }
}

/// Retry an async operation a fixed number of times with doubling delays.
///
/// Used for storage connects at startup, where failing fast on a bad
/// configuration beats hanging forever.
pub async fn retry_connect<F, Fut, T, E>(
    operation_name: &str,
    max_attempts: usize,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = Duration::from_millis(200);
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!("'{}' succeeded after {} retries", operation_name, attempts);
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(err);
                }
                warn!(
                    "'{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempts, max_attempts, err, delay
                );
                sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(2));
            }
        }
    }
}
