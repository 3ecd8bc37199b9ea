//! Bounded retry loop with fixed exponential backoff.
//!
//! The loop is generic over the attempt and the sleep so the schedule can be
//! driven without a network or a real clock.

use std::future::Future;
use std::time::Duration;

use crate::{KaldraError, Result};

/// Backoff schedule for one logical call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: usize,
    /// Delay before the first retry, doubled for each subsequent one.
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, backoff_base_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_base_ms,
        }
    }

    /// Delay inserted after the failed attempt at `attempt_index` (0-based).
    ///
    /// `backoff_base_ms * 2^attempt_index`, no jitter. Saturates at
    /// `u64::MAX` milliseconds once the product no longer fits.
    pub fn delay_for(&self, attempt_index: usize) -> Duration {
        let multiplier = u32::try_from(attempt_index)
            .ok()
            .and_then(|exp| 1u64.checked_shl(exp))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(multiplier))
    }

    pub fn total_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }
}

/// Runs `attempt` until it succeeds or the policy is exhausted.
///
/// `attempt` receives the 0-based attempt index. Non-retryable failures
/// (e.g. [`KaldraError::InvalidInput`]) return immediately. When every attempt
/// fails the last failure is wrapped in [`KaldraError::MaxRetriesExceeded`].
pub async fn run<T, A, AFut, S, SFut>(
    policy: RetryPolicy,
    label: &str,
    mut attempt: A,
    mut sleep: S,
) -> Result<T>
where
    A: FnMut(usize) -> AFut,
    AFut: Future<Output = Result<T>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let total = policy.total_attempts();
    let mut index = 0usize;
    loop {
        let err = match attempt(index).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        if index + 1 >= total {
            tracing::error!(
                request = label,
                attempts = total,
                error = %err,
                "request failed after all retry attempts"
            );
            return Err(KaldraError::MaxRetriesExceeded {
                attempts: total,
                last: Box::new(err),
            });
        }

        let delay = policy.delay_for(index);
        tracing::warn!(
            request = label,
            attempt = index + 1,
            attempts = total,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "request attempt failed, retrying"
        );
        sleep(delay).await;
        index += 1;
    }
}
