//! Retry with exponential backoff and jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// How many times to try an operation and how long to wait in between.
///
/// The wait after failed attempt `n` (zero based) is
/// `base_delay * 2^n` plus a uniform jitter in `[0, max_jitter)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_jitter: Duration::from_secs(1),
        }
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// A policy that runs the operation exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Un-jittered wait after failed attempt `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }

    /// Attempts actually made before giving up.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// Every error is treated as retryable. The last error is returned once all
/// attempts have failed.
pub async fn run_with_retry<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    warn!("{} failed after {} attempt(s): {}", operation, attempt, e);
                    return Err(e);
                }

                let wait = policy.delay_for(attempt - 1) + policy.jitter();
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation, attempt, attempts, e, wait
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
