//! Bounded retry with linear backoff.
//!
//! [`RetryPolicy`] describes *how often* and *how long to wait*;
//! [`retry_with_policy`] runs an async operation under that policy. Call
//! sites only supply the operation.
//!
//! ```rust
//! use std::time::Duration;
//! use documind::retry::RetryPolicy;
//!
//! // 1 initial attempt + 2 retries, waiting 1 s then 2 s.
//! let policy = RetryPolicy::with_retries(2, Duration::from_secs(1));
//! assert_eq!(policy.max_attempts, 3);
//! assert_eq!(policy.backoff(1), Duration::from_secs(1));
//! assert_eq!(policy.backoff(2), Duration::from_secs(2));
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; never less than 1.
    pub max_attempts: u32,
    /// Delay unit; the wait after the n-th failure is `n * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn with_retries(retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            base_delay,
        }
    }

    /// Wait applied after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. The last error is returned
/// unchanged when every attempt fails.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                log::warn!("{label}: giving up after {attempt} attempt(s): {e}");
                return Err(e);
            }
            Err(e) => {
                let wait = policy.backoff(attempt);
                log::warn!("{label}: attempt {attempt} failed ({e}), retrying in {wait:?}");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
