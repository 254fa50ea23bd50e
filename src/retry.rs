//! Bounded retry for upstream fetches
//!
//! Attempts are strictly sequential with a fixed delay between them. The delay
//! defaults to the call's pacing delay so that retries never outrun the
//! upstream rate limit.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, warn};

use crate::error::{Result, RetrievalError};

/// Attempt ceiling used by the identifier-record fetch
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Classification of errors for the retry loop
pub trait RetryableError {
    /// Whether another attempt could plausibly succeed
    fn is_retryable(&self) -> bool;

    /// Short human-readable reason used in diagnostics
    fn retry_reason(&self) -> &str;
}

/// Retry policy shared by every adapter that retries
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Fixed delay between attempts; `None` uses the call's pacing delay
    pub delay: Option<Duration>,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay to wait between attempts for a call paced at `pacing`
    pub fn effective_delay(&self, pacing: Duration) -> Duration {
        self.delay.unwrap_or(pacing)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: None,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached.
///
/// Exhausting the ceiling on transient errors yields
/// [`RetrievalError::RetriesExhausted`]; a non-retryable error is returned as-is.
pub async fn with_retry<T, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    delay: Duration,
    context: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let attempts = AtomicU32::new(0);

    let strategy = FixedInterval::new(delay).take(max_attempts as usize - 1);

    let result = RetryIf::spawn(
        strategy,
        || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(attempt, max_attempts, "{context}: attempt");
            operation()
        },
        |err: &RetrievalError| {
            let retry = err.is_retryable();
            if retry {
                debug!(
                    attempt = attempts.load(Ordering::Relaxed),
                    reason = err.retry_reason(),
                    error = %err,
                    "{context}: transient failure"
                );
            }
            retry
        },
    )
    .await;

    let made = attempts.load(Ordering::Relaxed);
    match result {
        Ok(value) => {
            if made > 1 {
                debug!(attempts = made, "{context}: succeeded after retrying");
            }
            Ok(value)
        }
        Err(err) if err.is_retryable() => {
            warn!(attempts = made, error = %err, "{context}: giving up");
            Err(RetrievalError::RetriesExhausted {
                context: context.to_string(),
                attempts: made,
            })
        }
        Err(err) => Err(err),
    }
}
