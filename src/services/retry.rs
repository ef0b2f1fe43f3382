//! Retry executor for transactional units of work.
//!
//! A unit of work begins a transaction, does its reads and writes and
//! commits. When it fails, the whole unit runs again (fresh reads included)
//! after a linear backoff, up to a fixed number of attempts.
//!
//! Failures are not classified: a deterministic business failure such as
//! `NotFound` is retried just like a serialization conflict and simply
//! fails the same way each time. The last failure is returned unchanged.

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt limit and backoff step for [`RetryPolicy::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait after failed attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

    /// Default attempt limit with a custom backoff step.
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay,
        }
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `work` until it succeeds or the attempts are used up.
    ///
    /// If `cancel` fires before an attempt starts or while waiting between
    /// attempts, returns `AppError::Cancelled` immediately, not the last
    /// business error. An attempt that has started runs to completion.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut work: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.delay_after(attempt - 1);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        log::debug!("[retry] {} cancelled while backing off", operation);
                        return Err(AppError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            } else if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            match work().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if err.is_transient() {
                        log::warn!(
                            "[retry] {} attempt {}/{} failed: {}",
                            operation,
                            attempt,
                            max_attempts,
                            err
                        );
                    } else {
                        log::debug!(
                            "[retry] {} attempt {}/{} failed: {}",
                            operation,
                            attempt,
                            max_attempts,
                            err
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::internal("retry loop ran no attempts")))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }
}
