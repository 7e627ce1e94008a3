//! Retry logic for store lookups.
//!
//! # Responsibilities
//! - Retry only errors that may clear (timeouts, outages)
//! - Wait a jittered exponential backoff between attempts
//! - Bound total attempts so a request never outlives its deadline by much
//!
//! # Design Decisions
//! - Lookups are reads, so every attempt is safe to repeat
//! - Exhausted retries return the last error; the caller fails closed

use std::future::Future;
use std::time::Duration;

use crate::config::RepositoryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::BackoffSchedule;
use crate::resilience::timeouts::with_deadline;
use crate::subscription::repository::{RepositoryError, RepositoryResult};

/// Attempt budget and per-attempt deadline.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub call_timeout: Duration,
    pub backoff: BackoffSchedule,
}

impl RetryPolicy {
    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            backoff: BackoffSchedule::new(config.backoff_base_ms, config.backoff_max_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RepositoryConfig::default())
    }
}

/// Run `op` under the policy's deadline, retrying retryable failures.
pub async fn retry_read<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> RepositoryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RepositoryResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match with_deadline(policy.call_timeout, op()).await {
            Ok(result) => result,
            Err(elapsed) => Err(RepositoryError::Timeout(elapsed.0.as_millis() as u64)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                metrics::record_repository_error(operation, err.kind());
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    tracing::warn!(operation, attempt, error = %err, "Repository call failed");
                    return Err(err);
                }
                let delay = policy.backoff.delay(attempt);
                tracing::debug!(
                    operation,
                    attempt,
                    delay = ?delay,
                    error = %err,
                    "Retrying repository call"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
