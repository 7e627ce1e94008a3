//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Every repository and counter-store call has a deadline
//! - An elapsed deadline is reported as its own error, never as "not found"

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline elapsed before the call completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {} ms exceeded", .0.as_millis())]
pub struct DeadlineExceeded(pub Duration);

/// Run `fut` with a deadline.
pub async fn with_deadline<F: Future>(
    limit: Duration,
    fut: F,
) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeadlineExceeded(limit))
}
