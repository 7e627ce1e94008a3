//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Lookup against the repository or the nonce store:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On failure: retries.rs (retry if the error may clear, with backoff.rs delay)
//!     → guarded.rs wraps a whole repository with both
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Exhausted retries surface as errors and the engine denies access

pub mod backoff;
pub mod guarded;
pub mod retries;
pub mod timeouts;

pub use guarded::GuardedRepository;
pub use retries::{retry_read, RetryPolicy};
pub use timeouts::{with_deadline, DeadlineExceeded};
