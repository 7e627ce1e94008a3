//! Access resolution.
//!
//! # Data Flow
//! ```text
//! RequestInfo (user, ip, referer, casa token, ticket)
//!     → engine.rs (verify CASA, resolve subscriptions once)
//!     → context.rs (RequestContext cached for the request)
//!     → decision.rs (ticket → embargo → subscription → deny), per item
//!     → AccessResult
//! ```
//!
//! # Design Decisions
//! - Every failure path denies; a degraded resolution is reported, never granted
//! - The engine is immutable; config reload swaps in a new one

pub mod context;
pub mod decision;
pub mod engine;
pub mod report;

pub use context::{RequestContext, RequestInfo, UserIdentity};
pub use decision::{AccessDecision, AccessResult, DenialReason, Justification, Surface};
pub use engine::AccessEngine;
pub use report::{IssueRestriction, RestrictionsReport};
