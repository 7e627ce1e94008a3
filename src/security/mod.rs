//! Security subsystem: the pure matchers behind access resolution.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (forwarded-for / peer / staff override)
//!     → ip_range.rs (institutional range membership)
//!     → referer.rs (institutional referer prefix match)
//!     → ticket.rs (prepublication ticket check)
//! ```
//!
//! # Design Decisions
//! - Fail closed: anything unparsable is a non-match
//! - No trust in client input beyond what is matched here

pub mod client_ip;
pub mod ip_range;
pub mod referer;
pub mod ticket;

pub use ip_range::{IpRange, RangeError};
pub use referer::{RefererPattern, RefererSource};
pub use ticket::TicketSigner;
