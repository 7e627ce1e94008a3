//! Content metadata and embargo computation.
//!
//! # Data Flow
//! ```text
//! repository (journal + issue metadata)
//!     → types.rs (Journal, Issue, Article, ContentItem)
//!     → embargo.rs (EmbargoCalculator: embargoed today?)
//!     → access decision
//! ```
//!
//! # Design Decisions
//! - Embargo is always computed, never trusted from storage
//! - Missing data embargoes the item and reports a warning instead of failing

pub mod embargo;
pub mod types;

pub use embargo::{DataQualityWarning, EmbargoCalculator, EmbargoStatus};
pub use types::{Article, CollectionId, ContentItem, Issue, Journal, JournalId, JournalType};
