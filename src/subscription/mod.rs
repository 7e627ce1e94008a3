//! Subscriptions: records, the read-only repository contract, and per-request resolution.
//!
//! # Data Flow
//! ```text
//! request (user, ip, referer, verified CASA id)
//!     → resolver.rs (query each source concurrently)
//!     → repository.rs (read-only lookups, wrapped by resilience::GuardedRepository)
//!     → ordered Resolution cached on the request context
//! ```

pub mod repository;
pub mod resolver;
pub mod types;

pub use repository::{
    Dataset, InMemoryRepository, RepositoryError, RepositoryResult, SubscriptionRepository,
};
pub use resolver::{
    MatchSource, Resolution, ResolveQuery, ResolvedSubscription, SubscriptionResolver,
};
pub use types::{OrganisationId, Owner, Period, Scope, Subscription, SubscriptionId, UserId};
