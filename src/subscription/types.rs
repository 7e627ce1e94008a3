//! Subscription records.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::content::types::{CollectionId, Journal, JournalId};
use crate::security::ip_range::IpRange;
use crate::security::referer::RefererPattern;

/// Subscription identifier. Lower ids were created first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganisationId(pub u64);

/// Who holds the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Owner {
    Individual { user: UserId },
    Institutional { organisation: OrganisationId },
}

/// Which journals the subscription opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Journals { journals: BTreeSet<JournalId> },
    /// A basket's journals, resolved when the record is loaded.
    Basket { basket: u64, journals: BTreeSet<JournalId> },
    Collection { collection: CollectionId },
}

/// Inclusive validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// A grant of access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: Owner,
    pub scope: Scope,
    #[serde(default)]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub ip_ranges: Vec<IpRange>,
    #[serde(default)]
    pub referers: Vec<RefererPattern>,
    /// Reporting only.
    #[serde(default)]
    pub sponsor: Option<OrganisationId>,
}

impl Subscription {
    /// True iff `today` falls within at least one period. Periods may overlap.
    pub fn is_ongoing(&self, today: NaiveDate) -> bool {
        self.periods.iter().any(|p| p.contains(today))
    }

    pub fn provides_access_to(&self, journal: &Journal) -> bool {
        match &self.scope {
            Scope::Journals { journals } | Scope::Basket { journals, .. } => {
                journals.contains(&journal.id)
            }
            Scope::Collection { collection } => journal.collection == *collection,
        }
    }

    pub fn is_institutional(&self) -> bool {
        matches!(self.owner, Owner::Institutional { .. })
    }

    pub fn matches_referer(&self, candidate: &str) -> bool {
        self.referers.iter().any(|pattern| pattern.matches(candidate))
    }
}
