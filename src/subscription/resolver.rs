//! Subscription resolution for one request.
//!
//! # Responsibilities
//! - Gather candidates from every source the request carries
//! - Keep only ongoing subscriptions
//! - Order by [`MatchSource`], then repository order, first occurrence wins
//!
//! # Design Decisions
//! - Sources are queried concurrently; a failing source degrades the
//!   resolution instead of failing it, and the failure is never read as "no match"

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::observability::metrics;
use crate::security::ip_range::find_matching_subscriptions;
use crate::subscription::repository::{RepositoryResult, SubscriptionRepository};
use crate::subscription::types::{Owner, Subscription, SubscriptionId, UserId};

/// How a subscription was matched. Declaration order is precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    IpRange,
    Referer,
    Individual,
    Casa,
}

impl MatchSource {
    pub const ALL: [MatchSource; 4] = [
        MatchSource::IpRange,
        MatchSource::Referer,
        MatchSource::Individual,
        MatchSource::Casa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::IpRange => "ip_range",
            MatchSource::Referer => "referer",
            MatchSource::Individual => "individual",
            MatchSource::Casa => "casa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubscription {
    pub subscription: Subscription,
    pub source: MatchSource,
}

/// Ordered, deduplicated subscriptions for one request.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub subscriptions: Vec<ResolvedSubscription>,
    /// At least one source failed to answer.
    pub degraded: bool,
}

/// What the request offers for matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveQuery<'a> {
    pub user: Option<UserId>,
    pub ip: Option<IpAddr>,
    pub referer: Option<&'a str>,
    pub casa: Option<SubscriptionId>,
}

#[derive(Clone)]
pub struct SubscriptionResolver {
    repository: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionResolver {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn resolve(&self, query: &ResolveQuery<'_>, today: NaiveDate) -> Resolution {
        let (by_ip, by_referer, individual, casa) = tokio::join!(
            self.by_ip(query.ip, today),
            self.by_referer(query.referer, today),
            self.individual(query.user, today),
            self.casa(query.casa),
        );

        let mut resolution = Resolution::default();
        let mut seen = HashSet::new();
        let groups = [by_ip, by_referer, individual, casa];

        for (source, group) in MatchSource::ALL.into_iter().zip(groups) {
            let candidates = match group {
                Ok(candidates) => candidates,
                Err(err) => {
                    tracing::warn!(
                        source = source.as_str(),
                        error = %err,
                        "Subscription source failed, resolution degraded"
                    );
                    resolution.degraded = true;
                    continue;
                }
            };
            for subscription in candidates {
                if !subscription.is_ongoing(today) {
                    continue;
                }
                if seen.insert(subscription.id) {
                    resolution.subscriptions.push(ResolvedSubscription { subscription, source });
                }
            }
        }

        metrics::record_resolved_subscriptions(resolution.subscriptions.len());
        tracing::debug!(
            count = resolution.subscriptions.len(),
            degraded = resolution.degraded,
            "Subscriptions resolved"
        );
        resolution
    }

    async fn by_ip(
        &self,
        ip: Option<IpAddr>,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        let Some(ip) = ip else { return Ok(Vec::new()) };
        let candidates = self.repository.get_ongoing_subscriptions_by_ip(ip, today).await?;
        Ok(find_matching_subscriptions(ip, &candidates)
            .into_iter()
            .filter(|s| s.is_institutional())
            .cloned()
            .collect())
    }

    async fn by_referer(
        &self,
        referer: Option<&str>,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        let Some(referer) = referer else { return Ok(Vec::new()) };
        let candidates = self
            .repository
            .get_ongoing_subscriptions_by_referer(referer, today)
            .await?;
        Ok(candidates.into_iter().filter(|s| s.matches_referer(referer)).collect())
    }

    async fn individual(
        &self,
        user: Option<UserId>,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        let Some(user) = user else { return Ok(Vec::new()) };
        let candidates = self.repository.get_ongoing_subscriptions_for_user(user, today).await?;
        Ok(candidates
            .into_iter()
            .filter(|s| matches!(s.owner, Owner::Individual { user: owner } if owner == user))
            .collect())
    }

    async fn casa(&self, id: Option<SubscriptionId>) -> RepositoryResult<Vec<Subscription>> {
        let Some(id) = id else { return Ok(Vec::new()) };
        Ok(self.repository.get_subscription(id).await?.into_iter().collect())
    }
}
