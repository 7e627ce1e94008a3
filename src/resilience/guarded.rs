//! Repository wrapper adding deadlines and retries to every lookup.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::content::types::{Article, Issue, Journal, JournalId};
use crate::resilience::retries::{retry_read, RetryPolicy};
use crate::subscription::repository::{RepositoryResult, SubscriptionRepository};
use crate::subscription::types::{Subscription, SubscriptionId, UserId};

/// Applies a [`RetryPolicy`] to an inner repository.
#[derive(Clone)]
pub struct GuardedRepository {
    inner: Arc<dyn SubscriptionRepository>,
    policy: RetryPolicy,
}

impl GuardedRepository {
    pub fn new(inner: Arc<dyn SubscriptionRepository>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl SubscriptionRepository for GuardedRepository {
    async fn get_ongoing_subscriptions_for_user(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        retry_read(&self.policy, "subscriptions_for_user", || {
            self.inner.get_ongoing_subscriptions_for_user(user, today)
        })
        .await
    }

    async fn get_ongoing_subscriptions_by_ip(
        &self,
        ip: IpAddr,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        retry_read(&self.policy, "subscriptions_by_ip", || {
            self.inner.get_ongoing_subscriptions_by_ip(ip, today)
        })
        .await
    }

    async fn get_ongoing_subscriptions_by_referer(
        &self,
        url: &str,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        retry_read(&self.policy, "subscriptions_by_referer", || {
            self.inner.get_ongoing_subscriptions_by_referer(url, today)
        })
        .await
    }

    async fn get_subscription(&self, id: SubscriptionId) -> RepositoryResult<Option<Subscription>> {
        retry_read(&self.policy, "subscription", || self.inner.get_subscription(id)).await
    }

    async fn get_journal_metadata(&self, id: JournalId) -> RepositoryResult<Option<Journal>> {
        retry_read(&self.policy, "journal", || self.inner.get_journal_metadata(id)).await
    }

    async fn get_journal_by_code(&self, code: &str) -> RepositoryResult<Option<Journal>> {
        retry_read(&self.policy, "journal_by_code", || self.inner.get_journal_by_code(code)).await
    }

    async fn get_issue(&self, localidentifier: &str) -> RepositoryResult<Option<Issue>> {
        retry_read(&self.policy, "issue", || self.inner.get_issue(localidentifier)).await
    }

    async fn get_article(&self, localidentifier: &str) -> RepositoryResult<Option<Article>> {
        retry_read(&self.policy, "article", || self.inner.get_article(localidentifier)).await
    }

    async fn get_published_issues(&self, journal: JournalId) -> RepositoryResult<Vec<Issue>> {
        retry_read(&self.policy, "published_issues", || {
            self.inner.get_published_issues(journal)
        })
        .await
    }
}
