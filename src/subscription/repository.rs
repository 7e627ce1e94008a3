//! Read contract over externally persisted journals and subscriptions.
//!
//! The engine never writes; [`InMemoryRepository`] serves a JSON dataset
//! exported by the upstream importer and is safe for concurrent reads.

use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::types::{Article, Issue, Journal, JournalId};
use crate::subscription::types::{Owner, Subscription, SubscriptionId, UserId};

/// Errors returned by repository lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("repository call timed out after {0} ms")]
    Timeout(u64),

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt repository data: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    /// Timeouts and outages may succeed on retry; corrupt data will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::Timeout(_) | RepositoryError::Unavailable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryError::Timeout(_) => "timeout",
            RepositoryError::Unavailable(_) => "unavailable",
            RepositoryError::Corrupt(_) => "corrupt",
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Read-only lookups the engine needs from storage.
///
/// Subscription lists come back in creation order.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get_ongoing_subscriptions_for_user(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>>;

    async fn get_ongoing_subscriptions_by_ip(
        &self,
        ip: IpAddr,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>>;

    async fn get_ongoing_subscriptions_by_referer(
        &self,
        url: &str,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>>;

    async fn get_subscription(&self, id: SubscriptionId) -> RepositoryResult<Option<Subscription>>;

    async fn get_journal_metadata(&self, id: JournalId) -> RepositoryResult<Option<Journal>>;

    async fn get_journal_by_code(&self, code: &str) -> RepositoryResult<Option<Journal>>;

    async fn get_issue(&self, localidentifier: &str) -> RepositoryResult<Option<Issue>>;

    async fn get_article(&self, localidentifier: &str) -> RepositoryResult<Option<Article>>;

    /// Published issues of a journal, newest first.
    async fn get_published_issues(&self, journal: JournalId) -> RepositoryResult<Vec<Issue>>;
}

/// On-disk dataset layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub journals: Vec<Journal>,
    pub issues: Vec<Issue>,
    pub articles: Vec<Article>,
    pub subscriptions: Vec<Subscription>,
}

/// Concurrent in-memory repository.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    journals: Arc<DashMap<JournalId, Journal>>,
    issues: Arc<DashMap<String, Issue>>,
    articles: Arc<DashMap<String, Article>>,
    subscriptions: Arc<DashMap<SubscriptionId, Subscription>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let repo = Self::new();
        for journal in dataset.journals {
            repo.insert_journal(journal);
        }
        for issue in dataset.issues {
            repo.insert_issue(issue);
        }
        for article in dataset.articles {
            repo.insert_article(article);
        }
        for subscription in dataset.subscriptions {
            repo.insert_subscription(subscription);
        }
        repo
    }

    /// Load a JSON dataset. Malformed ranges or referers fail the whole load.
    pub fn load_from_file(path: &Path) -> Result<Self, RepositoryError> {
        let file = File::open(path)
            .map_err(|e| RepositoryError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let dataset: Dataset = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RepositoryError::Corrupt(format!("{}: {}", path.display(), e)))?;
        let repo = Self::from_dataset(dataset);
        tracing::info!(
            journals = repo.journals.len(),
            issues = repo.issues.len(),
            subscriptions = repo.subscriptions.len(),
            path = %path.display(),
            "Loaded access dataset"
        );
        Ok(repo)
    }

    pub fn insert_journal(&self, journal: Journal) {
        self.journals.insert(journal.id, journal);
    }

    pub fn insert_issue(&self, issue: Issue) {
        self.issues.insert(issue.localidentifier.clone(), issue);
    }

    pub fn insert_article(&self, article: Article) {
        self.articles.insert(article.localidentifier.clone(), article);
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.subscriptions.insert(subscription.id, subscription);
    }

    /// Ongoing subscriptions satisfying `predicate`, in creation order.
    fn ongoing_where<F>(&self, today: NaiveDate, predicate: F) -> Vec<Subscription>
    where
        F: Fn(&Subscription) -> bool,
    {
        let mut found: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|r| r.value().is_ongoing(today) && predicate(r.value()))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|s| s.id);
        found
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryRepository {
    async fn get_ongoing_subscriptions_for_user(
        &self,
        user: UserId,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        Ok(self.ongoing_where(today, |s| s.owner == Owner::Individual { user }))
    }

    async fn get_ongoing_subscriptions_by_ip(
        &self,
        ip: IpAddr,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        Ok(self.ongoing_where(today, |s| {
            s.is_institutional() && s.ip_ranges.iter().any(|r| r.contains(ip))
        }))
    }

    async fn get_ongoing_subscriptions_by_referer(
        &self,
        url: &str,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<Subscription>> {
        Ok(self.ongoing_where(today, |s| s.is_institutional() && s.matches_referer(url)))
    }

    async fn get_subscription(&self, id: SubscriptionId) -> RepositoryResult<Option<Subscription>> {
        Ok(self.subscriptions.get(&id).map(|r| r.value().clone()))
    }

    async fn get_journal_metadata(&self, id: JournalId) -> RepositoryResult<Option<Journal>> {
        Ok(self.journals.get(&id).map(|r| r.value().clone()))
    }

    async fn get_journal_by_code(&self, code: &str) -> RepositoryResult<Option<Journal>> {
        Ok(self
            .journals
            .iter()
            .find(|r| r.value().code == code || r.value().localidentifier.as_deref() == Some(code))
            .map(|r| r.value().clone()))
    }

    async fn get_issue(&self, localidentifier: &str) -> RepositoryResult<Option<Issue>> {
        Ok(self.issues.get(localidentifier).map(|r| r.value().clone()))
    }

    async fn get_article(&self, localidentifier: &str) -> RepositoryResult<Option<Article>> {
        Ok(self.articles.get(localidentifier).map(|r| r.value().clone()))
    }

    async fn get_published_issues(&self, journal: JournalId) -> RepositoryResult<Vec<Issue>> {
        let mut issues: Vec<Issue> = self
            .issues
            .iter()
            .filter(|r| r.value().journal == journal && r.value().is_published)
            .map(|r| r.value().clone())
            .collect();
        issues.sort_by(|a, b| {
            b.publication_date
                .cmp(&a.publication_date)
                .then_with(|| b.localidentifier.cmp(&a.localidentifier))
        });
        Ok(issues)
    }
}
