//! Wiring of the access components behind one handle.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::access::context::{RequestContext, RequestInfo};
use crate::access::decision::{AccessDecision, AccessResult, Surface};
use crate::access::report::{build_report, RestrictionsReport};
use crate::casa::nonce::NonceStore;
use crate::casa::verifier::{CasaVerifier, VerificationError};
use crate::config::EngineConfig;
use crate::content::embargo::EmbargoCalculator;
use crate::content::types::{ContentItem, Journal, JournalId};
use crate::resilience::{GuardedRepository, RetryPolicy};
use crate::security::ticket::TicketSigner;
use crate::subscription::repository::{RepositoryError, RepositoryResult, SubscriptionRepository};
use crate::subscription::resolver::{ResolveQuery, SubscriptionResolver};

/// Immutable engine built from one configuration. Rebuilt on reload.
pub struct AccessEngine {
    config: EngineConfig,
    repository: Arc<dyn SubscriptionRepository>,
    resolver: SubscriptionResolver,
    decision: AccessDecision,
    casa: Option<CasaVerifier>,
}

impl AccessEngine {
    /// `repository` is wrapped with the configured deadlines and retries.
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn SubscriptionRepository>,
        nonces: Arc<dyn NonceStore>,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config.repository);
        let repository: Arc<dyn SubscriptionRepository> =
            Arc::new(GuardedRepository::new(repository, policy));

        let tickets =
            (!config.tickets.key.is_empty()).then(|| TicketSigner::new(&config.tickets.key));
        let casa = config
            .casa
            .enabled
            .then(|| CasaVerifier::new(&config.casa, nonces, repository.clone()));
        let decision = AccessDecision::new(EmbargoCalculator::new(&config.embargo), tickets);

        Self {
            resolver: SubscriptionResolver::new(repository.clone()),
            repository,
            decision,
            casa,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn casa(&self) -> Option<&CasaVerifier> {
        self.casa.as_ref()
    }

    /// Verify the CASA token if any, then resolve subscriptions once for the request.
    pub async fn build_context(&self, info: RequestInfo, now: DateTime<Utc>) -> RequestContext {
        let casa = match (&self.casa, info.casa_token.as_deref()) {
            (Some(verifier), Some(token)) => Some(match info.ip {
                Some(ip) => verifier.verify(token, ip, now).await,
                None => Err(VerificationError::WrongSubnet),
            }),
            (None, Some(_)) => {
                tracing::debug!("CASA token ignored, verification disabled");
                None
            }
            _ => None,
        };

        let query = ResolveQuery {
            user: info.user.filter(|u| u.is_active).map(|u| u.id),
            ip: info.ip,
            referer: info.referer.as_ref().map(|(url, _)| url.as_str()),
            casa: casa.as_ref().and_then(|r| r.as_ref().ok().copied()),
        };
        let resolution = self.resolver.resolve(&query, now.date_naive()).await;
        RequestContext::new(info, resolution, casa)
    }

    pub async fn load_issue(
        &self,
        localidentifier: &str,
    ) -> RepositoryResult<Option<(ContentItem, Journal)>> {
        let Some(issue) = self.repository.get_issue(localidentifier).await? else {
            return Ok(None);
        };
        let journal = self.journal_for(&issue.localidentifier, issue.journal).await?;
        Ok(Some((ContentItem::Issue(issue), journal)))
    }

    pub async fn load_article(
        &self,
        localidentifier: &str,
    ) -> RepositoryResult<Option<(ContentItem, Journal)>> {
        let Some(article) = self.repository.get_article(localidentifier).await? else {
            return Ok(None);
        };
        let Some(issue) = self.repository.get_issue(&article.issue).await? else {
            return Err(RepositoryError::Corrupt(format!(
                "article {} references missing issue {}",
                article.localidentifier, article.issue
            )));
        };
        let journal = self.journal_for(&issue.localidentifier, issue.journal).await?;
        Ok(Some((ContentItem::Article { article, issue }, journal)))
    }

    async fn journal_for(&self, issue: &str, journal: JournalId) -> RepositoryResult<Journal> {
        let Some(mut journal) = self.repository.get_journal_metadata(journal).await? else {
            return Err(RepositoryError::Corrupt(format!(
                "issue {} references missing journal {}",
                issue, journal
            )));
        };
        if journal.latest_issue.is_none() {
            let published = self.repository.get_published_issues(journal.id).await?;
            journal.latest_issue = published.into_iter().next().map(|i| i.localidentifier);
        }
        Ok(journal)
    }

    pub fn can_access(
        &self,
        item: &ContentItem,
        journal: &Journal,
        ctx: &RequestContext,
        surface: Surface,
        today: NaiveDate,
    ) -> AccessResult {
        self.decision.can_access(item, journal, ctx, surface, today)
    }

    /// Embargo report for an active journal of the main collection, by code or localidentifier.
    pub async fn restrictions(
        &self,
        code: &str,
        today: NaiveDate,
    ) -> RepositoryResult<Option<RestrictionsReport>> {
        let mut journal = match self.repository.get_journal_by_code(code).await? {
            Some(journal) if journal.active && journal.in_main_collection => journal,
            _ => return Ok(None),
        };
        // Published issues come newest first.
        let issues = self.repository.get_published_issues(journal.id).await?;
        if journal.latest_issue.is_none() {
            journal.latest_issue = issues.first().map(|i| i.localidentifier.clone());
        }
        Ok(Some(build_report(self.decision.embargo(), &journal, issues, today)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::context::UserIdentity;
    use crate::access::decision::{DenialReason, Justification};
    use crate::casa::nonce::InMemoryNonceStore;
    use crate::casa::token::CasaIssuer;
    use crate::content::types::{Article, CollectionId, Issue, JournalType};
    use crate::security::ip_range::IpRange;
    use crate::subscription::repository::InMemoryRepository;
    use crate::subscription::resolver::MatchSource;
    use crate::subscription::types::{
        OrganisationId, Owner, Period, Scope, Subscription, SubscriptionId, UserId,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::net::IpAddr;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.casa.enabled = true;
        config.casa.secret = "casa".into();
        config.tickets.key = "tickets".into();
        config.repository.call_timeout_ms = 50;
        config.repository.max_attempts = 2;
        config.repository.backoff_base_ms = 1;
        config.repository.backoff_max_ms = 5;
        config
    }

    fn dataset() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.insert_journal(Journal {
            id: JournalId(1),
            code: "ae".into(),
            localidentifier: Some("ae1".into()),
            collection: CollectionId(1),
            journal_type: Some(JournalType::Scientific),
            open_access: false,
            active: true,
            in_main_collection: true,
            next_journal: None,
            latest_issue: Some("ae-2024-1".into()),
        });
        repo.insert_issue(Issue {
            localidentifier: "ae-2024-1".into(),
            journal: JournalId(1),
            publication_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            production_date: None,
            force_free_access: false,
            is_published: true,
            open_access: None,
            volume: Some("3".into()),
            number: Some("1".into()),
        });
        repo.insert_article(Article {
            localidentifier: "ae-2024-1-a1".into(),
            issue: "ae-2024-1".into(),
            open_access: None,
        });
        let period = vec![Period {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }];
        repo.insert_subscription(Subscription {
            id: SubscriptionId(1),
            owner: Owner::Individual { user: UserId(7) },
            scope: Scope::Collection { collection: CollectionId(1) },
            periods: period.clone(),
            ip_ranges: Vec::new(),
            referers: Vec::new(),
            sponsor: None,
        });
        repo.insert_subscription(Subscription {
            id: SubscriptionId(2),
            owner: Owner::Institutional { organisation: OrganisationId(1) },
            scope: Scope::Collection { collection: CollectionId(1) },
            periods: period,
            ip_ranges: vec![IpRange::from_cidr("192.0.2.0/24").unwrap()],
            referers: Vec::new(),
            sponsor: None,
        });
        repo
    }

    fn engine() -> AccessEngine {
        AccessEngine::new(config(), Arc::new(dataset()), Arc::new(InMemoryNonceStore::new()))
    }

    #[tokio::test]
    async fn test_article_inherits_issue_embargo() {
        let engine = engine();
        let (item, journal) = engine.load_article("ae-2024-1-a1").await.unwrap().unwrap();
        let ctx = engine.build_context(RequestInfo::default(), now()).await;
        let result = engine.can_access(&item, &journal, &ctx, Surface::Page, now().date_naive());
        assert!(result.embargoed);
        assert_eq!(result.denial, Some(DenialReason::NoSubscription));
    }

    #[tokio::test]
    async fn test_ip_beats_individual_end_to_end() {
        let engine = engine();
        let info = RequestInfo {
            user: Some(UserIdentity { id: UserId(7), is_staff: false, is_active: true }),
            ip: Some("192.0.2.10".parse().unwrap()),
            ..Default::default()
        };
        let ctx = engine.build_context(info, now()).await;
        assert_eq!(ctx.active_subscription(), Some(SubscriptionId(2)));

        let (item, journal) = engine.load_issue("ae-2024-1").await.unwrap().unwrap();
        let result = engine.can_access(&item, &journal, &ctx, Surface::Page, now().date_naive());
        assert_eq!(
            result.justification,
            Some(Justification::Subscription {
                id: SubscriptionId(2),
                source: MatchSource::IpRange
            })
        );
    }

    #[tokio::test]
    async fn test_inactive_user_gets_no_individual_subscription() {
        let engine = engine();
        let info = RequestInfo {
            user: Some(UserIdentity { id: UserId(7), is_staff: false, is_active: false }),
            ..Default::default()
        };
        let ctx = engine.build_context(info, now()).await;
        assert!(ctx.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_casa_token_resolves_subscription() {
        let engine = engine();
        let ip: IpAddr = "198.51.100.4".parse().unwrap();
        let token = CasaIssuer::new("casa").mint(
            SubscriptionId(2),
            now().timestamp_millis() + 60_000,
            "198.51.100.0/24",
        );
        let info = RequestInfo { ip: Some(ip), casa_token: Some(token), ..Default::default() };
        let ctx = engine.build_context(info, now()).await;
        assert_eq!(ctx.casa(), Some(&Ok(SubscriptionId(2))));
        assert_eq!(ctx.subscriptions()[0].source, MatchSource::Casa);
    }

    /// Journal 2 has no stored latest issue and a single issue older than the window.
    fn dataset_without_latest_pointer() -> InMemoryRepository {
        let repo = dataset();
        repo.insert_journal(Journal {
            id: JournalId(2),
            code: "hist".into(),
            localidentifier: None,
            collection: CollectionId(1),
            journal_type: Some(JournalType::Scientific),
            open_access: false,
            active: true,
            in_main_collection: true,
            next_journal: None,
            latest_issue: None,
        });
        repo.insert_issue(Issue {
            localidentifier: "hist-2023-1".into(),
            journal: JournalId(2),
            publication_date: NaiveDate::from_ymd_opt(2023, 5, 1),
            production_date: None,
            force_free_access: false,
            is_published: true,
            open_access: None,
            volume: Some("1".into()),
            number: Some("1".into()),
        });
        repo
    }

    #[tokio::test]
    async fn test_newest_issue_embargoed_without_stored_pointer() {
        let engine = AccessEngine::new(
            config(),
            Arc::new(dataset_without_latest_pointer()),
            Arc::new(InMemoryNonceStore::new()),
        );
        let (item, journal) = engine.load_issue("hist-2023-1").await.unwrap().unwrap();
        assert_eq!(journal.latest_issue.as_deref(), Some("hist-2023-1"));

        let ctx = RequestContext::anonymous();
        let result = engine.can_access(&item, &journal, &ctx, Surface::Page, now().date_naive());
        assert!(!result.granted);
        assert!(result.embargoed);
        assert!(result.warning.is_none());

        let report = engine.restrictions("hist", now().date_naive()).await.unwrap().unwrap();
        assert_eq!(report.embargoed_count, 1);
    }

    #[tokio::test]
    async fn test_restrictions_report() {
        let engine = engine();
        let report = engine.restrictions("ae", now().date_naive()).await.unwrap().unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.embargoed_count, 1);
        assert!(engine.restrictions("missing", now().date_naive()).await.unwrap().is_none());
    }

    /// Never answers subscription lookups in time.
    struct StalledRepository(InMemoryRepository);

    #[async_trait]
    impl SubscriptionRepository for StalledRepository {
        async fn get_ongoing_subscriptions_for_user(
            &self,
            _user: UserId,
            _today: NaiveDate,
        ) -> RepositoryResult<Vec<Subscription>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn get_ongoing_subscriptions_by_ip(
            &self,
            _ip: IpAddr,
            _today: NaiveDate,
        ) -> RepositoryResult<Vec<Subscription>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn get_ongoing_subscriptions_by_referer(
            &self,
            _url: &str,
            _today: NaiveDate,
        ) -> RepositoryResult<Vec<Subscription>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn get_subscription(
            &self,
            id: SubscriptionId,
        ) -> RepositoryResult<Option<Subscription>> {
            self.0.get_subscription(id).await
        }
        async fn get_journal_metadata(&self, id: JournalId) -> RepositoryResult<Option<Journal>> {
            self.0.get_journal_metadata(id).await
        }
        async fn get_journal_by_code(&self, code: &str) -> RepositoryResult<Option<Journal>> {
            self.0.get_journal_by_code(code).await
        }
        async fn get_issue(&self, localidentifier: &str) -> RepositoryResult<Option<Issue>> {
            self.0.get_issue(localidentifier).await
        }
        async fn get_article(&self, localidentifier: &str) -> RepositoryResult<Option<Article>> {
            self.0.get_article(localidentifier).await
        }
        async fn get_published_issues(&self, journal: JournalId) -> RepositoryResult<Vec<Issue>> {
            self.0.get_published_issues(journal).await
        }
    }

    #[tokio::test]
    async fn test_repository_timeout_denies_with_unavailable() {
        let engine = AccessEngine::new(
            config(),
            Arc::new(StalledRepository(dataset())),
            Arc::new(InMemoryNonceStore::new()),
        );
        let info = RequestInfo {
            ip: Some("192.0.2.10".parse().unwrap()),
            ..Default::default()
        };
        let ctx = engine.build_context(info, now()).await;
        assert!(ctx.is_degraded());

        let (item, journal) = engine.load_issue("ae-2024-1").await.unwrap().unwrap();
        let result = engine.can_access(&item, &journal, &ctx, Surface::Page, now().date_naive());
        assert!(!result.granted);
        assert_eq!(result.denial, Some(DenialReason::RepositoryUnavailable));
    }
}
