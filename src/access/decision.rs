//! The access decision.
//!
//! # Order (first match wins)
//! 1. Valid prepublication ticket for the item's issue. On the raw datastream
//!    surface the ticket only counts while the issue is unpublished.
//! 2. Item not embargoed
//! 3. First resolved subscription covering the item's journal
//! 4. Deny; `RepositoryUnavailable` when resolution was degraded

use chrono::NaiveDate;
use serde::Serialize;

use crate::access::context::RequestContext;
use crate::content::embargo::{DataQualityWarning, EmbargoCalculator};
use crate::content::types::{ContentItem, Journal};
use crate::observability::logging::AUDIT_TARGET;
use crate::observability::metrics;
use crate::security::ticket::TicketSigner;
use crate::subscription::resolver::MatchSource;
use crate::subscription::types::SubscriptionId;

/// Where the content is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Rendered issue or article pages.
    Page,
    /// Raw datastream downloads.
    RawDatastream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Justification {
    PrepublicationTicket,
    OpenAccess,
    Subscription { id: SubscriptionId, source: MatchSource },
}

impl Justification {
    fn label(&self) -> &'static str {
        match self {
            Justification::PrepublicationTicket => "prepublication_ticket",
            Justification::OpenAccess => "open_access",
            Justification::Subscription { .. } => "subscription",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoSubscription,
    /// A subscription source failed; retry later.
    RepositoryUnavailable,
}

impl DenialReason {
    fn label(&self) -> &'static str {
        match self {
            DenialReason::NoSubscription => "no_subscription",
            DenialReason::RepositoryUnavailable => "repository_unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessResult {
    pub granted: bool,
    pub embargoed: bool,
    pub justification: Option<Justification>,
    pub denial: Option<DenialReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<DataQualityWarning>,
}

impl AccessResult {
    fn grant(
        justification: Justification,
        embargoed: bool,
        warning: Option<DataQualityWarning>,
    ) -> Self {
        Self {
            granted: true,
            embargoed,
            justification: Some(justification),
            denial: None,
            warning,
        }
    }

    fn deny(reason: DenialReason, warning: Option<DataQualityWarning>) -> Self {
        Self {
            granted: false,
            embargoed: true,
            justification: None,
            denial: Some(reason),
            warning,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessDecision {
    embargo: EmbargoCalculator,
    tickets: Option<TicketSigner>,
}

impl AccessDecision {
    pub fn new(embargo: EmbargoCalculator, tickets: Option<TicketSigner>) -> Self {
        Self { embargo, tickets }
    }

    pub fn embargo(&self) -> &EmbargoCalculator {
        &self.embargo
    }

    pub fn can_access(
        &self,
        item: &ContentItem,
        journal: &Journal,
        ctx: &RequestContext,
        surface: Surface,
        today: NaiveDate,
    ) -> AccessResult {
        let result = self.decide(item, journal, ctx, surface, today);
        match (&result.justification, &result.denial) {
            (Some(justification), _) => metrics::record_decision("granted", justification.label()),
            (None, Some(denial)) => metrics::record_decision("denied", denial.label()),
            (None, None) => {}
        }
        tracing::debug!(
            item = item.localidentifier(),
            kind = item.kind(),
            granted = result.granted,
            surface = ?surface,
            "Access decided"
        );
        result
    }

    fn decide(
        &self,
        item: &ContentItem,
        journal: &Journal,
        ctx: &RequestContext,
        surface: Surface,
        today: NaiveDate,
    ) -> AccessResult {
        let issue = item.issue();
        let status = self.embargo.is_embargoed(item, journal, today);

        if self.ticket_valid(&issue.localidentifier, ctx.ticket()) {
            match surface {
                Surface::Page => {
                    return AccessResult::grant(
                        Justification::PrepublicationTicket,
                        status.embargoed,
                        status.warning,
                    )
                }
                Surface::RawDatastream if !issue.is_published => {
                    return AccessResult::grant(
                        Justification::PrepublicationTicket,
                        status.embargoed,
                        status.warning,
                    )
                }
                Surface::RawDatastream => {
                    tracing::debug!(
                        issue = %issue.localidentifier,
                        "Ticket ignored for published issue datastream"
                    );
                }
            }
        }

        if !status.embargoed {
            return AccessResult::grant(Justification::OpenAccess, false, status.warning);
        }

        let covering = ctx
            .subscriptions()
            .iter()
            .find(|resolved| resolved.subscription.provides_access_to(journal));
        if let Some(resolved) = covering {
            let id = resolved.subscription.id;
            ctx.set_active_subscription(id);
            tracing::info!(
                target: AUDIT_TARGET,
                subscription = %id,
                source = resolved.source.as_str(),
                journal = %journal.code,
                item = item.localidentifier(),
                kind = item.kind(),
                user = ?ctx.user().map(|u| u.id.0),
                client_ip = ?ctx.ip(),
                "Access granted by subscription"
            );
            return AccessResult::grant(
                Justification::Subscription { id, source: resolved.source },
                true,
                status.warning,
            );
        }

        let reason = if ctx.is_degraded() {
            DenialReason::RepositoryUnavailable
        } else {
            DenialReason::NoSubscription
        };
        AccessResult::deny(reason, status.warning)
    }

    fn ticket_valid(&self, localidentifier: &str, ticket: Option<&str>) -> bool {
        match (&self.tickets, ticket) {
            (Some(signer), Some(ticket)) => signer.verify(localidentifier, ticket),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::context::{RequestInfo, UserIdentity};
    use crate::config::EmbargoConfig;
    use crate::content::types::{CollectionId, Issue, JournalId, JournalType};
    use crate::subscription::resolver::{Resolution, ResolvedSubscription};
    use crate::subscription::types::{OrganisationId, Owner, Period, Scope, Subscription, UserId};
    use std::collections::BTreeSet;

    const TICKET_KEY: &str = "prepublication-key";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn decision() -> AccessDecision {
        AccessDecision::new(
            EmbargoCalculator::new(&EmbargoConfig::default()),
            Some(TicketSigner::new(TICKET_KEY)),
        )
    }

    fn journal() -> Journal {
        Journal {
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
        }
    }

    fn issue(localid: &str, published: Option<NaiveDate>, is_published: bool) -> ContentItem {
        ContentItem::Issue(Issue {
            localidentifier: localid.into(),
            journal: JournalId(1),
            publication_date: published,
            production_date: None,
            force_free_access: false,
            is_published,
            open_access: None,
            volume: None,
            number: None,
        })
    }

    fn recent() -> ContentItem {
        issue("ae-2024-1", NaiveDate::from_ymd_opt(2024, 3, 1), true)
    }

    fn subscription(id: u64, owner: Owner, journals: &[u64]) -> Subscription {
        Subscription {
            id: SubscriptionId(id),
            owner,
            scope: Scope::Journals {
                journals: journals.iter().copied().map(JournalId).collect::<BTreeSet<_>>(),
            },
            periods: vec![Period {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            }],
            ip_ranges: Vec::new(),
            referers: Vec::new(),
            sponsor: None,
        }
    }

    fn context(
        resolved: Vec<(Subscription, MatchSource)>,
        degraded: bool,
        ticket: Option<String>,
    ) -> RequestContext {
        let resolution = Resolution {
            subscriptions: resolved
                .into_iter()
                .map(|(subscription, source)| ResolvedSubscription { subscription, source })
                .collect(),
            degraded,
        };
        let info = RequestInfo {
            user: Some(UserIdentity { id: UserId(7), is_staff: false, is_active: true }),
            ticket,
            ..Default::default()
        };
        RequestContext::new(info, resolution, None)
    }

    #[test]
    fn test_old_issue_is_open_access() {
        let ctx = RequestContext::anonymous();
        let item = issue("ae-2020-1", NaiveDate::from_ymd_opt(2020, 1, 1), true);
        let result = decision().can_access(&item, &journal(), &ctx, Surface::Page, today());
        assert!(result.granted);
        assert_eq!(result.justification, Some(Justification::OpenAccess));
    }

    #[test]
    fn test_embargoed_without_subscription_denied() {
        let ctx = RequestContext::anonymous();
        let result = decision().can_access(&recent(), &journal(), &ctx, Surface::Page, today());
        assert!(!result.granted);
        assert_eq!(result.denial, Some(DenialReason::NoSubscription));
    }

    #[test]
    fn test_ip_subscription_beats_individual() {
        let individual = subscription(1, Owner::Individual { user: UserId(7) }, &[1]);
        let campus = subscription(
            2,
            Owner::Institutional { organisation: OrganisationId(3) },
            &[1],
        );
        let ctx = context(
            vec![(campus, MatchSource::IpRange), (individual, MatchSource::Individual)],
            false,
            None,
        );
        let result = decision().can_access(&recent(), &journal(), &ctx, Surface::Page, today());
        assert_eq!(
            result.justification,
            Some(Justification::Subscription {
                id: SubscriptionId(2),
                source: MatchSource::IpRange
            })
        );
        assert_eq!(ctx.active_subscription(), Some(SubscriptionId(2)));
    }

    #[test]
    fn test_active_subscription_follows_grant() {
        let other_journal = subscription(
            5,
            Owner::Institutional { organisation: OrganisationId(3) },
            &[99],
        );
        let individual = subscription(6, Owner::Individual { user: UserId(7) }, &[1]);
        let ctx = context(
            vec![(other_journal, MatchSource::IpRange), (individual, MatchSource::Individual)],
            false,
            None,
        );
        assert_eq!(ctx.active_subscription(), Some(SubscriptionId(5)));

        let result = decision().can_access(&recent(), &journal(), &ctx, Surface::Page, today());
        assert!(result.granted);
        assert_eq!(ctx.active_subscription(), Some(SubscriptionId(6)));
    }

    #[test]
    fn test_degraded_denial_is_repository_unavailable() {
        let ctx = context(Vec::new(), true, None);
        let result = decision().can_access(&recent(), &journal(), &ctx, Surface::Page, today());
        assert!(!result.granted);
        assert_eq!(result.denial, Some(DenialReason::RepositoryUnavailable));

        // Open content stays open even when a source failed.
        let old = issue("ae-2020-1", NaiveDate::from_ymd_opt(2020, 1, 1), true);
        assert!(decision().can_access(&old, &journal(), &ctx, Surface::Page, today()).granted);
    }

    #[test]
    fn test_ticket_grants_page_for_published_issue() {
        let ticket = TicketSigner::new(TICKET_KEY).ticket_for("ae-2024-1");
        let ctx = context(Vec::new(), false, Some(ticket));
        let result = decision().can_access(&recent(), &journal(), &ctx, Surface::Page, today());
        assert_eq!(result.justification, Some(Justification::PrepublicationTicket));
    }

    #[test]
    fn test_raw_datastream_refuses_ticket_for_published_issue() {
        let ticket = TicketSigner::new(TICKET_KEY).ticket_for("ae-2024-1");
        let ctx = context(Vec::new(), false, Some(ticket));
        let result = decision().can_access(
            &recent(),
            &journal(),
            &ctx,
            Surface::RawDatastream,
            today(),
        );
        assert!(!result.granted);
        assert_eq!(result.denial, Some(DenialReason::NoSubscription));
    }

    #[test]
    fn test_raw_datastream_honors_ticket_for_unpublished_issue() {
        let ticket = TicketSigner::new(TICKET_KEY).ticket_for("ae-2025-1");
        let ctx = context(Vec::new(), false, Some(ticket));
        let unpublished = issue("ae-2025-1", None, false);
        let result = decision().can_access(
            &unpublished,
            &journal(),
            &ctx,
            Surface::RawDatastream,
            today(),
        );
        assert_eq!(result.justification, Some(Justification::PrepublicationTicket));
    }

    #[test]
    fn test_ticket_for_another_issue_ignored() {
        let ticket = TicketSigner::new(TICKET_KEY).ticket_for("ae-2023-4");
        let ctx = context(Vec::new(), false, Some(ticket));
        let result = decision().can_access(&recent(), &journal(), &ctx, Surface::Page, today());
        assert!(!result.granted);
    }

    #[test]
    fn test_tickets_disabled_without_key() {
        let decision = AccessDecision::new(EmbargoCalculator::new(&EmbargoConfig::default()), None);
        let ticket = TicketSigner::new(TICKET_KEY).ticket_for("ae-2024-1");
        let ctx = context(Vec::new(), false, Some(ticket));
        assert!(!decision.can_access(&recent(), &journal(), &ctx, Surface::Page, today()).granted);
    }

    #[test]
    fn test_missing_date_warning_carried() {
        let ctx = RequestContext::anonymous();
        let item = issue("ae-x", None, true);
        let result = decision().can_access(&item, &journal(), &ctx, Surface::Page, today());
        assert!(!result.granted);
        assert!(matches!(result.warning, Some(DataQualityWarning::MissingPublicationDate { .. })));
    }
}
