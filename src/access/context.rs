//! Per-request state.

use std::net::IpAddr;
use std::sync::Mutex;

use serde::Serialize;

use crate::casa::verifier::VerificationError;
use crate::security::referer::RefererSource;
use crate::subscription::resolver::{Resolution, ResolvedSubscription};
use crate::subscription::types::{SubscriptionId, UserId};

/// An authenticated user as asserted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Raw request facts, before any lookup.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub user: Option<UserIdentity>,
    pub ip: Option<IpAddr>,
    pub referer: Option<(String, RefererSource)>,
    pub casa_token: Option<String>,
    pub ticket: Option<String>,
}

/// A request with its subscriptions resolved. Built once, shared by every decision
/// made while serving the request.
#[derive(Debug)]
pub struct RequestContext {
    info: RequestInfo,
    resolution: Resolution,
    casa: Option<Result<SubscriptionId, VerificationError>>,
    active: Mutex<Option<SubscriptionId>>,
}

impl RequestContext {
    pub fn new(
        info: RequestInfo,
        resolution: Resolution,
        casa: Option<Result<SubscriptionId, VerificationError>>,
    ) -> Self {
        let first = resolution.subscriptions.first().map(|r| r.subscription.id);
        Self {
            info,
            resolution,
            casa,
            active: Mutex::new(first),
        }
    }

    /// Context for a request that carries nothing.
    pub fn anonymous() -> Self {
        Self::new(RequestInfo::default(), Resolution::default(), None)
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.info.user.as_ref()
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.info.ip
    }

    pub fn referer(&self) -> Option<&(String, RefererSource)> {
        self.info.referer.as_ref()
    }

    pub fn ticket(&self) -> Option<&str> {
        self.info.ticket.as_deref()
    }

    /// Outcome of the request's CASA token, if it carried one.
    pub fn casa(&self) -> Option<&Result<SubscriptionId, VerificationError>> {
        self.casa.as_ref()
    }

    pub fn subscriptions(&self) -> &[ResolvedSubscription] {
        &self.resolution.subscriptions
    }

    pub fn is_degraded(&self) -> bool {
        self.resolution.degraded
    }

    pub fn active_subscription(&self) -> Option<SubscriptionId> {
        match self.active.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_active_subscription(&self, id: SubscriptionId) {
        match self.active.lock() {
            Ok(mut guard) => *guard = Some(id),
            Err(poisoned) => *poisoned.into_inner() = Some(id),
        }
    }
}
