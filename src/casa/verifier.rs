//! CASA token verification.
//!
//! # Steps (stop at the first failure)
//! 1. Three segments
//! 2. Nonce well-formed
//! 3. HMAC signature
//! 4. Payload shape
//! 5. Expiry window
//! 6. Request IP inside the token subnet
//! 7. Nonce use count within threshold
//! 8. Subscription exists and is ongoing
//!
//! The specific reason is logged; callers only ever show [`VerificationError::public_message`].

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::casa::nonce::NonceStore;
use crate::casa::token::RawToken;
use crate::config::CasaConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::subscription::repository::SubscriptionRepository;
use crate::subscription::types::SubscriptionId;

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationError {
    #[error("token does not have three segments")]
    MalformedToken,

    #[error("nonce is not well-formed")]
    InvalidNonce,

    #[error("signature mismatch")]
    InvalidSignature,

    #[error("signed message is malformed")]
    MalformedPayload,

    #[error("token expired or expiry out of range")]
    Expired,

    #[error("request address outside token subnet")]
    WrongSubnet,

    #[error("nonce used too many times")]
    NonceExhausted,

    #[error("subscription unknown or not ongoing")]
    UnknownSubscription,

    #[error("verification store unavailable")]
    StoreUnavailable,
}

impl VerificationError {
    pub fn reason(&self) -> &'static str {
        match self {
            VerificationError::MalformedToken => "malformed_token",
            VerificationError::InvalidNonce => "invalid_nonce",
            VerificationError::InvalidSignature => "invalid_signature",
            VerificationError::MalformedPayload => "malformed_payload",
            VerificationError::Expired => "expired",
            VerificationError::WrongSubnet => "wrong_subnet",
            VerificationError::NonceExhausted => "nonce_exhausted",
            VerificationError::UnknownSubscription => "unknown_subscription",
            VerificationError::StoreUnavailable => "store_unavailable",
        }
    }

    /// The only text that may leave the process. Identical across all token checks.
    pub fn public_message(&self) -> &'static str {
        match self {
            VerificationError::StoreUnavailable => "Service temporarily unavailable",
            _ => "Invalid CASA token",
        }
    }
}

/// Verifies CASA tokens against a shared secret and the subscription store.
#[derive(Clone)]
pub struct CasaVerifier {
    secret: Vec<u8>,
    clock_skew_ms: i64,
    max_lifetime_ms: i64,
    max_uses: u64,
    nonce_window: Duration,
    store_timeout: Duration,
    nonces: Arc<dyn NonceStore>,
    repository: Arc<dyn SubscriptionRepository>,
}

impl CasaVerifier {
    pub fn new(
        config: &CasaConfig,
        nonces: Arc<dyn NonceStore>,
        repository: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            secret: config.secret.as_bytes().to_vec(),
            clock_skew_ms: config.clock_skew_ms as i64,
            max_lifetime_ms: (config.max_lifetime_secs as i64).saturating_mul(1000),
            max_uses: config.max_uses,
            nonce_window: Duration::from_secs(config.nonce_window_secs),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            nonces,
            repository,
        }
    }

    /// Verify `token` for a request from `request_ip` at `now`.
    pub async fn verify(
        &self,
        token: &str,
        request_ip: IpAddr,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionId, VerificationError> {
        let result = self.run_checks(token, request_ip, now).await;
        match &result {
            Ok(subscription) => {
                tracing::info!(
                    subscription = %subscription,
                    client_ip = %request_ip,
                    "CASA token accepted"
                );
                metrics::record_casa_verification("ok");
            }
            Err(err) => {
                tracing::warn!(
                    reason = err.reason(),
                    client_ip = %request_ip,
                    "CASA token rejected: {}",
                    err
                );
                metrics::record_casa_verification(err.reason());
            }
        }
        result
    }

    async fn run_checks(
        &self,
        token: &str,
        request_ip: IpAddr,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionId, VerificationError> {
        let raw = RawToken::split(token)?;
        let nonce = raw.decode_nonce()?;
        raw.verify_signature(&self.secret, &nonce)?;
        let payload = raw.decode_payload()?;

        let now_ms = now.timestamp_millis();
        if now_ms.saturating_sub(payload.expiry_ms) > self.clock_skew_ms {
            return Err(VerificationError::Expired);
        }
        if payload.expiry_ms.saturating_sub(now_ms) > self.max_lifetime_ms {
            return Err(VerificationError::Expired);
        }

        if !payload.subnet.contains(request_ip) {
            tracing::debug!(
                subnet = %payload.cidr,
                client_ip = %request_ip,
                "CASA subnet mismatch"
            );
            return Err(VerificationError::WrongSubnet);
        }

        let key = hex::encode(&nonce);
        let increment = self.nonces.increment(&key, self.nonce_window);
        let uses = match with_deadline(self.store_timeout, increment).await {
            Ok(Ok(uses)) => uses,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Nonce store failure");
                return Err(VerificationError::StoreUnavailable);
            }
            Err(elapsed) => {
                tracing::error!(error = %elapsed, "Nonce store timed out");
                return Err(VerificationError::StoreUnavailable);
            }
        };
        if uses > self.max_uses {
            return Err(VerificationError::NonceExhausted);
        }

        match self.repository.get_subscription(payload.subscription).await {
            Ok(Some(subscription)) if subscription.is_ongoing(now.date_naive()) => {
                Ok(subscription.id)
            }
            Ok(_) => Err(VerificationError::UnknownSubscription),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "Subscription lookup failed during CASA verification"
                );
                Err(VerificationError::StoreUnavailable)
            }
        }
    }
}
