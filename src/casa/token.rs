//! CASA token wire format.
//!
//! ```text
//! token          = b64url(nonce) ":" b64url(signed_message) ":" b64url(signature)
//! signed_message = subscription_id "|" expiry_unix_ms "|" ip_subnet_cidr
//! signature      = HMAC-SHA256(secret, nonce_bytes || signed_message_segment)
//! ```
//! Segments are unpadded base64url. The signature covers the encoded message
//! segment, so the payload is only decoded after the signature checks out.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::casa::verifier::VerificationError;
use crate::security::ip_range::IpRange;
use crate::subscription::types::SubscriptionId;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_NONCE_BYTES: usize = 8;
pub const MAX_NONCE_BYTES: usize = 64;

/// A token split into its three segments, nothing decoded yet.
#[derive(Debug, Clone, Copy)]
pub struct RawToken<'a> {
    pub nonce: &'a str,
    pub message: &'a str,
    pub signature: &'a str,
}

impl<'a> RawToken<'a> {
    pub fn split(token: &'a str) -> Result<Self, VerificationError> {
        let mut parts = token.trim().split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(nonce), Some(message), Some(signature), None)
                if !nonce.is_empty() && !message.is_empty() && !signature.is_empty() =>
            {
                Ok(Self { nonce, message, signature })
            }
            _ => Err(VerificationError::MalformedToken),
        }
    }

    pub fn decode_nonce(&self) -> Result<Vec<u8>, VerificationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.nonce)
            .map_err(|_| VerificationError::InvalidNonce)?;
        if bytes.len() < MIN_NONCE_BYTES || bytes.len() > MAX_NONCE_BYTES {
            return Err(VerificationError::InvalidNonce);
        }
        Ok(bytes)
    }

    /// Constant-time signature check over `nonce || message segment`.
    pub fn verify_signature(&self, secret: &[u8], nonce: &[u8]) -> Result<(), VerificationError> {
        let provided = URL_SAFE_NO_PAD
            .decode(self.signature)
            .map_err(|_| VerificationError::InvalidSignature)?;
        mac(secret, nonce, self.message)
            .verify_slice(&provided)
            .map_err(|_| VerificationError::InvalidSignature)
    }

    pub fn decode_payload(&self) -> Result<CasaPayload, VerificationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.message)
            .map_err(|_| VerificationError::MalformedPayload)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| VerificationError::MalformedPayload)?;
        CasaPayload::parse(text)
    }
}

fn mac(secret: &[u8], nonce: &[u8], message_segment: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(nonce);
    mac.update(message_segment.as_bytes());
    mac
}

/// The signed assertion carried by a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasaPayload {
    pub subscription: SubscriptionId,
    pub expiry_ms: i64,
    pub subnet: IpRange,
    pub cidr: String,
}

impl CasaPayload {
    fn parse(text: &str) -> Result<Self, VerificationError> {
        let fields: Vec<&str> = text.split('|').collect();
        let [subscription, expiry, cidr] = fields.as_slice() else {
            return Err(VerificationError::MalformedPayload);
        };
        let subscription = subscription
            .trim()
            .parse::<u64>()
            .map(SubscriptionId)
            .map_err(|_| VerificationError::MalformedPayload)?;
        let expiry_ms = expiry
            .trim()
            .parse::<i64>()
            .map_err(|_| VerificationError::MalformedPayload)?;
        let subnet = IpRange::from_cidr(cidr).map_err(|_| VerificationError::MalformedPayload)?;
        Ok(Self {
            subscription,
            expiry_ms,
            subnet,
            cidr: cidr.trim().to_string(),
        })
    }
}

/// Mints tokens with a shared secret. The production issuer is a third party;
/// this exists for operators and tests.
#[derive(Clone)]
pub struct CasaIssuer {
    secret: Vec<u8>,
}

impl CasaIssuer {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: secret.as_ref().to_vec() }
    }

    /// Mint a token with a random 16-byte nonce.
    pub fn mint(&self, subscription: SubscriptionId, expiry_ms: i64, cidr: &str) -> String {
        let nonce: [u8; 16] = rand::random();
        self.mint_with_nonce(&nonce, subscription, expiry_ms, cidr)
    }

    pub fn mint_with_nonce(
        &self,
        nonce: &[u8],
        subscription: SubscriptionId,
        expiry_ms: i64,
        cidr: &str,
    ) -> String {
        let message = URL_SAFE_NO_PAD.encode(format!("{}|{}|{}", subscription.0, expiry_ms, cidr));
        self.sign_raw(nonce, &message)
    }

    /// Sign an already-encoded message segment as-is.
    pub fn sign_raw(&self, nonce: &[u8], message_segment: &str) -> String {
        let signature = mac(&self.secret, nonce, message_segment).finalize().into_bytes();
        format!(
            "{}:{}:{}",
            URL_SAFE_NO_PAD.encode(nonce),
            message_segment,
            URL_SAFE_NO_PAD.encode(signature)
        )
    }
}
