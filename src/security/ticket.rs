//! Prepublication tickets.
//!
//! A ticket is `hex(HMAC-SHA256(key, issue.localidentifier))`, shared as
//! `?ticket=...`. Verification is an exact comparison of the hex strings, so a
//! leading `0` nibble is significant.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Derives and verifies prepublication tickets.
#[derive(Clone)]
pub struct TicketSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for TicketSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketSigner").finish_non_exhaustive()
    }
}

impl TicketSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self { key: key.as_ref().to_vec() }
    }

    /// Ticket for an issue localidentifier, lowercase hex, always 64 characters.
    pub fn ticket_for(&self, localidentifier: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(localidentifier.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Exact, constant-time string comparison against the expected ticket.
    pub fn verify(&self, localidentifier: &str, ticket: &str) -> bool {
        let expected = self.ticket_for(localidentifier);
        expected.as_bytes().ct_eq(ticket.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A key whose ticket for `localid` starts with a zero nibble.
    fn key_with_leading_zero(localid: &str) -> TicketSigner {
        (0..10_000)
            .map(|i| TicketSigner::new(format!("ticket-key-{}", i)))
            .find(|signer| signer.ticket_for(localid).starts_with('0'))
            .expect("a key with a leading zero nibble exists in the search space")
    }

    #[test]
    fn test_ticket_is_deterministic_hex() {
        let signer = TicketSigner::new("secret");
        let ticket = signer.ticket_for("abc00123");
        assert_eq!(ticket.len(), 64);
        assert!(ticket.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(ticket, signer.ticket_for("abc00123"));
        assert_ne!(ticket, signer.ticket_for("abc00124"));
        assert_ne!(ticket, TicketSigner::new("other").ticket_for("abc00123"));
    }

    #[test]
    fn test_leading_zero_round_trips_exactly() {
        let signer = key_with_leading_zero("abc00123");
        let ticket = signer.ticket_for("abc00123");
        assert!(ticket.starts_with('0'));
        assert_eq!(ticket.len(), 64);
        assert!(signer.verify("abc00123", &ticket));

        // A numerically equal ticket with the zero stripped is a different string.
        let stripped = ticket.trim_start_matches('0');
        assert!(!signer.verify("abc00123", stripped));
    }

    #[test]
    fn test_wrong_ticket_rejected() {
        let signer = TicketSigner::new("secret");
        let ticket = signer.ticket_for("abc00123");
        assert!(!signer.verify("abc00124", &ticket));
        assert!(!signer.verify("abc00123", &ticket.to_uppercase()));
        assert!(!signer.verify("abc00123", ""));
    }
}
