//! CASA (Campus Activated Subscriber Access) token subsystem.
//!
//! # Data Flow
//! ```text
//! ?casa_token=...
//!     → token.rs (split, decode, signature)
//!     → verifier.rs (expiry, subnet, replay, subscription)
//!     → nonce.rs (shared use counter)
//! ```

pub mod nonce;
pub mod token;
pub mod verifier;

pub use nonce::{InMemoryNonceStore, NonceStore, NonceStoreError};
pub use token::CasaIssuer;
pub use verifier::{CasaVerifier, VerificationError};
