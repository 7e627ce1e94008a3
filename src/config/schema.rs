//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so a minimal file only names what it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the access engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Embargo offsets per journal type.
    pub embargo: EmbargoConfig,

    /// CASA token verification.
    pub casa: CasaConfig,

    /// Prepublication tickets.
    pub tickets: TicketConfig,

    /// Caller address resolution.
    pub client_ip: ClientIpConfig,

    /// Referer cookie persistence.
    pub referer: RefererConfig,

    /// Trusted identity headers.
    pub identity: IdentityConfig,

    /// Subscription repository access.
    pub repository: RepositoryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time for a request/response in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 10 }
    }
}

/// Embargo durations in months.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbargoConfig {
    pub scientific_months: u32,
    pub cultural_months: u32,
    /// Used for journals with no type.
    pub default_months: u32,
}

impl Default for EmbargoConfig {
    fn default() -> Self {
        Self {
            scientific_months: 12,
            cultural_months: 36,
            default_months: 12,
        }
    }
}

/// CASA token verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CasaConfig {
    /// Accept `casa_token` on requests.
    pub enabled: bool,

    /// Secret shared with the token issuer.
    pub secret: String,

    /// Tolerance past expiry in milliseconds.
    pub clock_skew_ms: u64,

    /// Tokens expiring further out than this are rejected.
    pub max_lifetime_secs: u64,

    /// Uses allowed per nonce within the window.
    pub max_uses: u64,

    /// Lifetime of a nonce counter in seconds.
    pub nonce_window_secs: u64,

    /// Deadline for a single counter-store call.
    pub store_timeout_ms: u64,
}

impl Default for CasaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            clock_skew_ms: 30_000,
            max_lifetime_secs: 24 * 60 * 60,
            max_uses: 3,
            nonce_window_secs: 48 * 60 * 60,
            store_timeout_ms: 250,
        }
    }
}

/// Prepublication tickets.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TicketConfig {
    /// HMAC key. Empty disables ticket checks.
    pub key: String,
}

/// Caller address resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientIpConfig {
    /// Operator override header, honored for active staff only.
    pub debug_header: String,

    pub forwarded_header: String,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            debug_header: "client-ip".to_string(),
            forwarded_header: "x-forwarded-for".to_string(),
        }
    }
}

/// Referer cookie persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefererConfig {
    pub cookie_name: String,
    pub cookie_max_age_secs: u64,
}

impl Default for RefererConfig {
    fn default() -> Self {
        Self {
            cookie_name: "access_referer".to_string(),
            cookie_max_age_secs: 24 * 60 * 60,
        }
    }
}

/// Trusted identity headers set by an authenticating gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Read `X-Remote-User*` headers. Off means every request is anonymous.
    pub trust_headers: bool,
}

/// Subscription repository access.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// JSON dataset loaded into the in-memory repository.
    pub data_path: Option<PathBuf>,

    /// Deadline for a single lookup in milliseconds.
    pub call_timeout_ms: u64,

    /// Attempts per lookup, first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            call_timeout_ms: 500,
            max_attempts: 3,
            backoff_base_ms: 20,
            backoff_max_ms: 200,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
