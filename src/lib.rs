//! Content access resolution for scholarly journals.
//!
//! Decides whether a request may read an issue or article: embargo windows,
//! institutional IP ranges and referers, individual accounts, CASA tokens and
//! prepublication tickets.

pub mod access;
pub mod casa;
pub mod config;
pub mod content;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod subscription;

pub use access::AccessEngine;
pub use config::EngineConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
