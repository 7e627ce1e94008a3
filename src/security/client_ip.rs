//! Caller address resolution.
//!
//! # Responsibilities
//! - Take the first entry of the forwarded-for header
//! - Fall back to the socket peer address
//! - Honor the operator debug header for active staff users only
//!
//! # Design Decisions
//! - An unparsable header entry is skipped, never trusted partially
//! - The debug header is silently ignored for everyone else

use std::net::IpAddr;
use std::str::FromStr;

use axum::http::HeaderMap;

use crate::access::context::UserIdentity;
use crate::config::ClientIpConfig;

/// Resolve the address used for institutional IP matching.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    user: Option<&UserIdentity>,
    config: &ClientIpConfig,
) -> Option<IpAddr> {
    let privileged = user.map(|u| u.is_active && u.is_staff).unwrap_or(false);
    if privileged {
        if let Some(ip) = header_ip(headers, &config.debug_header) {
            tracing::debug!(client_ip = %ip, "Using operator client IP override");
            return Some(ip);
        }
    } else if headers.contains_key(config.debug_header.as_str()) {
        tracing::debug!("Ignoring client IP override from non-staff request");
    }

    forwarded_ip(headers, &config.forwarded_header).or(peer)
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| IpAddr::from_str(v.trim()).ok())
}

fn forwarded_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    IpAddr::from_str(first).ok()
}
