//! Institutional referer matching.
//!
//! # Responsibilities
//! - Normalize registered patterns (scheme optional) and candidate referers
//! - Match host case-insensitively, ignoring scheme
//! - Match path (and optional query prefix) as a literal string prefix
//!
//! # Design Decisions
//! - Prefix matching is not segment-aware: `/proxy` matches `/proxy2`
//! - A candidate that does not parse as an absolute URL never matches

use serde::{Deserialize, Serialize};
use url::Url;

/// A registered institutional referer, stored as a scheme-agnostic URL prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefererPattern {
    raw: String,
    host: String,
    port: Option<u16>,
    /// Path plus `?query` when the pattern carries one.
    prefix: String,
}

impl RefererPattern {
    /// Parse a registered pattern. A missing scheme is read as `http://`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let url = if trimmed.contains("://") {
            Url::parse(trimmed).ok()?
        } else {
            Url::parse(&format!("http://{}", trimmed)).ok()?
        };
        let host = url.host_str()?.to_ascii_lowercase();
        Some(Self {
            raw: trimmed.to_string(),
            host,
            port: url.port(),
            prefix: path_and_query(&url),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `candidate` falls under this pattern.
    pub fn matches(&self, candidate: &str) -> bool {
        let url = match Url::parse(candidate.trim()) {
            Ok(url) => url,
            Err(_) => return false,
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        };
        if host != self.host {
            return false;
        }
        if !self.port_matches(&url) {
            return false;
        }
        path_and_query(&url).starts_with(&self.prefix)
    }

    fn port_matches(&self, candidate: &Url) -> bool {
        match (self.port, candidate.port()) {
            // `Url::port` is already `None` for the scheme's default port.
            (None, None) => true,
            (None, Some(port)) => port == 80 || port == 443,
            (Some(expected), _) => candidate.port_or_known_default() == Some(expected),
        }
    }
}

impl TryFrom<String> for RefererPattern {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RefererPattern::parse(&value).ok_or_else(|| format!("invalid referer pattern: {}", value))
    }
}

impl From<RefererPattern> for String {
    fn from(pattern: RefererPattern) -> Self {
        pattern.raw
    }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// `matches(registered, candidate)` on raw strings; an unparsable pattern never matches.
pub fn matches(registered: &str, candidate: &str) -> bool {
    RefererPattern::parse(registered)
        .map(|pattern| pattern.matches(candidate))
        .unwrap_or(false)
}

/// Where the request's referer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefererSource {
    Cookie,
    Header,
}

/// Pick the candidate referer: the cookie wins over the header.
pub fn select_candidate(
    cookie: Option<&str>,
    header: Option<&str>,
) -> Option<(String, RefererSource)> {
    let non_empty = |v: &&str| !v.trim().is_empty();
    cookie
        .filter(non_empty)
        .map(|v| (v.trim().to_string(), RefererSource::Cookie))
        .or_else(|| header.filter(non_empty).map(|v| (v.trim().to_string(), RefererSource::Header)))
}
