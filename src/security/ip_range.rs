//! IPv4 range membership.
//!
//! # Design Decisions
//! - Ranges are inclusive on both ends and compared as `u32`
//! - CIDR blocks are expanded to (network, broadcast) once, at load time
//! - IPv6 and malformed input never match; nothing here panics

use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::subscription::types::Subscription;

/// Load-time range validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("range start {start} is greater than range end {end}")]
    Inverted { start: Ipv4Addr, end: Ipv4Addr },
}

/// An inclusive IPv4 address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IpRangeSpec", into = "IpRangeSpec")]
pub struct IpRange {
    start: u32,
    end: u32,
}

impl IpRange {
    /// Build a range from explicit bounds.
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, RangeError> {
        let (s, e) = (u32::from(start), u32::from(end));
        if s > e {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start: s, end: e })
    }

    /// Expand a CIDR block (`a.b.c.d/len`) to its network and broadcast addresses.
    pub fn from_cidr(cidr: &str) -> Result<Self, RangeError> {
        let invalid = || RangeError::InvalidCidr(cidr.to_string());
        let (addr, len) = cidr.trim().split_once('/').ok_or_else(invalid)?;
        let addr = Ipv4Addr::from_str(addr).map_err(|_| invalid())?;
        let len: u32 = len.parse().map_err(|_| invalid())?;
        if len > 32 {
            return Err(invalid());
        }
        let mask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
        let network = u32::from(addr) & mask;
        Ok(Self {
            start: network,
            end: network | !mask,
        })
    }

    pub fn start(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn end(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// Inclusive membership test. IPv6 addresses never match.
    pub fn contains(&self, address: IpAddr) -> bool {
        match address {
            IpAddr::V4(v4) => {
                let addr = u32::from(v4);
                self.start <= addr && addr <= self.end
            }
            // IPv4-mapped IPv6 is still IPv6 on the wire; the registry is IPv4-only.
            IpAddr::V6(_) => false,
        }
    }

    /// Membership test on an unparsed address; malformed strings never match.
    pub fn contains_str(&self, address: &str) -> bool {
        IpAddr::from_str(address.trim())
            .map(|addr| self.contains(addr))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for IpRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start(), self.end())
    }
}

/// On-disk representation: explicit bounds or a CIDR block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpRangeSpec {
    Bounds { start: String, end: String },
    Cidr { cidr: String },
}

impl TryFrom<IpRangeSpec> for IpRange {
    type Error = RangeError;

    fn try_from(spec: IpRangeSpec) -> Result<Self, Self::Error> {
        match spec {
            IpRangeSpec::Bounds { start, end } => {
                let s = Ipv4Addr::from_str(start.trim())
                    .map_err(|_| RangeError::InvalidAddress(start.clone()))?;
                let e = Ipv4Addr::from_str(end.trim())
                    .map_err(|_| RangeError::InvalidAddress(end.clone()))?;
                IpRange::new(s, e)
            }
            IpRangeSpec::Cidr { cidr } => IpRange::from_cidr(&cidr),
        }
    }
}

impl From<IpRange> for IpRangeSpec {
    fn from(range: IpRange) -> Self {
        IpRangeSpec::Bounds {
            start: range.start().to_string(),
            end: range.end().to_string(),
        }
    }
}

/// Subscriptions with at least one range containing `ip`, in input order.
pub fn find_matching_subscriptions<'a>(
    ip: IpAddr,
    candidates: &'a [Subscription],
) -> Vec<&'a Subscription> {
    candidates
        .iter()
        .filter(|sub| sub.ip_ranges.iter().any(|range| range.contains(ip)))
        .collect()
}
