//! Purpose-tagged address range inside a subnet.

use super::{addr_bits, double_option};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Purpose given to a range created without one.
pub const DEFAULT_RANGE_PURPOSE: &str = "other";

/// An inclusive `start_ip..=end_ip` slice of one subnet, e.g. a DHCP pool or
/// the printers of a floor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IpRange {
    pub id: String,
    pub subnet_id: String,
    pub start_ip: IpAddr,
    pub end_ip: IpAddr,
    /// Free-form tag such as `servers`, `printers` or `dhcp`.
    pub purpose: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        ip.is_ipv4() == self.start_ip.is_ipv4()
            && (addr_bits(self.start_ip)..=addr_bits(self.end_ip)).contains(&addr_bits(ip))
    }

    /// Shares at least one address with `start..=end`.
    pub fn overlaps(&self, start: IpAddr, end: IpAddr) -> bool {
        start.is_ipv4() == self.start_ip.is_ipv4()
            && addr_bits(start) <= addr_bits(self.end_ip)
            && addr_bits(self.start_ip) <= addr_bits(end)
    }

    /// Number of addresses covered, ends included.
    pub fn size(&self) -> u128 {
        addr_bits(self.end_ip)
            .saturating_sub(addr_bits(self.start_ip))
            .saturating_add(1)
    }

    pub fn label(&self) -> String {
        format!("{} - {}", self.start_ip, self.end_ip)
    }
}

/// Arguments of [`RangeRegistry::create`](crate::ranges::RangeRegistry::create).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NewRange {
    pub subnet_id: String,
    pub start_ip: String,
    pub end_ip: String,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewRange {
    pub fn new(subnet_id: &str, start_ip: &str, end_ip: &str) -> Self {
        NewRange {
            subnet_id: subnet_id.to_string(),
            start_ip: start_ip.to_string(),
            end_ip: end_ip.to_string(),
            ..Default::default()
        }
    }

    pub fn purpose(mut self, purpose: &str) -> Self {
        self.purpose = Some(purpose.to_string());
        self
    }
}

/// Descriptive patch for a range. The bounds cannot change; delete and
/// recreate instead.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RangeUpdate {
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl RangeUpdate {
    pub fn is_empty(&self) -> bool {
        self == &RangeUpdate::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> IpRange {
        let now = Utc::now();
        IpRange {
            id: "r1".to_string(),
            subnet_id: "s1".to_string(),
            start_ip: start.parse().unwrap(),
            end_ip: end.parse().unwrap(),
            purpose: DEFAULT_RANGE_PURPOSE.to_string(),
            name: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_contains_and_size() {
        let r = range("10.0.0.10", "10.0.0.19");
        assert_eq!(r.size(), 10);
        assert!(r.contains(ip("10.0.0.10")));
        assert!(r.contains(ip("10.0.0.19")));
        assert!(!r.contains(ip("10.0.0.20")));
        assert!(!r.contains(ip("::a")));
    }

    #[test]
    fn test_overlaps() {
        let r = range("10.0.0.10", "10.0.0.19");
        assert!(r.overlaps(ip("10.0.0.19"), ip("10.0.0.30")));
        assert!(r.overlaps(ip("10.0.0.1"), ip("10.0.0.10")));
        assert!(r.overlaps(ip("10.0.0.12"), ip("10.0.0.13")));
        assert!(r.overlaps(ip("10.0.0.0"), ip("10.0.0.255")));
        assert!(!r.overlaps(ip("10.0.0.20"), ip("10.0.0.30")));
        assert!(!r.overlaps(ip("10.0.0.0"), ip("10.0.0.9")));
    }
}
