//! Address allocation record.

use super::double_option;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

/// Allocation state of one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressStatus {
    Available,
    Assigned,
    Reserved,
}

impl AddressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressStatus::Available => "available",
            AddressStatus::Assigned => "assigned",
            AddressStatus::Reserved => "reserved",
        }
    }
}

impl fmt::Display for AddressStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(AddressStatus::Available),
            "assigned" => Ok(AddressStatus::Assigned),
            "reserved" => Ok(AddressStatus::Reserved),
            other => Err(Error::Validation(format!("Unknown address status: {other}"))),
        }
    }
}

/// The stored state of one IP address.
///
/// `status == Assigned` exactly when `host_id` is set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Address {
    /// The address itself; unique key.
    pub ip: IpAddr,
    /// Subnet whose block contains `ip`, if any.
    #[serde(default)]
    pub subnet_id: Option<String>,
    /// Owning host while assigned.
    #[serde(default)]
    pub host_id: Option<String>,
    pub status: AddressStatus,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
    /// Why the address is held back, e.g. `gateway` or `dhcp`.
    #[serde(default)]
    pub reservation_type: Option<String>,
    #[serde(default)]
    pub reservation_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// A fresh `available` record.
    pub fn new(ip: IpAddr, subnet_id: Option<String>, now: DateTime<Utc>) -> Self {
        Address {
            ip,
            subnet_id,
            host_id: None,
            status: AddressStatus::Available,
            mac_address: None,
            dns_name: None,
            reservation_type: None,
            reservation_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.status == AddressStatus::Assigned
    }

    /// Status and host reference agree with each other.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            AddressStatus::Assigned => self.host_id.is_some(),
            AddressStatus::Available | AddressStatus::Reserved => self.host_id.is_none(),
        }
    }
}

/// Administrative field-by-field patch for an address record.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AddressUpdate {
    #[serde(default)]
    pub status: Option<AddressStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub subnet_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub mac_address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dns_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reservation_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reservation_description: Option<Option<String>>,
}

impl AddressUpdate {
    /// Patch that holds the address out of the pool.
    pub fn reserve() -> Self {
        AddressUpdate {
            status: Some(AddressStatus::Reserved),
            ..Default::default()
        }
    }

    /// Tag the reservation with a type and an optional description.
    pub fn reason(mut self, kind: &str, description: Option<&str>) -> Self {
        self.reservation_type = Some(Some(kind.to_string()));
        self.reservation_description = description.map(|d| Some(d.to_string()));
        self
    }
}

/// Aggregate status counts over every stored address record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressStats {
    pub assigned: usize,
    pub available: usize,
    pub reserved: usize,
    pub total: usize,
}

static MAC_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_mac_regex() -> &'static Regex {
    MAC_REGEX.get_or_init(|| {
        Regex::new(r"^[0-9A-Fa-f]{2}([:-][0-9A-Fa-f]{2}){5}$").expect("Invalid Regex")
    })
}

/// Validate a MAC address and return it lowercase and colon separated.
pub fn normalize_mac(mac: &str) -> Result<String> {
    let mac = mac.trim();
    if !get_mac_regex().is_match(mac) {
        return Err(Error::Validation(format!("Invalid MAC address: {mac}")));
    }
    Ok(mac.to_lowercase().replace('-', ":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AddressStatus::Assigned).unwrap(),
            "\"assigned\""
        );
        assert_eq!(
            serde_json::from_str::<AddressStatus>("\"reserved\"").unwrap(),
            AddressStatus::Reserved
        );
        assert_eq!("Available".parse::<AddressStatus>().unwrap(), AddressStatus::Available);
        assert!("leased".parse::<AddressStatus>().is_err());
    }

    #[test]
    fn test_new_address_is_available() {
        let a = Address::new("10.0.0.1".parse().unwrap(), None, Utc::now());
        assert_eq!(a.status, AddressStatus::Available);
        assert!(a.is_consistent());
        assert!(!a.is_assigned());
    }

    #[test]
    fn test_consistency() {
        let mut a = Address::new("10.0.0.1".parse().unwrap(), None, Utc::now());
        a.status = AddressStatus::Assigned;
        assert!(!a.is_consistent());
        a.host_id = Some("h1".to_string());
        assert!(a.is_consistent());
        a.status = AddressStatus::Reserved;
        assert!(!a.is_consistent());
    }

    #[test]
    fn test_update_keeps_absent_and_null_apart() {
        let update: AddressUpdate =
            serde_json::from_str(r#"{"reservation_type": "gateway", "reservation_description": null}"#)
                .unwrap();
        assert_eq!(update.reservation_type, Some(Some("gateway".to_string())));
        assert_eq!(update.reservation_description, Some(None));
        assert_eq!(update.dns_name, None);
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(
            normalize_mac("AA-BB-CC-00-11-22").unwrap(),
            "aa:bb:cc:00:11:22"
        );
        assert_eq!(
            normalize_mac(" aa:bb:cc:00:11:22 ").unwrap(),
            "aa:bb:cc:00:11:22"
        );
        assert!(normalize_mac("aa:bb:cc").is_err());
        assert!(normalize_mac("gg:bb:cc:00:11:22").is_err());
    }
}
