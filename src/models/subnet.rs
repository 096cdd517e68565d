//! Registered subnet data model.

use super::{double_option, Cidr};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A registered address block with its configuration and metadata.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Subnet {
    /// Opaque identifier.
    pub id: String,
    /// Canonical network address (host bits zero).
    pub network: IpAddr,
    /// Prefix length.
    pub prefix: u8,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Reference to a VLAN record (managed elsewhere).
    #[serde(default)]
    pub vlan_id: Option<String>,
    /// Default gateway.
    #[serde(default)]
    pub gateway: Option<IpAddr>,
    /// DNS servers handed to hosts in this block.
    #[serde(default)]
    pub dns_servers: Vec<IpAddr>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subnet {
    /// The block this subnet covers.
    pub fn cidr(&self) -> Cidr {
        Cidr {
            addr: self.network,
            mask: self.prefix,
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.cidr().contains(ip)
    }

    /// Name if set, otherwise the CIDR notation.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.cidr().to_string())
    }
}

/// Optional descriptive fields supplied when a subnet is created.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SubnetMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vlan_id: Option<String>,
    /// Gateway literal, validated on create.
    #[serde(default)]
    pub gateway: Option<String>,
    /// DNS server literals, validated on create.
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

/// Field-by-field metadata patch. The block itself is immutable.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SubnetUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub vlan_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub gateway: Option<Option<String>>,
    #[serde(default)]
    pub dns_servers: Option<Vec<String>>,
}

impl SubnetUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.vlan_id.is_none()
            && self.gateway.is_none()
            && self.dns_servers.is_none()
    }
}
