//! Domain models for the allocation engine.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`Cidr`] - address block with CIDR arithmetic
//! - [`Subnet`] - registered address block and its metadata
//! - [`Address`] - allocation record of one IP address
//! - [`Host`] - CMDB host that owns addresses
//! - [`AuditEntry`] - immutable audit trail record
//! - [`IpHistoryEntry`] - per-address assignment history record
//! - [`IpRange`] - purpose-tagged range inside a subnet

mod address;
mod audit;
mod calculator;
mod cidr;
mod history;
mod host;
mod range;
mod subnet;

use serde::{Deserialize, Deserializer};

// Re-export public types
pub use address::{normalize_mac, Address, AddressStats, AddressStatus, AddressUpdate};
pub use audit::{AuditAction, AuditEntry, EntityType};
pub use calculator::{is_private, SubnetInfo};
pub use cidr::{
    addr_bits, addr_from_bits, address_count, broadcast_addr, cut_addr, get_cidr_mask,
    max_length, parse_ip, usable_hosts, CapacityPolicy, Cidr, Hosts, MAX_LENGTH_V4,
    MAX_LENGTH_V6,
};
pub use history::{AssignmentSpan, HistoryAction, HistoryStats, IpHistoryEntry};
pub use host::{Host, HostUpdate, NewHost};
pub use range::{IpRange, NewRange, RangeUpdate, DEFAULT_RANGE_PURPOSE};
pub use subnet::{Subnet, SubnetMetadata, SubnetUpdate};

/// Generate a short opaque record id (12 hex characters).
pub fn new_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Keep "field absent" and "field set to null" apart in update structs.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>` field: absent leaves the field untouched, `null` clears
/// it, a value sets it.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
