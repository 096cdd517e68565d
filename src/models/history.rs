//! Per-address assignment history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Assigned,
    Released,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HistoryAction::Assigned => f.write_str("assigned"),
            HistoryAction::Released => f.write_str("released"),
        }
    }
}

/// One assign or release event for an address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IpHistoryEntry {
    pub id: String,
    pub ip: IpAddr,
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
    /// New owner (assign only).
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    /// Owner before this event.
    #[serde(default)]
    pub previous_host_id: Option<String>,
    #[serde(default)]
    pub dns_name: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

/// A period during which one host held an address.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AssignmentSpan {
    pub host_id: Option<String>,
    pub start: DateTime<Utc>,
    /// `None` while the assignment is still live.
    pub end: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_entries: usize,
    pub unique_ips: usize,
    pub total_assignments: usize,
    pub total_releases: usize,
    /// Entries from the last 30 days.
    pub recent_activity: usize,
}
