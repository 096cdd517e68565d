//! Audit trail record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Assign,
    Release,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::Assign => "ASSIGN",
            AuditAction::Release => "RELEASE",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Subnet,
    Address,
    Host,
    #[serde(rename = "ip_range")]
    Range,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EntityType::Subnet => "subnet",
            EntityType::Address => "address",
            EntityType::Host => "host",
            EntityType::Range => "ip_range",
        };
        f.write_str(name)
    }
}

/// One immutable audit record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub details: String,
    /// Snapshot of the entity before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    /// Snapshot of the entity after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tags() {
        assert_eq!(
            serde_json::to_string(&AuditAction::Assign).unwrap(),
            "\"ASSIGN\""
        );
        assert_eq!(AuditAction::Release.to_string(), "RELEASE");
        assert_eq!(serde_json::to_string(&EntityType::Host).unwrap(), "\"host\"");
        assert_eq!(serde_json::to_string(&EntityType::Range).unwrap(), "\"ip_range\"");
    }
}
