//! Append-only audit trail.
//!
//! Registry, allocator and host operations call [`AuditRecorder::record`]
//! after their own transaction committed. A failing append is logged and
//! reported back as [`AuditStatus::Failed`] alongside the operation's value;
//! it never turns the operation into an error.

use crate::error::Result;
use crate::models::{new_id, AuditAction, AuditEntry, EntityType};
use crate::store::Database;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Where audit entries end up.
pub trait AuditSink: Send + Sync {
    fn append(&self, db: &Database, entry: &AuditEntry) -> Result<()>;

    /// Up to `limit` entries, newest first.
    fn list(&self, db: &Database, limit: usize) -> Result<Vec<AuditEntry>>;

    /// Remove every entry, returning how many were removed.
    fn clear(&self, db: &Database) -> Result<usize>;
}

/// Keeps audit entries in the store's own audit table.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreSink;

impl AuditSink for StoreSink {
    fn append(&self, db: &Database, entry: &AuditEntry) -> Result<()> {
        db.transaction(|tx| {
            tx.audit.push(entry.clone());
            Ok(())
        })
    }

    fn list(&self, db: &Database, limit: usize) -> Result<Vec<AuditEntry>> {
        db.read(|t| Ok(t.audit.iter().rev().take(limit).cloned().collect()))
    }

    fn clear(&self, db: &Database) -> Result<usize> {
        db.transaction(|tx| {
            let removed = tx.audit.len();
            tx.audit.clear();
            Ok(removed)
        })
    }
}

/// Outcome of the audit append that followed an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    /// Entry written; carries its id.
    Recorded(String),
    /// Entry lost; carries the reason.
    Failed(String),
    /// The operation changed nothing, so no entry was written.
    Skipped,
}

impl AuditStatus {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditStatus::Recorded(_))
    }

    /// Message for callers when the entry could not be written.
    pub fn warning(&self) -> Option<String> {
        match self {
            AuditStatus::Recorded(_) | AuditStatus::Skipped => None,
            AuditStatus::Failed(reason) => Some(format!("audit entry not recorded: {reason}")),
        }
    }
}

/// The value of a successful operation plus what happened to its audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<T> {
    pub value: T,
    pub audit: AuditStatus,
}

impl<T> Recorded<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Recorded<U> {
        Recorded {
            value: f(self.value),
            audit: self.audit,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Serialize an entity for the before/after columns.
pub fn snapshot<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| log::warn!("Could not snapshot entity for audit: {e}"))
        .ok()
}

/// Writes audit entries through an [`AuditSink`].
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        AuditRecorder::new(Arc::new(StoreSink))
    }
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        AuditRecorder { sink }
    }

    /// Append one entry. Never fails; see [`AuditStatus`].
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        db: &Database,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: &str,
        details: &str,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> AuditStatus {
        let entry = AuditEntry {
            id: new_id(),
            timestamp: Utc::now(),
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            details: details.to_string(),
            before,
            after,
        };
        match self.sink.append(db, &entry) {
            Ok(()) => {
                log::debug!("audit {action} {entity_type} {entity_id}: {details}");
                AuditStatus::Recorded(entry.id)
            }
            Err(e) => {
                log::error!("Audit log error ({action} {entity_type} {entity_id}): {e}");
                AuditStatus::Failed(e.to_string())
            }
        }
    }

    /// Attach the audit outcome of `action` to an operation's value.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn wrap<T>(
        &self,
        db: &Database,
        value: T,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: &str,
        details: &str,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Recorded<T> {
        let audit = self.record(db, action, entity_type, entity_id, details, before, after);
        Recorded { value, audit }
    }

    /// Newest entries first.
    pub fn list(&self, db: &Database, limit: usize) -> Result<Vec<AuditEntry>> {
        self.sink.list(db, limit)
    }

    /// Delete every entry. Administrative action only.
    pub fn clear(&self, db: &Database) -> Result<usize> {
        let removed = self.sink.clear(db)?;
        log::warn!("Audit log cleared ({removed} entries removed)");
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;

    /// Sink whose storage is always unavailable.
    pub(crate) struct BrokenSink;

    impl AuditSink for BrokenSink {
        fn append(&self, _db: &Database, _entry: &AuditEntry) -> Result<()> {
            Err(Error::Storage("audit storage unavailable".to_string()))
        }

        fn list(&self, _db: &Database, _limit: usize) -> Result<Vec<AuditEntry>> {
            Err(Error::Storage("audit storage unavailable".to_string()))
        }

        fn clear(&self, _db: &Database) -> Result<usize> {
            Err(Error::Storage("audit storage unavailable".to_string()))
        }
    }

    #[test]
    fn test_record_and_list_newest_first() {
        let db = Database::in_memory();
        let audit = AuditRecorder::default();
        for i in 0..3 {
            let status = audit.record(
                &db,
                AuditAction::Create,
                EntityType::Host,
                &format!("h{i}"),
                "added",
                None,
                None,
            );
            assert!(status.is_recorded());
        }
        let entries = audit.list(&db, 2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity_id, "h2");
        assert_eq!(entries[1].entity_id, "h1");
    }

    #[test]
    fn test_snapshots_are_stored() {
        let db = Database::in_memory();
        let audit = AuditRecorder::default();
        audit.record(
            &db,
            AuditAction::Update,
            EntityType::Subnet,
            "s1",
            "renamed",
            snapshot(&serde_json::json!({"name": "old"})),
            snapshot(&serde_json::json!({"name": "new"})),
        );
        let entry = &audit.list(&db, 1).unwrap()[0];
        assert_eq!(entry.before.as_ref().unwrap()["name"], "old");
        assert_eq!(entry.after.as_ref().unwrap()["name"], "new");
    }

    #[test]
    fn test_clear() {
        let db = Database::in_memory();
        let audit = AuditRecorder::default();
        audit.record(&db, AuditAction::Delete, EntityType::Subnet, "s1", "gone", None, None);
        assert_eq!(audit.clear(&db).unwrap(), 1);
        assert!(audit.list(&db, 10).unwrap().is_empty());
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let db = Database::in_memory();
        let audit = AuditRecorder::new(Arc::new(BrokenSink));
        let status = audit.record(&db, AuditAction::Assign, EntityType::Address, "10.0.0.1", "x", None, None);
        assert!(!status.is_recorded());
        assert!(status.warning().unwrap().contains("audit storage unavailable"));
    }
}
