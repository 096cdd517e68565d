//! IP range registry.
//!
//! Ranges carve a subnet into purpose-tagged slices. They never overlap
//! within one subnet and must sit inside its block. Usage is derived from
//! the address records between the bounds, never stored.

use crate::audit::{snapshot, AuditRecorder, Recorded};
use crate::error::{Error, Result};
use crate::models::{
    new_id, parse_ip, AddressStatus, AuditAction, EntityType, IpRange, NewRange, RangeUpdate,
    DEFAULT_RANGE_PURPOSE,
};
use crate::store::{Database, Tables};
use chrono::Utc;
use serde::Serialize;

/// A range with its derived usage counts.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RangeUsage {
    #[serde(flatten)]
    pub range: IpRange,
    pub total: u128,
    /// Records in the range that are assigned or reserved.
    pub used: usize,
    pub available: u128,
}

fn usage(tables: &Tables, range: &IpRange) -> RangeUsage {
    let used = if range.start_ip <= range.end_ip {
        tables
            .addresses
            .range(range.start_ip..=range.end_ip)
            .filter(|(_, a)| a.status != AddressStatus::Available)
            .count()
    } else {
        0
    };
    let total = range.size();
    RangeUsage {
        range: range.clone(),
        total,
        used,
        available: total.saturating_sub(used as u128),
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_purpose(purpose: Option<String>) -> String {
    clean_text(purpose)
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| DEFAULT_RANGE_PURPOSE.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct RangeRegistry {
    audit: AuditRecorder,
}

impl RangeRegistry {
    pub fn new(audit: AuditRecorder) -> Self {
        RangeRegistry { audit }
    }

    /// Add a range to a subnet, returning its id.
    pub fn create(&self, db: &Database, new: NewRange) -> Result<Recorded<String>> {
        let start = parse_ip(&new.start_ip)?;
        let end = parse_ip(&new.end_ip)?;
        if start.is_ipv4() != end.is_ipv4() {
            return Err(Error::Validation(format!(
                "Range bounds {start} and {end} are in different address families"
            )));
        }
        if start > end {
            return Err(Error::Validation(format!(
                "Range start {start} is after its end {end}"
            )));
        }

        let range = db.transaction(|tx| {
            let subnet = tx
                .subnet(&new.subnet_id)
                .ok_or_else(|| Error::not_found("Subnet", &new.subnet_id))?;
            let cidr = subnet.cidr();
            if !cidr.contains(start) || !cidr.contains(end) {
                return Err(Error::Validation(format!(
                    "Range {start} - {end} is not inside subnet {cidr}"
                )));
            }
            if let Some(existing) = tx
                .ranges
                .iter()
                .find(|r| r.subnet_id == subnet.id && r.overlaps(start, end))
            {
                return Err(Error::Validation(format!(
                    "Range {start} - {end} overlaps existing range {} ({})",
                    existing.label(),
                    existing.id
                )));
            }

            let now = Utc::now();
            let range = IpRange {
                id: new_id(),
                subnet_id: subnet.id.clone(),
                start_ip: start,
                end_ip: end,
                purpose: clean_purpose(new.purpose),
                name: clean_text(new.name),
                description: clean_text(new.description),
                created_at: now,
                updated_at: now,
            };
            tx.ranges.push(range.clone());
            Ok(range)
        })?;
        log::info!("Range {} added (ID: {})", range.label(), range.id);

        let details = match &range.name {
            Some(name) => format!("Created IP range {} ({name})", range.label()),
            None => format!("Created IP range {}", range.label()),
        };
        Ok(self.audit.wrap(
            db,
            range.id.clone(),
            AuditAction::Create,
            EntityType::Range,
            &range.id,
            &details,
            None,
            snapshot(&range),
        ))
    }

    /// Ranges of one subnet, or of every subnet, ordered by start address.
    pub fn list(&self, db: &Database, subnet_id: Option<&str>) -> Result<Vec<RangeUsage>> {
        db.read(|t| {
            if let Some(id) = subnet_id {
                t.subnet(id).ok_or_else(|| Error::not_found("Subnet", id))?;
            }
            let mut ranges: Vec<RangeUsage> = t
                .ranges
                .iter()
                .filter(|r| subnet_id.map_or(true, |id| r.subnet_id == id))
                .map(|r| usage(t, r))
                .collect();
            ranges.sort_by_key(|u| u.range.start_ip);
            Ok(ranges)
        })
    }

    pub fn get(&self, db: &Database, id: &str) -> Result<RangeUsage> {
        db.read(|t| {
            t.range(id)
                .map(|r| usage(t, r))
                .ok_or_else(|| Error::not_found("IP range", id))
        })
    }

    pub fn update(&self, db: &Database, id: &str, update: RangeUpdate) -> Result<Recorded<IpRange>> {
        if update.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        let (before, after) = db.transaction(|tx| {
            let range = tx
                .ranges
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| Error::not_found("IP range", id))?;
            let before = range.clone();
            if let Some(purpose) = update.purpose {
                range.purpose = clean_purpose(Some(purpose));
            }
            if let Some(name) = update.name {
                range.name = clean_text(name);
            }
            if let Some(description) = update.description {
                range.description = clean_text(description);
            }
            range.updated_at = Utc::now();
            Ok((before, range.clone()))
        })?;
        log::info!("Range {} updated", after.label());

        Ok(self.audit.wrap(
            db,
            after.clone(),
            AuditAction::Update,
            EntityType::Range,
            id,
            &format!("Updated IP range {}", after.label()),
            snapshot(&before),
            snapshot(&after),
        ))
    }

    /// Remove a range. Address records inside it are left alone.
    pub fn delete(&self, db: &Database, id: &str) -> Result<Recorded<IpRange>> {
        let range = db.transaction(|tx| {
            let index = tx
                .ranges
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| Error::not_found("IP range", id))?;
            Ok(tx.ranges.remove(index))
        })?;
        log::info!("Range {} deleted", range.label());

        Ok(self.audit.wrap(
            db,
            range.clone(),
            AuditAction::Delete,
            EntityType::Range,
            id,
            &format!("Deleted IP range {}", range.label()),
            snapshot(&range),
            None,
        ))
    }
}
