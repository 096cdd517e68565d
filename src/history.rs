//! Per-address assignment history.
//!
//! The allocator appends an entry inside the same transaction as every
//! assign and every effective release. Each address keeps at most
//! [`MAX_ENTRIES_PER_IP`] entries; older ones are dropped first.

use crate::error::{Error, Result};
use crate::models::{parse_ip, AssignmentSpan, HistoryAction, HistoryStats, IpHistoryEntry};
use crate::store::{Database, Tables};
use chrono::{Duration, Utc};
use itertools::Itertools;

pub const MAX_ENTRIES_PER_IP: usize = 100;

/// Days counted as "recent" in [`HistoryStats::recent_activity`].
const RECENT_DAYS: i64 = 30;

/// Append `entry` and trim its address back to the retention limit.
pub(crate) fn append(tables: &mut Tables, entry: IpHistoryEntry) {
    let ip = entry.ip;
    tables.history.push(entry);

    let count = tables.history.iter().filter(|e| e.ip == ip).count();
    if count > MAX_ENTRIES_PER_IP {
        let mut excess = count - MAX_ENTRIES_PER_IP;
        tables.history.retain(|e| {
            if excess > 0 && e.ip == ip {
                excess -= 1;
                false
            } else {
                true
            }
        });
        log::trace!("History for {ip} trimmed to {MAX_ENTRIES_PER_IP} entries");
    }
}

fn newest<'a, I>(entries: I, limit: usize) -> Vec<IpHistoryEntry>
where
    I: DoubleEndedIterator<Item = &'a IpHistoryEntry>,
{
    entries.rev().take(limit).cloned().collect()
}

/// Read side of the history table.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpHistory;

impl IpHistory {
    /// Entries for one address, newest first.
    pub fn by_ip(&self, db: &Database, ip: &str, limit: usize) -> Result<Vec<IpHistoryEntry>> {
        let ip = parse_ip(ip)?;
        db.read(|t| Ok(newest(t.history.iter().filter(|e| e.ip == ip), limit)))
    }

    /// Entries where the host was the new or the previous owner, newest first.
    pub fn by_host(&self, db: &Database, host_id: &str, limit: usize) -> Result<Vec<IpHistoryEntry>> {
        db.read(|t| {
            Ok(newest(
                t.history.iter().filter(|e| {
                    e.host_id.as_deref() == Some(host_id)
                        || e.previous_host_id.as_deref() == Some(host_id)
                }),
                limit,
            ))
        })
    }

    /// Entries for addresses of one subnet, newest first.
    pub fn by_subnet(
        &self,
        db: &Database,
        subnet_id: &str,
        limit: usize,
    ) -> Result<Vec<IpHistoryEntry>> {
        db.read(|t| {
            if t.subnet(subnet_id).is_none() {
                return Err(Error::not_found("Subnet", subnet_id));
            }
            Ok(newest(
                t.history
                    .iter()
                    .filter(|e| e.subnet_id.as_deref() == Some(subnet_id)),
                limit,
            ))
        })
    }

    pub fn recent(&self, db: &Database, limit: usize) -> Result<Vec<IpHistoryEntry>> {
        db.read(|t| Ok(newest(t.history.iter(), limit)))
    }

    /// Ownership periods of one address, oldest first.
    ///
    /// A re-assign to the same host extends the open span; a re-assign to a
    /// different host closes it and opens a new one.
    pub fn timeline(&self, db: &Database, ip: &str) -> Result<Vec<AssignmentSpan>> {
        let ip = parse_ip(ip)?;
        db.read(|t| {
            let mut spans: Vec<AssignmentSpan> = Vec::new();
            for entry in t.history.iter().filter(|e| e.ip == ip) {
                let open = spans.last_mut().filter(|s| s.end.is_none());
                match entry.action {
                    HistoryAction::Assigned => {
                        if let Some(span) = open {
                            if span.host_id == entry.host_id {
                                continue;
                            }
                            span.end = Some(entry.timestamp);
                        }
                        spans.push(AssignmentSpan {
                            host_id: entry.host_id.clone(),
                            start: entry.timestamp,
                            end: None,
                        });
                    }
                    HistoryAction::Released => {
                        if let Some(span) = open {
                            span.end = Some(entry.timestamp);
                        }
                    }
                }
            }
            Ok(spans)
        })
    }

    pub fn stats(&self, db: &Database) -> Result<HistoryStats> {
        let cutoff = Utc::now() - Duration::days(RECENT_DAYS);
        db.read(|t| {
            let counts = t.history.iter().counts_by(|e| e.action);
            Ok(HistoryStats {
                total_entries: t.history.len(),
                unique_ips: t.history.iter().map(|e| e.ip).unique().count(),
                total_assignments: counts.get(&HistoryAction::Assigned).copied().unwrap_or(0),
                total_releases: counts.get(&HistoryAction::Released).copied().unwrap_or(0),
                recent_activity: t.history.iter().filter(|e| e.timestamp >= cutoff).count(),
            })
        })
    }

    /// Drop history for one address, or all of it when `ip` is `None`.
    pub fn clear(&self, db: &Database, ip: Option<&str>) -> Result<usize> {
        let ip = ip.map(parse_ip).transpose()?;
        let removed = db.transaction(|tx| {
            let before = tx.history.len();
            match ip {
                Some(ip) => tx.history.retain(|e| e.ip != ip),
                None => tx.history.clear(),
            }
            Ok(before - tx.history.len())
        })?;
        log::warn!("IP history cleared ({removed} entries removed)");
        Ok(removed)
    }
}
