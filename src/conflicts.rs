//! Consistency checks over the stored address records.

use crate::error::Result;
use crate::models::{Address, CapacityPolicy, Cidr};
use crate::store::{Database, Tables};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Subnet reference points at a block that does not contain the address.
    SubnetMismatch,
    /// Subnet reference points at a subnet that no longer exists.
    MissingSubnet,
    NetworkAddressAssigned,
    BroadcastAddressAssigned,
    /// Assigned to a host that no longer exists.
    MissingHost,
    /// Status and host reference disagree.
    InconsistentStatus,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Conflict {
    pub ip: IpAddr,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub message: String,
}

impl Conflict {
    fn new(ip: IpAddr, kind: ConflictKind, severity: Severity, message: String) -> Self {
        Conflict {
            ip,
            kind,
            severity,
            message,
        }
    }
}

/// Read-only scan for records that break the allocation invariants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    policy: CapacityPolicy,
}

impl ConflictDetector {
    pub fn new(policy: CapacityPolicy) -> Self {
        ConflictDetector { policy }
    }

    /// Every conflict found, errors first, then by address.
    pub fn detect(&self, db: &Database) -> Result<Vec<Conflict>> {
        let mut conflicts = db.read(|t| {
            Ok(t.addresses
                .values()
                .flat_map(|a| self.check(t, a))
                .collect::<Vec<_>>())
        })?;
        conflicts.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.ip.cmp(&b.ip)));
        if !conflicts.is_empty() {
            log::warn!("Found {} address conflict(s)", conflicts.len());
        }
        Ok(conflicts)
    }

    fn check(&self, tables: &Tables, a: &Address) -> Vec<Conflict> {
        let mut found = Vec::new();

        if !a.is_consistent() {
            found.push(Conflict::new(
                a.ip,
                ConflictKind::InconsistentStatus,
                Severity::Error,
                format!(
                    "IP {} has status {} but host reference {:?}",
                    a.ip, a.status, a.host_id
                ),
            ));
        }

        if let Some(subnet_id) = &a.subnet_id {
            match tables.subnet(subnet_id) {
                None => found.push(Conflict::new(
                    a.ip,
                    ConflictKind::MissingSubnet,
                    Severity::Error,
                    format!("IP {} references missing subnet {subnet_id}", a.ip),
                )),
                Some(subnet) if !subnet.contains(a.ip) => found.push(Conflict::new(
                    a.ip,
                    ConflictKind::SubnetMismatch,
                    Severity::Error,
                    format!("IP {} is not inside its subnet {}", a.ip, subnet.cidr()),
                )),
                Some(subnet) if a.is_assigned() => {
                    found.extend(self.check_reserved_ends(a.ip, subnet.cidr()))
                }
                Some(_) => {}
            }
        }

        if let (true, Some(host_id)) = (a.is_assigned(), &a.host_id) {
            if tables.host(host_id).is_none() {
                found.push(Conflict::new(
                    a.ip,
                    ConflictKind::MissingHost,
                    Severity::Error,
                    format!("IP {} is assigned to missing host {host_id}", a.ip),
                ));
            }
        }
        found
    }

    /// Network or broadcast address of a block handed to a host.
    fn check_reserved_ends(&self, ip: IpAddr, cidr: Cidr) -> Option<Conflict> {
        if cidr.usable_hosts(self.policy) == cidr.address_count() {
            return None;
        }
        if ip == cidr.lo() {
            Some(Conflict::new(
                ip,
                ConflictKind::NetworkAddressAssigned,
                Severity::Warning,
                format!("IP {ip} is the network address of {cidr}"),
            ))
        } else if ip == cidr.hi() {
            Some(Conflict::new(
                ip,
                ConflictKind::BroadcastAddressAssigned,
                Severity::Warning,
                format!("IP {ip} is the broadcast address of {cidr}"),
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{AddressAllocator, AssignRequest};
    use crate::models::{AddressStatus, Host, NewHost, SubnetMetadata};
    use crate::registry::SubnetRegistry;
    use chrono::Utc;

    fn setup() -> (Database, String) {
        let db = Database::in_memory();
        let subnet_id = SubnetRegistry::default()
            .create(&db, "10.0.0.0", 24, SubnetMetadata::default())
            .unwrap()
            .value;
        db.transaction(|tx| {
            tx.hosts.insert(
                "h1".to_string(),
                Host::from_new("h1".to_string(), NewHost::named("h1"), Utc::now()),
            );
            Ok(())
        })
        .unwrap();
        (db, subnet_id)
    }

    #[test]
    fn test_clean_store_has_no_conflicts() {
        let (db, _) = setup();
        AddressAllocator::default()
            .assign(&db, AssignRequest::new("10.0.0.10", "h1"))
            .unwrap();
        assert!(ConflictDetector::default().detect(&db).unwrap().is_empty());
    }

    #[test]
    fn test_network_and_broadcast_assigned() {
        let (db, _) = setup();
        let allocator = AddressAllocator::default();
        allocator.assign(&db, AssignRequest::new("10.0.0.0", "h1")).unwrap();
        allocator.assign(&db, AssignRequest::new("10.0.0.255", "h1")).unwrap();

        let kinds: Vec<ConflictKind> = ConflictDetector::default()
            .detect(&db)
            .unwrap()
            .into_iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ConflictKind::NetworkAddressAssigned,
                ConflictKind::BroadcastAddressAssigned
            ]
        );
    }

    #[test]
    fn test_broken_references() {
        let (db, subnet_id) = setup();
        db.transaction(|tx| {
            let now = Utc::now();
            let outside: IpAddr = "10.9.0.1".parse().unwrap();
            tx.addresses
                .insert(outside, Address::new(outside, Some(subnet_id.clone()), now));

            let orphan: IpAddr = "10.0.0.20".parse().unwrap();
            let mut a = Address::new(orphan, Some("gone".to_string()), now);
            a.status = AddressStatus::Assigned;
            a.host_id = Some("ghost".to_string());
            tx.addresses.insert(orphan, a);

            let odd: IpAddr = "10.0.0.30".parse().unwrap();
            let mut a = Address::new(odd, Some(subnet_id.clone()), now);
            a.status = AddressStatus::Assigned;
            tx.addresses.insert(odd, a);
            Ok(())
        })
        .unwrap();

        let conflicts = ConflictDetector::default().detect(&db).unwrap();
        let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConflictKind::MissingSubnet,
                ConflictKind::MissingHost,
                ConflictKind::InconsistentStatus,
                ConflictKind::SubnetMismatch,
            ]
        );
        assert!(conflicts.iter().all(|c| c.severity == Severity::Error));
    }
}
