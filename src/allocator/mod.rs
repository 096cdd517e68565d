//! Address allocator.
//!
//! Owns per-address allocation records: next free address search, assign,
//! release and the cascading release used when a host goes away.
//!
//! Status transitions:
//! - `available -> assigned` and `assigned -> available` via assign/release
//! - `reserved -> available` via release
//! - `available -> reserved` only through [`AddressAllocator::update_record`]
//!
//! Releasing a record clears its reservation type and description.

use crate::audit::{snapshot, AuditRecorder, AuditStatus, Recorded};
use crate::error::{Error, Result};
use crate::history;
use crate::models::{
    new_id, normalize_mac, parse_ip, Address, AddressStats, AddressStatus, AddressUpdate,
    AuditAction, CapacityPolicy, EntityType, HistoryAction, IpHistoryEntry,
};
use crate::store::{Database, Tables};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::net::IpAddr;

/// Arguments of [`AddressAllocator::assign`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignRequest {
    pub ip: String,
    pub host_id: String,
    /// Resolved from the address when omitted.
    pub subnet_id: Option<String>,
    pub mac_address: Option<String>,
    pub dns_name: Option<String>,
}

impl AssignRequest {
    pub fn new(ip: &str, host_id: &str) -> Self {
        AssignRequest {
            ip: ip.to_string(),
            host_id: host_id.to_string(),
            ..Default::default()
        }
    }

    pub fn subnet(mut self, subnet_id: &str) -> Self {
        self.subnet_id = Some(subnet_id.to_string());
        self
    }

    pub fn mac(mut self, mac: &str) -> Self {
        self.mac_address = Some(mac.to_string());
        self
    }

    pub fn dns_name(mut self, name: &str) -> Self {
        self.dns_name = Some(name.to_string());
        self
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_mac(value: Option<String>) -> Result<Option<String>> {
    clean_text(value).map(|m| normalize_mac(&m)).transpose()
}

/// Subnet reference for `ip`: the explicit one if given, else the first
/// containing subnet.
fn resolve_subnet(tables: &Tables, ip: IpAddr, subnet_id: Option<&str>) -> Result<Option<String>> {
    match subnet_id {
        Some(id) => {
            let subnet = tables
                .subnet(id)
                .ok_or_else(|| Error::not_found("Subnet", id))?;
            if !subnet.contains(ip) {
                return Err(Error::Validation(format!(
                    "IP {ip} is not inside subnet {}",
                    subnet.cidr()
                )));
            }
            Ok(Some(subnet.id.clone()))
        }
        None => Ok(tables.find_containing(ip).map(|s| s.id.clone())),
    }
}

/// Set one stored record back to `available`.
///
/// Returns the record before and after. Only an actual state change is
/// written to the history.
pub(crate) fn release_in(
    tables: &mut Tables,
    ip: IpAddr,
    now: DateTime<Utc>,
) -> Result<(Address, Address)> {
    let record = tables
        .address_mut(ip)
        .ok_or_else(|| Error::not_found("Address", ip))?;
    let before = record.clone();
    record.status = AddressStatus::Available;
    record.host_id = None;
    record.reservation_type = None;
    record.reservation_description = None;
    record.updated_at = now;
    let after = record.clone();

    if before.status != AddressStatus::Available {
        history::append(
            tables,
            IpHistoryEntry {
                id: new_id(),
                ip,
                action: HistoryAction::Released,
                timestamp: now,
                host_id: None,
                subnet_id: after.subnet_id.clone(),
                previous_host_id: before.host_id.clone(),
                dns_name: after.dns_name.clone(),
                mac_address: after.mac_address.clone(),
            },
        );
    }
    Ok((before, after))
}

/// Release every record owned by `host_id`, returning the released addresses.
pub(crate) fn release_host_in(
    tables: &mut Tables,
    host_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<IpAddr>> {
    let owned: Vec<IpAddr> = tables
        .addresses
        .values()
        .filter(|a| a.host_id.as_deref() == Some(host_id))
        .map(|a| a.ip)
        .collect();
    for ip in &owned {
        release_in(tables, *ip, now)?;
    }
    Ok(owned)
}

/// Per-address allocation records and the assign/release algorithm.
#[derive(Debug, Clone, Default)]
pub struct AddressAllocator {
    policy: CapacityPolicy,
    audit: AuditRecorder,
}

impl AddressAllocator {
    pub fn new(policy: CapacityPolicy, audit: AuditRecorder) -> Self {
        AddressAllocator { policy, audit }
    }

    /// Lowest usable address of the subnet with no record or an `available` one.
    ///
    /// The answer is advisory: a concurrent caller may take it first, and
    /// [`assign`](Self::assign) performs its own conflict check.
    pub fn next_available(&self, db: &Database, subnet_id: &str) -> Result<Option<IpAddr>> {
        db.read(|t| {
            let subnet = t
                .subnet(subnet_id)
                .ok_or_else(|| Error::not_found("Subnet", subnet_id))?;
            let next = subnet.cidr().hosts(self.policy).find(|ip| {
                t.address(*ip)
                    .map_or(true, |a| a.status == AddressStatus::Available)
            });
            log::debug!("Next available in {}: {next:?}", subnet.cidr());
            Ok(next)
        })
    }

    /// Assign `request.ip` to `request.host_id`.
    ///
    /// Fails with [`Error::AlreadyAssigned`] when another host holds the
    /// address. Re-assigning to the current owner refreshes the MAC, DNS name
    /// and subnet reference.
    pub fn assign(&self, db: &Database, request: AssignRequest) -> Result<Recorded<Address>> {
        let ip = parse_ip(&request.ip)?;
        let host_id = request.host_id.trim().to_string();
        let mac_address = clean_mac(request.mac_address)?;
        let dns_name = clean_text(request.dns_name);

        let (before, after) = db.transaction(|tx| {
            if tx.host(&host_id).is_none() {
                return Err(Error::not_found("Host", &host_id));
            }
            let subnet_id = resolve_subnet(tx, ip, request.subnet_id.as_deref())?;
            if subnet_id.is_none() {
                log::info!("IP {ip} is not inside any configured subnet");
            }

            let before = tx.address(ip).cloned();
            if let Some(existing) = &before {
                if let (AddressStatus::Assigned, Some(owner)) = (existing.status, &existing.host_id) {
                    if *owner != host_id {
                        return Err(Error::AlreadyAssigned {
                            ip,
                            host_id: owner.clone(),
                        });
                    }
                }
            }

            let now = Utc::now();
            let record = tx
                .addresses
                .entry(ip)
                .or_insert_with(|| Address::new(ip, None, now));
            record.subnet_id = subnet_id.clone();
            record.host_id = Some(host_id.clone());
            record.status = AddressStatus::Assigned;
            record.mac_address = mac_address.clone();
            record.dns_name = dns_name.clone();
            record.updated_at = now;
            let after = record.clone();

            history::append(
                tx,
                IpHistoryEntry {
                    id: new_id(),
                    ip,
                    action: HistoryAction::Assigned,
                    timestamp: now,
                    host_id: Some(host_id.clone()),
                    subnet_id,
                    previous_host_id: before.as_ref().and_then(|b| b.host_id.clone()),
                    dns_name: dns_name.clone(),
                    mac_address: mac_address.clone(),
                },
            );
            Ok((before, after))
        })?;

        let refreshed = before.as_ref().is_some_and(|b| b.is_assigned());
        let details = if refreshed {
            format!("Refreshed assignment of {ip} to host {host_id}")
        } else {
            format!("Assigned {ip} to host {host_id}")
        };
        log::info!("{details}");

        Ok(self.audit.wrap(
            db,
            after.clone(),
            AuditAction::Assign,
            EntityType::Address,
            &ip.to_string(),
            &details,
            before.as_ref().and_then(snapshot),
            snapshot(&after),
        ))
    }

    /// Return a stored address to the pool.
    ///
    /// Releasing an already available record succeeds without change;
    /// releasing an address that was never recorded is [`Error::NotFound`].
    pub fn release(&self, db: &Database, ip: &str) -> Result<Recorded<Address>> {
        let ip = parse_ip(ip)?;
        let (before, after) = db.transaction(|tx| release_in(tx, ip, Utc::now()))?;
        let details = match &before.host_id {
            Some(host_id) => format!("Released {ip} from host {host_id}"),
            None => format!("Released {ip}"),
        };
        log::info!("{details}");

        Ok(self.audit.wrap(
            db,
            after.clone(),
            AuditAction::Release,
            EntityType::Address,
            &ip.to_string(),
            &details,
            snapshot(&before),
            snapshot(&after),
        ))
    }

    /// Release every address held by `host_id`.
    pub fn release_all_for_host(&self, db: &Database, host_id: &str) -> Result<Recorded<Vec<IpAddr>>> {
        let released = db.transaction(|tx| release_host_in(tx, host_id, Utc::now()))?;
        if released.is_empty() {
            log::debug!("Host {host_id} holds no addresses, nothing to release");
            return Ok(Recorded {
                value: released,
                audit: AuditStatus::Skipped,
            });
        }
        log::info!("Released {} address(es) held by host {host_id}", released.len());
        let details = format!("Released {} address(es): {}", released.len(), released.iter().join(", "));

        Ok(self.audit.wrap(
            db,
            released,
            AuditAction::Release,
            EntityType::Host,
            host_id,
            &details,
            None,
            None,
        ))
    }

    /// Status counts over every stored record, regardless of subnet.
    pub fn stats(&self, db: &Database) -> Result<AddressStats> {
        db.read(|t| {
            let mut stats = AddressStats::default();
            for a in t.addresses.values() {
                match a.status {
                    AddressStatus::Assigned => stats.assigned += 1,
                    AddressStatus::Available => stats.available += 1,
                    AddressStatus::Reserved => stats.reserved += 1,
                }
            }
            stats.total = t.addresses.len();
            Ok(stats)
        })
    }

    pub fn get(&self, db: &Database, ip: &str) -> Result<Address> {
        let ip = parse_ip(ip)?;
        db.read(|t| {
            t.address(ip)
                .cloned()
                .ok_or_else(|| Error::not_found("Address", ip))
        })
    }

    /// Records inside the subnet's block, ascending, optionally by status.
    pub fn list_by_subnet(
        &self,
        db: &Database,
        subnet_id: &str,
        status: Option<AddressStatus>,
    ) -> Result<Vec<Address>> {
        db.read(|t| {
            let subnet = t
                .subnet(subnet_id)
                .ok_or_else(|| Error::not_found("Subnet", subnet_id))?;
            Ok(t.addresses_in(subnet.cidr())
                .filter(|a| status.map_or(true, |s| a.status == s))
                .cloned()
                .collect())
        })
    }

    pub fn list_by_host(&self, db: &Database, host_id: &str) -> Result<Vec<Address>> {
        db.read(|t| {
            Ok(t.addresses
                .values()
                .filter(|a| a.host_id.as_deref() == Some(host_id))
                .cloned()
                .collect())
        })
    }

    /// Administrative change to a record, creating it if needed.
    ///
    /// Can reserve or free an unassigned address and edit its MAC, DNS name
    /// and subnet reference. Assigned records keep their status until
    /// released, and nothing here can assign.
    pub fn update_record(
        &self,
        db: &Database,
        ip: &str,
        update: AddressUpdate,
    ) -> Result<Recorded<Address>> {
        let ip = parse_ip(ip)?;
        if update == AddressUpdate::default() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        if update.status == Some(AddressStatus::Assigned) {
            return Err(Error::Validation(format!(
                "Status of {ip} cannot be set to assigned directly, use assign"
            )));
        }
        let mac_address = update.mac_address.map(clean_mac).transpose()?;
        let dns_name = update.dns_name.map(clean_text);
        let reservation_type = update.reservation_type.map(clean_text);
        let reservation_description = update.reservation_description.map(clean_text);

        let (before, after) = db.transaction(|tx| {
            let before = tx.address(ip).cloned();
            if let (Some(existing), Some(_)) = (&before, update.status) {
                if existing.is_assigned() {
                    return Err(Error::Validation(format!(
                        "IP {ip} is assigned, release it before changing its status"
                    )));
                }
            }
            let subnet_id = match &update.subnet_id {
                Some(Some(id)) => Some(resolve_subnet(tx, ip, Some(id))?),
                Some(None) => Some(None),
                None => None,
            };
            let default_subnet = tx.find_containing(ip).map(|s| s.id.clone());

            let now = Utc::now();
            let record = tx
                .addresses
                .entry(ip)
                .or_insert_with(|| Address::new(ip, default_subnet, now));
            if let Some(status) = update.status {
                record.status = status;
                record.host_id = None;
            }
            if let Some(subnet_id) = subnet_id {
                record.subnet_id = subnet_id;
            }
            if let Some(mac) = mac_address {
                record.mac_address = mac;
            }
            if let Some(dns) = dns_name {
                record.dns_name = dns;
            }
            if let Some(kind) = reservation_type {
                record.reservation_type = kind;
            }
            if let Some(description) = reservation_description {
                record.reservation_description = description;
            }
            record.updated_at = now;
            Ok((before, record.clone()))
        })?;

        let action = if before.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        let details = format!("Updated record {ip} (status {})", after.status);
        log::info!("{details}");

        Ok(self.audit.wrap(
            db,
            after.clone(),
            action,
            EntityType::Address,
            &ip.to_string(),
            &details,
            before.as_ref().and_then(snapshot),
            snapshot(&after),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::tests::BrokenSink;
    use crate::models::{Host, NewHost, SubnetMetadata};
    use crate::registry::SubnetRegistry;
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn add_host(db: &Database, id: &str) {
        db.transaction(|tx| {
            tx.hosts.insert(
                id.to_string(),
                Host::from_new(id.to_string(), NewHost::named(id), Utc::now()),
            );
            Ok(())
        })
        .unwrap();
    }

    fn setup(network: &str, prefix: u8) -> (Database, AddressAllocator, String) {
        let db = Database::in_memory();
        let subnet_id = SubnetRegistry::default()
            .create(&db, network, prefix, SubnetMetadata::default())
            .unwrap()
            .value;
        add_host(&db, "hostA");
        add_host(&db, "hostB");
        (db, AddressAllocator::default(), subnet_id)
    }

    #[test]
    fn test_next_available_exhausts_slash_30() {
        let (db, allocator, id) = setup("10.0.0.0", 30);
        assert_eq!(allocator.next_available(&db, &id).unwrap(), Some(ip("10.0.0.1")));
        allocator.assign(&db, AssignRequest::new("10.0.0.1", "hostA")).unwrap();
        assert_eq!(allocator.next_available(&db, &id).unwrap(), Some(ip("10.0.0.2")));
        allocator.assign(&db, AssignRequest::new("10.0.0.2", "hostB")).unwrap();
        assert_eq!(allocator.next_available(&db, &id).unwrap(), None);
    }

    #[test]
    fn test_next_available_skips_reserved_and_reuses_available_record() {
        let (db, allocator, id) = setup("10.0.0.0", 29);
        allocator.update_record(&db, "10.0.0.1", AddressUpdate::reserve()).unwrap();
        assert_eq!(allocator.next_available(&db, &id).unwrap(), Some(ip("10.0.0.2")));

        allocator.assign(&db, AssignRequest::new("10.0.0.2", "hostA")).unwrap();
        allocator.release(&db, "10.0.0.2").unwrap();
        assert_eq!(allocator.next_available(&db, &id).unwrap(), Some(ip("10.0.0.2")));
        assert!(matches!(
            allocator.next_available(&db, "missing"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_next_available_slash_31_by_policy() {
        let (db, allocator, id) = setup("10.0.0.0", 31);
        assert_eq!(allocator.next_available(&db, &id).unwrap(), None);
        let p2p = AddressAllocator::new(CapacityPolicy::PointToPoint, AuditRecorder::default());
        assert_eq!(p2p.next_available(&db, &id).unwrap(), Some(ip("10.0.0.0")));
    }

    #[test]
    fn test_assign_resolves_subnet_and_normalizes() {
        let (db, allocator, id) = setup("10.0.0.0", 24);
        let assigned = allocator
            .assign(
                &db,
                AssignRequest::new("10.0.0.5", "hostA")
                    .mac("AA-BB-CC-DD-EE-FF")
                    .dns_name(" web-01.lab "),
            )
            .unwrap();
        assert!(assigned.audit.is_recorded());
        let record = assigned.value;
        assert_eq!(record.subnet_id.as_deref(), Some(id.as_str()));
        assert_eq!(record.status, AddressStatus::Assigned);
        assert_eq!(record.mac_address.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(record.dns_name.as_deref(), Some("web-01.lab"));
    }

    #[test]
    fn test_assign_outside_any_subnet() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        let record = allocator
            .assign(&db, AssignRequest::new("192.168.50.5", "hostA"))
            .unwrap()
            .value;
        assert_eq!(record.subnet_id, None);
    }

    #[test]
    fn test_assign_validation() {
        let (db, allocator, id) = setup("10.0.0.0", 24);
        assert!(matches!(
            allocator.assign(&db, AssignRequest::new("10.0.0.300", "hostA")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            allocator.assign(&db, AssignRequest::new("10.0.0.5", "ghost")),
            Err(Error::NotFound { entity: "Host", .. })
        ));
        assert!(matches!(
            allocator.assign(&db, AssignRequest::new("10.0.1.5", "hostA").subnet(&id)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            allocator.assign(&db, AssignRequest::new("10.0.0.5", "hostA").subnet("nope")),
            Err(Error::NotFound { entity: "Subnet", .. })
        ));
        assert!(matches!(
            allocator.assign(&db, AssignRequest::new("10.0.0.5", "hostA").mac("zz")),
            Err(Error::Validation(_))
        ));
        assert_eq!(allocator.stats(&db).unwrap().total, 0);
    }

    #[test]
    fn test_conflicting_assign_and_same_owner_refresh() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        allocator
            .assign(&db, AssignRequest::new("10.0.0.1", "hostA").dns_name("old"))
            .unwrap();

        let conflict = allocator.assign(&db, AssignRequest::new("10.0.0.1", "hostB"));
        match conflict {
            Err(Error::AlreadyAssigned { ip: got, host_id }) => {
                assert_eq!(got, ip("10.0.0.1"));
                assert_eq!(host_id, "hostA");
            }
            other => panic!("expected AlreadyAssigned, got {other:?}"),
        }

        let refreshed = allocator
            .assign(&db, AssignRequest::new("10.0.0.1", "hostA").dns_name("new"))
            .unwrap()
            .value;
        assert_eq!(refreshed.host_id.as_deref(), Some("hostA"));
        assert_eq!(refreshed.dns_name.as_deref(), Some("new"));
    }

    #[test]
    fn test_release_semantics() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        allocator.assign(&db, AssignRequest::new("10.0.0.9", "hostA")).unwrap();

        let released = allocator.release(&db, "10.0.0.9").unwrap().value;
        assert_eq!(released.status, AddressStatus::Available);
        assert_eq!(released.host_id, None);

        // Already available: idempotent.
        assert!(allocator.release(&db, "10.0.0.9").is_ok());
        // Never recorded: not found.
        assert!(matches!(
            allocator.release(&db, "10.0.0.99"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_release_all_for_host() {
        let (db, allocator, id) = setup("10.0.0.0", 24);
        for a in ["10.0.0.1", "10.0.0.2"] {
            allocator.assign(&db, AssignRequest::new(a, "hostA")).unwrap();
        }
        allocator.assign(&db, AssignRequest::new("10.0.0.3", "hostB")).unwrap();

        let released = allocator.release_all_for_host(&db, "hostA").unwrap().value;
        assert_eq!(released, vec![ip("10.0.0.1"), ip("10.0.0.2")]);
        assert!(allocator.list_by_host(&db, "hostA").unwrap().is_empty());
        assert_eq!(allocator.list_by_host(&db, "hostB").unwrap().len(), 1);
        assert_eq!(
            allocator
                .list_by_subnet(&db, &id, Some(AddressStatus::Available))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_release_all_for_host_without_addresses_is_not_audited() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        let before = AuditRecorder::default().list(&db, 100).unwrap().len();

        for host in ["hostB", "no-such-host"] {
            let outcome = allocator.release_all_for_host(&db, host).unwrap();
            assert!(outcome.value.is_empty());
            assert_eq!(outcome.audit, AuditStatus::Skipped);
            assert_eq!(outcome.audit.warning(), None);
        }
        assert_eq!(AuditRecorder::default().list(&db, 100).unwrap().len(), before);
    }

    #[test]
    fn test_stats() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        allocator.assign(&db, AssignRequest::new("10.0.0.1", "hostA")).unwrap();
        allocator.assign(&db, AssignRequest::new("10.0.0.2", "hostA")).unwrap();
        allocator.release(&db, "10.0.0.2").unwrap();
        allocator.update_record(&db, "10.0.0.3", AddressUpdate::reserve()).unwrap();
        assert_eq!(
            allocator.stats(&db).unwrap(),
            AddressStats {
                assigned: 1,
                available: 1,
                reserved: 1,
                total: 3,
            }
        );
    }

    #[test]
    fn test_update_record_rules() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        allocator.assign(&db, AssignRequest::new("10.0.0.1", "hostA")).unwrap();

        assert!(matches!(
            allocator.update_record(&db, "10.0.0.1", AddressUpdate::reserve()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            allocator.update_record(
                &db,
                "10.0.0.2",
                AddressUpdate {
                    status: Some(AddressStatus::Assigned),
                    ..Default::default()
                }
            ),
            Err(Error::Validation(_))
        ));
        assert!(allocator
            .update_record(&db, "10.0.0.2", AddressUpdate::default())
            .is_err());

        // Metadata edits on an assigned record are allowed.
        let edited = allocator
            .update_record(
                &db,
                "10.0.0.1",
                AddressUpdate {
                    dns_name: Some(Some("db-01".to_string())),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(edited.status, AddressStatus::Assigned);
        assert_eq!(edited.dns_name.as_deref(), Some("db-01"));

        let reserved = allocator
            .update_record(&db, "10.0.0.7", AddressUpdate::reserve())
            .unwrap()
            .value;
        assert_eq!(reserved.status, AddressStatus::Reserved);
        assert!(reserved.subnet_id.is_some());

        let freed = allocator.release(&db, "10.0.0.7").unwrap().value;
        assert_eq!(freed.status, AddressStatus::Available);
    }

    #[test]
    fn test_reservation_metadata() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        let gateway = allocator
            .update_record(
                &db,
                "10.0.0.1",
                AddressUpdate::reserve().reason(" gateway ", Some("core router")),
            )
            .unwrap()
            .value;
        assert_eq!(gateway.status, AddressStatus::Reserved);
        assert_eq!(gateway.reservation_type.as_deref(), Some("gateway"));
        assert_eq!(gateway.reservation_description.as_deref(), Some("core router"));

        let cleared = allocator
            .update_record(
                &db,
                "10.0.0.1",
                AddressUpdate {
                    reservation_description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(cleared.reservation_type.as_deref(), Some("gateway"));
        assert_eq!(cleared.reservation_description, None);

        let freed = allocator.release(&db, "10.0.0.1").unwrap().value;
        assert_eq!(freed.status, AddressStatus::Available);
        assert_eq!(freed.reservation_type, None);
    }

    #[test]
    fn test_history_written_on_assign_and_release() {
        let (db, allocator, _) = setup("10.0.0.0", 24);
        allocator.assign(&db, AssignRequest::new("10.0.0.4", "hostA")).unwrap();
        allocator.release(&db, "10.0.0.4").unwrap();
        allocator.release(&db, "10.0.0.4").unwrap();
        let history = db.read(|t| Ok(t.history.clone())).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, HistoryAction::Assigned);
        assert_eq!(history[1].action, HistoryAction::Released);
        assert_eq!(history[1].previous_host_id.as_deref(), Some("hostA"));
    }

    #[test]
    fn test_audit_failure_does_not_fail_assign() {
        let (db, _, _) = setup("10.0.0.0", 24);
        let allocator = AddressAllocator::new(
            CapacityPolicy::default(),
            AuditRecorder::new(Arc::new(BrokenSink)),
        );
        let result = allocator
            .assign(&db, AssignRequest::new("10.0.0.8", "hostA"))
            .unwrap();
        assert!(!result.audit.is_recorded());
        assert_eq!(result.value.status, AddressStatus::Assigned);
        assert!(allocator.get(&db, "10.0.0.8").unwrap().is_assigned());
    }
}
