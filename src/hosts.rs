//! Host (CMDB) registry.
//!
//! Hosts have their own lifecycle. Deleting one releases every address it
//! holds and then removes the row, inside a single transaction.

use crate::allocator::release_host_in;
use crate::audit::{snapshot, AuditRecorder, Recorded};
use crate::error::{Error, Result};
use crate::models::{new_id, Address, AuditAction, EntityType, Host, HostUpdate, NewHost};
use crate::store::Database;
use chrono::Utc;
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A host with the address records it currently holds.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HostView {
    #[serde(flatten)]
    pub host: Host,
    pub addresses: Vec<Address>,
}

/// Column a host listing is ordered by, after favorites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostSort {
    #[default]
    Name,
    State,
    Node,
    OperatingSystem,
}

impl HostSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostSort::Name => "vm_name",
            HostSort::State => "state",
            HostSort::Node => "node",
            HostSort::OperatingSystem => "operating_system",
        }
    }

    fn key<'a>(&self, host: &'a Host) -> Option<&'a str> {
        match self {
            HostSort::Name => Some(host.vm_name.as_str()),
            HostSort::State => host.state.as_deref(),
            HostSort::Node => host.node.as_deref(),
            HostSort::OperatingSystem => host.operating_system.as_deref(),
        }
    }

    /// Hosts with the column unset go last; ties fall back to the name.
    fn compare(&self, a: &Host, b: &Host) -> Ordering {
        let column = match (self.key(a), self.key(b)) {
            (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        column.then_with(|| a.vm_name.cmp(&b.vm_name))
    }
}

impl fmt::Display for HostSort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "vm_name" | "name" => Ok(HostSort::Name),
            "state" => Ok(HostSort::State),
            "node" => Ok(HostSort::Node),
            "operating_system" | "os" => Ok(HostSort::OperatingSystem),
            other => Err(Error::Validation(format!(
                "Unknown host sort column: {other} (use vm_name, state, node or operating_system)"
            ))),
        }
    }
}

/// Narrowing and ordering for [`HostRegistry::list`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostFilter {
    /// Exact state, compared case-insensitively.
    pub state: Option<String>,
    /// Substring of the name, operating system or node, any case.
    pub search: Option<String>,
    pub sort: HostSort,
}

impl HostFilter {
    fn matches(&self, host: &Host) -> bool {
        let state_ok = match self.state.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(state) => host
                .state
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(state)),
        };
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [
                    Some(host.vm_name.as_str()),
                    host.operating_system.as_deref(),
                    host.node.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        };
        state_ok && search_ok
    }
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Host name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    audit: AuditRecorder,
}

impl HostRegistry {
    pub fn new(audit: AuditRecorder) -> Self {
        HostRegistry { audit }
    }

    pub fn create(&self, db: &Database, new: NewHost) -> Result<Recorded<String>> {
        let vm_name = require_name(&new.vm_name)?;
        let host = db.transaction(|tx| {
            let host = Host::from_new(new_id(), NewHost { vm_name, ..new }, Utc::now());
            tx.hosts.insert(host.id.clone(), host.clone());
            Ok(host)
        })?;
        log::info!("Host {} added (ID: {})", host.vm_name, host.id);

        Ok(self.audit.wrap(
            db,
            host.id.clone(),
            AuditAction::Create,
            EntityType::Host,
            &host.id,
            &format!("Added host {}", host.vm_name),
            None,
            snapshot(&host),
        ))
    }

    pub fn get(&self, db: &Database, id: &str) -> Result<HostView> {
        db.read(|t| {
            let host = t.host(id).ok_or_else(|| Error::not_found("Host", id))?;
            Ok(HostView {
                host: host.clone(),
                addresses: t
                    .addresses
                    .values()
                    .filter(|a| a.host_id.as_deref() == Some(id))
                    .cloned()
                    .collect(),
            })
        })
    }

    /// Hosts passing `filter`, favorites first, then by the sort column.
    pub fn list(&self, db: &Database, filter: &HostFilter) -> Result<Vec<Host>> {
        db.read(|t| {
            Ok(t.hosts
                .values()
                .filter(|h| filter.matches(h))
                .sorted_by(|a, b| {
                    b.favorite
                        .cmp(&a.favorite)
                        .then_with(|| filter.sort.compare(a, b))
                })
                .cloned()
                .collect())
        })
    }

    pub fn update(&self, db: &Database, id: &str, mut update: HostUpdate) -> Result<Recorded<Host>> {
        update.vm_name = update.vm_name.as_deref().map(require_name).transpose()?;
        let (before, after) = db.transaction(|tx| {
            let host = tx
                .hosts
                .get_mut(id)
                .ok_or_else(|| Error::not_found("Host", id))?;
            let before = host.clone();
            if !host.apply(update) {
                return Err(Error::Validation("No fields to update".to_string()));
            }
            host.updated_at = Utc::now();
            Ok((before, host.clone()))
        })?;
        log::info!("Host {} updated", after.vm_name);

        Ok(self.audit.wrap(
            db,
            after.clone(),
            AuditAction::Update,
            EntityType::Host,
            id,
            &format!("Updated host {}", after.vm_name),
            snapshot(&before),
            snapshot(&after),
        ))
    }

    /// Release the host's addresses, then remove it. Returns the released
    /// addresses.
    pub fn delete(&self, db: &Database, id: &str) -> Result<Recorded<Vec<IpAddr>>> {
        let (host, released) = db.transaction(|tx| {
            let host = tx
                .host(id)
                .cloned()
                .ok_or_else(|| Error::not_found("Host", id))?;
            let released = release_host_in(tx, id, Utc::now())?;
            tx.hosts.remove(id);
            Ok((host, released))
        })?;
        log::info!(
            "Host {} deleted, {} address(es) released",
            host.vm_name,
            released.len()
        );

        let details = if released.is_empty() {
            format!("Deleted host {}", host.vm_name)
        } else {
            format!(
                "Deleted host {} and released {}",
                host.vm_name,
                released.iter().join(", ")
            )
        };
        Ok(self.audit.wrap(
            db,
            released,
            AuditAction::Delete,
            EntityType::Host,
            id,
            &details,
            snapshot(&host),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{AddressAllocator, AssignRequest};
    use crate::models::{AddressStatus, SubnetMetadata};
    use crate::registry::SubnetRegistry;

    #[test]
    fn test_create_get_list() {
        let db = Database::in_memory();
        let hosts = HostRegistry::default();
        let b = hosts.create(&db, NewHost::named("  web-b ")).unwrap().value;
        let a = hosts.create(&db, NewHost::named("web-a")).unwrap().value;
        let fav = hosts
            .create(
                &db,
                NewHost {
                    favorite: true,
                    ..NewHost::named("zz-fav")
                },
            )
            .unwrap()
            .value;

        assert_eq!(hosts.get(&db, &b).unwrap().host.vm_name, "web-b");
        let names: Vec<String> = hosts
            .list(&db, &HostFilter::default())
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(names, vec![fav, a, b]);
        assert!(matches!(
            hosts.create(&db, NewHost::named("  ")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(hosts.get(&db, "missing"), Err(Error::NotFound { .. })));
    }

    fn add(hosts: &HostRegistry, db: &Database, name: &str, state: &str, os: Option<&str>, node: &str) {
        hosts
            .create(
                db,
                NewHost {
                    state: Some(state.to_string()),
                    operating_system: os.map(str::to_string),
                    node: Some(node.to_string()),
                    ..NewHost::named(name)
                },
            )
            .unwrap();
    }

    fn names(hosts: Vec<Host>) -> Vec<String> {
        hosts.into_iter().map(|h| h.vm_name).collect()
    }

    #[test]
    fn test_list_filter_and_sort() {
        let db = Database::in_memory();
        let hosts = HostRegistry::default();
        add(&hosts, &db, "web-01", "running", Some("Ubuntu 22.04"), "pve-2");
        add(&hosts, &db, "db-01", "stopped", Some("Debian 12"), "pve-1");
        add(&hosts, &db, "mail", "Running", None, "pve-3");

        let running = HostFilter {
            state: Some("running".to_string()),
            ..Default::default()
        };
        assert_eq!(names(hosts.list(&db, &running).unwrap()), vec!["mail", "web-01"]);

        let search = HostFilter {
            search: Some("DEBIAN".to_string()),
            ..Default::default()
        };
        assert_eq!(names(hosts.list(&db, &search).unwrap()), vec!["db-01"]);
        let by_node = HostFilter {
            search: Some("pve-2".to_string()),
            ..Default::default()
        };
        assert_eq!(names(hosts.list(&db, &by_node).unwrap()), vec!["web-01"]);

        let by_os = HostFilter {
            sort: HostSort::OperatingSystem,
            ..Default::default()
        };
        assert_eq!(
            names(hosts.list(&db, &by_os).unwrap()),
            vec!["db-01", "web-01", "mail"]
        );
        let by_node = HostFilter {
            sort: "node".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(
            names(hosts.list(&db, &by_node).unwrap()),
            vec!["db-01", "web-01", "mail"]
        );
        assert!("memory".parse::<HostSort>().is_err());
    }

    #[test]
    fn test_update() {
        let db = Database::in_memory();
        let hosts = HostRegistry::default();
        let id = hosts.create(&db, NewHost::named("db-01")).unwrap().value;
        let updated = hosts
            .update(
                &db,
                &id,
                HostUpdate {
                    state: Some(Some("running".to_string())),
                    ..Default::default()
                },
            )
            .unwrap()
            .value;
        assert_eq!(updated.state.as_deref(), Some("running"));
        assert!(hosts.update(&db, &id, HostUpdate::default()).is_err());
        assert!(hosts
            .update(
                &db,
                &id,
                HostUpdate {
                    vm_name: Some(String::new()),
                    ..Default::default()
                }
            )
            .is_err());
    }

    #[test]
    fn test_delete_releases_addresses_first() {
        let db = Database::in_memory();
        let hosts = HostRegistry::default();
        let allocator = AddressAllocator::default();
        SubnetRegistry::default()
            .create(&db, "10.5.0.0", 24, SubnetMetadata::default())
            .unwrap();
        let id = hosts.create(&db, NewHost::named("app-01")).unwrap().value;
        allocator.assign(&db, AssignRequest::new("10.5.0.10", &id)).unwrap();
        allocator.assign(&db, AssignRequest::new("10.5.0.11", &id)).unwrap();
        assert_eq!(hosts.get(&db, &id).unwrap().addresses.len(), 2);

        let released = hosts.delete(&db, &id).unwrap().value;
        assert_eq!(released.len(), 2);
        assert!(matches!(hosts.get(&db, &id), Err(Error::NotFound { .. })));
        for ip in ["10.5.0.10", "10.5.0.11"] {
            let record = allocator.get(&db, ip).unwrap();
            assert_eq!(record.status, AddressStatus::Available);
            assert_eq!(record.host_id, None);
        }
    }
}
