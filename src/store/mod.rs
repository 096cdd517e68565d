//! Persistent store for subnets, addresses, hosts, history and audit entries.
//!
//! [`Database`] is the single source of truth. Every mutating operation runs
//! inside [`Database::transaction`], which holds the store lock for the whole
//! read-check-write sequence and only publishes the new state once the
//! closure succeeded and the file (if any) was written. On any error the
//! working copy is dropped, so partial changes are never visible.
//!
//! A file backed store also takes an exclusive OS lock on a `<path>.lock`
//! sidecar and reloads the tables from disk before running the closure, so
//! several handles (or processes) on one file serialize their transactions
//! and never write back a stale copy.

mod persist;

pub use persist::{load_tables, save_tables};

use crate::error::{Error, Result};
use crate::models::{Address, AuditEntry, Cidr, Host, IpHistoryEntry, IpRange, Subnet};
use serde::{Deserialize, Serialize};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::net::IpAddr;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Every table the engine keeps.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Tables {
    /// Subnets in creation order.
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    /// Address records keyed and ordered by address.
    #[serde(default, with = "persist::address_records")]
    pub addresses: BTreeMap<IpAddr, Address>,
    #[serde(default)]
    pub hosts: BTreeMap<String, Host>,
    /// Ranges in creation order.
    #[serde(default)]
    pub ranges: Vec<IpRange>,
    /// Oldest first.
    #[serde(default)]
    pub history: Vec<IpHistoryEntry>,
    /// Oldest first.
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
}

impl Tables {
    pub fn subnet(&self, id: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.id == id)
    }

    pub fn subnet_mut(&mut self, id: &str) -> Option<&mut Subnet> {
        self.subnets.iter_mut().find(|s| s.id == id)
    }

    /// Subnet registered for exactly this block.
    pub fn subnet_by_block(&self, cidr: &Cidr) -> Option<&Subnet> {
        self.subnets
            .iter()
            .find(|s| s.network == cidr.addr && s.prefix == cidr.mask)
    }

    /// First subnet in creation order whose block contains `ip`.
    pub fn find_containing(&self, ip: IpAddr) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.contains(ip))
    }

    pub fn address(&self, ip: IpAddr) -> Option<&Address> {
        self.addresses.get(&ip)
    }

    pub fn address_mut(&mut self, ip: IpAddr) -> Option<&mut Address> {
        self.addresses.get_mut(&ip)
    }

    /// Address records inside `cidr`, ascending.
    pub fn addresses_in(&self, cidr: Cidr) -> impl Iterator<Item = &Address> {
        self.addresses
            .range(cidr.lo()..=cidr.hi())
            .map(|(_, address)| address)
    }

    pub fn host(&self, id: &str) -> Option<&Host> {
        self.hosts.get(id)
    }

    pub fn range(&self, id: &str) -> Option<&IpRange> {
        self.ranges.iter().find(|r| r.id == id)
    }
}

/// Exclusive access to a working copy of the tables for one operation.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        self.tables
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Tables {
        self.tables
    }
}

/// Exclusive OS lock on the store's sidecar file, released on drop.
struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    fn acquire(store: &Path) -> Result<Self> {
        let path = persist::sibling_path(store, ".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| {
                Error::Storage(format!("Failed to open lock file {}: {e}", path.display()))
            })?;
        file.lock_exclusive().map_err(|e| {
            Error::Storage(format!("Failed to lock {}: {e}", path.display()))
        })?;
        log::trace!("Locked {}", path.display());
        Ok(FileLock { file, path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to unlock {}: {e}", self.path.display());
        }
    }
}

/// Storage handle passed explicitly to every operation.
#[derive(Debug)]
pub struct Database {
    path: Option<PathBuf>,
    state: Mutex<Tables>,
}

impl Database {
    /// A store that lives only as long as this value.
    pub fn in_memory() -> Self {
        Database {
            path: None,
            state: Mutex::new(Tables::default()),
        }
    }

    /// Open (or start) a JSON file backed store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Store file not found: {}, starting empty", path.display());
        }
        let tables = load_tables(path)?;
        Ok(Database {
            path: Some(path.to_path_buf()),
            state: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Take the file lock (if file backed) and refresh `tables` from disk.
    fn sync_from_disk(&self, tables: &mut Tables) -> Result<Option<FileLock>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let lock = FileLock::acquire(path)?;
        *tables = load_tables(path)?;
        Ok(Some(lock))
    }

    /// Run `f` as one serialized, all-or-nothing transaction.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))?;
        let _file_lock = self.sync_from_disk(&mut guard)?;
        let mut working = guard.clone();

        let out = f(&mut Transaction {
            tables: &mut working,
        })
        .inspect_err(|e| log::debug!("Transaction rolled back: {e}"))?;

        if let Some(path) = &self.path {
            save_tables(path, &working).map_err(|e| {
                log::error!("Failed to persist store to {}: {e}", path.display());
                e
            })?;
        }
        *guard = working;
        Ok(out)
    }

    /// Read a consistent view of the tables.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tables) -> Result<T>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))?;
        let _file_lock = self.sync_from_disk(&mut guard)?;
        f(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_commit_publishes_changes() {
        let db = Database::in_memory();
        db.transaction(|tx| {
            let a = ip("10.0.0.1");
            tx.addresses.insert(a, Address::new(a, None, Utc::now()));
            Ok(())
        })
        .unwrap();
        let count = db.read(|t| Ok(t.addresses.len())).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_error_rolls_back() {
        let db = Database::in_memory();
        let result: Result<()> = db.transaction(|tx| {
            let a = ip("10.0.0.1");
            tx.addresses.insert(a, Address::new(a, None, Utc::now()));
            Err(Error::Validation("nope".to_string()))
        });
        assert!(result.is_err());
        assert!(db.read(|t| Ok(t.addresses.is_empty())).unwrap());
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let db = Database::open(&path).unwrap();
        db.transaction(|_| Ok(())).unwrap();
        // A directory in the temp file's place makes the write fail.
        std::fs::create_dir(persist::sibling_path(&path, ".tmp")).unwrap();

        let result = db.transaction(|tx| {
            let a = ip("10.0.0.1");
            tx.addresses.insert(a, Address::new(a, None, Utc::now()));
            Ok(())
        });
        assert_eq!(result.unwrap_err().code(), "storage_error");
        assert!(db.read(|t| Ok(t.addresses.is_empty())).unwrap());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let db = Database::open(&path).unwrap();
            db.transaction(|tx| {
                let a = ip("192.168.1.10");
                tx.addresses.insert(a, Address::new(a, None, Utc::now()));
                Ok(())
            })
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.read(|t| Ok(t.address(ip("192.168.1.10")).is_some())).unwrap());
    }

    #[test]
    fn test_handles_on_one_file_see_each_other() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let first = Database::open(&path).unwrap();
        let second = Database::open(&path).unwrap();

        first
            .transaction(|tx| {
                let a = ip("10.0.0.1");
                tx.addresses.insert(a, Address::new(a, None, Utc::now()));
                Ok(())
            })
            .unwrap();
        assert!(second.read(|t| Ok(t.address(ip("10.0.0.1")).is_some())).unwrap());

        // The second handle's commit must build on the first one's, not on
        // the empty tables it opened with.
        second
            .transaction(|tx| {
                let a = ip("10.0.0.2");
                tx.addresses.insert(a, Address::new(a, None, Utc::now()));
                Ok(())
            })
            .unwrap();
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.read(|t| Ok(t.addresses.len())).unwrap(), 2);
        assert!(persist::sibling_path(&path, ".lock").exists());
    }

    #[test]
    fn test_addresses_in_block() {
        let mut tables = Tables::default();
        for s in ["10.0.0.5", "10.0.1.5", "10.0.0.250", "::1"] {
            let a = ip(s);
            tables.addresses.insert(a, Address::new(a, None, Utc::now()));
        }
        let block = Cidr::new("10.0.0.0/24").unwrap();
        let found: Vec<IpAddr> = tables.addresses_in(block).map(|a| a.ip).collect();
        assert_eq!(found, vec![ip("10.0.0.5"), ip("10.0.0.250")]);
    }
}
