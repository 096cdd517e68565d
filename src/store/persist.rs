//! JSON file persistence for the store.
//!
//! The whole table set is written on every commit, to a temp file first and
//! then renamed over the previous copy.

use super::Tables;
use crate::error::{Error, Result};
use crate::models::{Address, Cidr};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Read the tables from `path`, or start empty if the file does not exist.
pub fn load_tables(path: &Path) -> Result<Tables> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("Store file not found: {}, starting empty", path.display());
            return Ok(Tables::default());
        }
        Err(e) => return Err(e.into()),
    };
    log::debug!("Reading store file: {}", path.display());

    let mut deserializer = serde_json::Deserializer::from_str(&json);
    let mut tables: Tables = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        Error::Storage(format!(
            "Error parsing store {}: path={} error={}",
            path.display(),
            e.path(),
            e
        ))
    })?;

    canonicalize_subnets(path, &mut tables)?;

    let inconsistent = tables
        .addresses
        .values()
        .filter(|a| !a.is_consistent())
        .count();
    if inconsistent > 0 {
        log::warn!(
            "{inconsistent} address record(s) in {} have a status that disagrees with their host reference",
            path.display()
        );
    }
    log::debug!(
        "Loaded {} subnets, {} addresses, {} hosts, {} audit entries",
        tables.subnets.len(),
        tables.addresses.len(),
        tables.hosts.len(),
        tables.audit.len()
    );
    Ok(tables)
}

/// Reject subnets whose prefix does not fit their family and clear host
/// bits left in a stored network address.
fn canonicalize_subnets(path: &Path, tables: &mut Tables) -> Result<()> {
    for (i, subnet) in tables.subnets.iter_mut().enumerate() {
        let cidr = Cidr::from_addr(subnet.network, subnet.prefix).map_err(|e| {
            Error::Storage(format!(
                "Error parsing store {}: path=subnets[{i}] error={e}",
                path.display()
            ))
        })?;
        if cidr.addr != subnet.network {
            log::warn!(
                "Subnet {} stored as {}/{}, using {cidr}",
                subnet.id,
                subnet.network,
                subnet.prefix
            );
            subnet.network = cidr.addr;
        }
    }
    Ok(())
}

/// Write the tables to `path` via a sibling temp file.
pub fn save_tables(path: &Path, tables: &Tables) -> Result<()> {
    let json = serde_json::to_string_pretty(tables)?;
    let tmp = sibling_path(path, ".tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    log::trace!("Store written to {}", path.display());
    Ok(())
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut sibling = path.as_os_str().to_owned();
    sibling.push(suffix);
    PathBuf::from(sibling)
}

/// Address map stored as a plain list of records keyed by their `ip`.
pub(crate) mod address_records {
    use super::*;
    use serde::de;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        map: &BTreeMap<IpAddr, Address>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> std::result::Result<BTreeMap<IpAddr, Address>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let records = Vec::<Address>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for record in records {
            let ip = record.ip;
            if map.insert(ip, record).is_some() {
                return Err(de::Error::custom(format!(
                    "duplicate address record {ip}"
                )));
            }
        }
        Ok(map)
    }
}
