//! Subnet registry.
//!
//! Owns subnet definitions: validates and canonicalizes network/prefix pairs
//! and answers containment and capacity queries. Blocks are expected to be
//! disjoint but this is not enforced; containment lookups return the first
//! match in creation order.

use crate::audit::{snapshot, AuditRecorder, Recorded};
use crate::error::{Error, Result};
use crate::models::{
    new_id, parse_ip, AddressStatus, AuditAction, CapacityPolicy, Cidr, EntityType, Subnet,
    SubnetMetadata, SubnetUpdate,
};
use crate::store::{Database, Tables};
use chrono::Utc;
use serde::Serialize;
use std::net::IpAddr;

/// A subnet together with its derived (never stored) usage counts.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SubnetUsage {
    #[serde(flatten)]
    pub subnet: Subnet,
    /// Usable host addresses per the capacity policy.
    pub total: u128,
    pub assigned: usize,
    pub reserved: usize,
    /// `total - assigned - reserved`, never below zero.
    pub available: u128,
}

/// Count assigned and reserved records inside the subnet's block.
pub(crate) fn usage(tables: &Tables, subnet: &Subnet, policy: CapacityPolicy) -> SubnetUsage {
    let cidr = subnet.cidr();
    let (assigned, reserved) =
        tables
            .addresses_in(cidr)
            .fold((0usize, 0usize), |(assigned, reserved), a| match a.status {
                AddressStatus::Assigned => (assigned + 1, reserved),
                AddressStatus::Reserved => (assigned, reserved + 1),
                AddressStatus::Available => (assigned, reserved),
            });
    let total = cidr.usable_hosts(policy);
    SubnetUsage {
        subnet: subnet.clone(),
        total,
        assigned,
        reserved,
        available: total.saturating_sub((assigned + reserved) as u128),
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_gateway(gateway: Option<String>, cidr: &Cidr) -> Result<Option<IpAddr>> {
    match clean_text(gateway) {
        None => Ok(None),
        Some(literal) => {
            let gateway = parse_ip(&literal)?;
            if gateway.is_ipv4() != cidr.is_ipv4() {
                return Err(Error::Validation(format!(
                    "Gateway {gateway} is not in the same address family as {cidr}"
                )));
            }
            Ok(Some(gateway))
        }
    }
}

fn parse_dns_servers(servers: Vec<String>) -> Result<Vec<IpAddr>> {
    servers
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(parse_ip)
        .collect()
}

/// Subnet definitions and their containment/capacity queries.
#[derive(Debug, Clone, Default)]
pub struct SubnetRegistry {
    policy: CapacityPolicy,
    audit: AuditRecorder,
}

impl SubnetRegistry {
    pub fn new(policy: CapacityPolicy, audit: AuditRecorder) -> Self {
        SubnetRegistry { policy, audit }
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Register the block `network/prefix`, returning the new subnet id.
    ///
    /// `network` may be any address inside the block; the stored network is
    /// always the canonical one.
    pub fn create(
        &self,
        db: &Database,
        network: &str,
        prefix: u8,
        metadata: SubnetMetadata,
    ) -> Result<Recorded<String>> {
        let cidr = Cidr::from_parts(network, prefix)?;
        if cidr.addr.to_string() != network.trim() {
            log::info!("Canonicalized {}/{prefix} to {cidr}", network.trim());
        }
        let gateway = parse_gateway(metadata.gateway, &cidr)?;
        let dns_servers = parse_dns_servers(metadata.dns_servers)?;

        let subnet = db.transaction(|tx| {
            if tx.subnet_by_block(&cidr).is_some() {
                return Err(Error::DuplicateSubnet(cidr.to_string()));
            }
            let now = Utc::now();
            let subnet = Subnet {
                id: new_id(),
                network: cidr.addr,
                prefix: cidr.mask,
                name: clean_text(metadata.name),
                description: clean_text(metadata.description),
                vlan_id: clean_text(metadata.vlan_id),
                gateway,
                dns_servers,
                created_at: now,
                updated_at: now,
            };
            tx.subnets.push(subnet.clone());
            Ok(subnet)
        })?;
        log::info!("Subnet {cidr} added (ID: {})", subnet.id);

        Ok(self.audit.wrap(
            db,
            subnet.id.clone(),
            AuditAction::Create,
            EntityType::Subnet,
            &subnet.id,
            &format!("Added subnet {cidr}"),
            None,
            snapshot(&subnet),
        ))
    }

    /// Every subnet in creation order, with derived usage.
    pub fn list(&self, db: &Database) -> Result<Vec<SubnetUsage>> {
        db.read(|t| {
            Ok(t.subnets
                .iter()
                .map(|s| usage(t, s, self.policy))
                .collect())
        })
    }

    pub fn get(&self, db: &Database, id: &str) -> Result<SubnetUsage> {
        db.read(|t| {
            t.subnet(id)
                .map(|s| usage(t, s, self.policy))
                .ok_or_else(|| Error::not_found("Subnet", id))
        })
    }

    /// Patch descriptive fields. The block itself cannot change.
    pub fn update(
        &self,
        db: &Database,
        id: &str,
        update: SubnetUpdate,
    ) -> Result<Recorded<Subnet>> {
        if update.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        let (before, after) = db.transaction(|tx| {
            let subnet = tx
                .subnet_mut(id)
                .ok_or_else(|| Error::not_found("Subnet", id))?;
            let before = subnet.clone();
            let cidr = subnet.cidr();

            if let Some(name) = update.name {
                subnet.name = clean_text(name);
            }
            if let Some(description) = update.description {
                subnet.description = clean_text(description);
            }
            if let Some(vlan_id) = update.vlan_id {
                subnet.vlan_id = clean_text(vlan_id);
            }
            if let Some(gateway) = update.gateway {
                subnet.gateway = parse_gateway(gateway, &cidr)?;
            }
            if let Some(servers) = update.dns_servers {
                subnet.dns_servers = parse_dns_servers(servers)?;
            }
            subnet.updated_at = Utc::now();
            Ok((before, subnet.clone()))
        })?;
        log::info!("Subnet {} updated", after.cidr());

        Ok(self.audit.wrap(
            db,
            after.clone(),
            AuditAction::Update,
            EntityType::Subnet,
            id,
            &format!("Updated subnet {}", after.cidr()),
            snapshot(&before),
            snapshot(&after),
        ))
    }

    /// First subnet, in creation order, whose block contains `ip`.
    pub fn find_containing(&self, db: &Database, ip: &str) -> Result<Option<Subnet>> {
        let ip = parse_ip(ip)?;
        db.read(|t| Ok(t.find_containing(ip).cloned()))
    }

    /// Remove a subnet, its ranges and its unassigned address records in
    /// one step.
    ///
    /// Fails with [`Error::ReferentialIntegrity`] while any address in the
    /// block is assigned. Returns the number of address records removed.
    pub fn delete(&self, db: &Database, id: &str) -> Result<Recorded<usize>> {
        let (subnet, removed) = db.transaction(|tx| {
            let subnet = tx
                .subnet(id)
                .cloned()
                .ok_or_else(|| Error::not_found("Subnet", id))?;
            let cidr = subnet.cidr();

            let assigned = tx.addresses_in(cidr).filter(|a| a.is_assigned()).count();
            if assigned > 0 {
                return Err(Error::ReferentialIntegrity(format!(
                    "Cannot delete subnet {cidr} with {assigned} assigned IP address(es)"
                )));
            }

            let before = tx.addresses.len();
            tx.addresses
                .retain(|_, a| a.subnet_id.as_deref() != Some(id));
            let removed = before - tx.addresses.len();
            tx.ranges.retain(|r| r.subnet_id != id);
            tx.subnets.retain(|s| s.id != id);
            Ok((subnet, removed))
        })?;
        log::info!(
            "Subnet {} deleted with {removed} address record(s)",
            subnet.cidr()
        );

        Ok(self.audit.wrap(
            db,
            removed,
            AuditAction::Delete,
            EntityType::Subnet,
            id,
            &format!("Deleted subnet {}", subnet.cidr()),
            snapshot(&subnet),
            None,
        ))
    }
}
