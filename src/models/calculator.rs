//! Subnet calculator.

use super::cidr::{parse_ip, CapacityPolicy, Cidr};
use crate::error::Result;
use serde::Serialize;
use std::net::IpAddr;

/// Everything there is to know about one address block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubnetInfo {
    pub input_ip: IpAddr,
    pub prefix: u8,
    pub network: IpAddr,
    pub broadcast: IpAddr,
    pub netmask: IpAddr,
    pub wildcard: IpAddr,
    pub first_usable: Option<IpAddr>,
    pub last_usable: Option<IpAddr>,
    pub total_addresses: u128,
    pub usable_hosts: u128,
    pub is_private: bool,
    pub notation: String,
}

impl SubnetInfo {
    /// Describe the block that `ip/prefix` falls in.
    pub fn calculate(ip: &str, prefix: u8, policy: CapacityPolicy) -> Result<SubnetInfo> {
        let input_ip = parse_ip(ip)?;
        let cidr = Cidr::from_addr(input_ip, prefix)?;
        Ok(SubnetInfo {
            input_ip,
            prefix,
            network: cidr.lo(),
            broadcast: cidr.hi(),
            netmask: cidr.netmask(),
            wildcard: cidr.wildcard(),
            first_usable: cidr.first_host(policy),
            last_usable: cidr.last_host(policy),
            total_addresses: cidr.address_count(),
            usable_hosts: cidr.usable_hosts(policy),
            is_private: is_private(input_ip),
            notation: cidr.to_string(),
        })
    }
}

/// RFC 1918 for IPv4, unique local (fc00::/7) for IPv6.
pub fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}
