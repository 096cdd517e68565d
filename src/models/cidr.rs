//! IP address and CIDR block arithmetic.
//!
//! Provides [`Cidr`] for representing an address block, along with the mask,
//! network, broadcast and capacity helpers the registry and allocator build on.
//! IPv4 and IPv6 share one code path by working on the address as a `u128`.

use crate::error::{Error, Result};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum prefix length for an IPv4 block.
pub const MAX_LENGTH_V4: u8 = 32;
/// Maximum prefix length for an IPv6 block.
pub const MAX_LENGTH_V6: u8 = 128;

/// Number of bits in the address family of `addr`.
pub fn max_length(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => MAX_LENGTH_V4,
        IpAddr::V6(_) => MAX_LENGTH_V6,
    }
}

/// The address as an unsigned integer.
pub fn addr_bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Build an address of the same family as `like` from its integer value.
pub fn addr_from_bits(bits: u128, like: IpAddr) -> IpAddr {
    match like {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(bits as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}

/// Parse an IP literal, mapping failures to a validation error.
pub fn parse_ip(ip: &str) -> Result<IpAddr> {
    ip.trim()
        .parse::<IpAddr>()
        .map_err(|_| Error::Validation(format!("Invalid IP address: {}", ip.trim())))
}

fn family_mask(width: u8) -> u128 {
    if width >= MAX_LENGTH_V6 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Convert a prefix length to a mask for an address family `width` bits wide.
///
/// # Examples
/// ```
/// use ipam_engine::models::get_cidr_mask;
/// assert_eq!(get_cidr_mask(24, 32).unwrap(), 0xFFFF_FF00);
/// ```
pub fn get_cidr_mask(len: u8, width: u8) -> Result<u128> {
    if len > width {
        return Err(Error::Validation(format!(
            "Prefix /{len} is out of range for a {width} bit address"
        )));
    }
    let host_bits = (width - len) as u32;
    if host_bits >= 128 {
        Ok(0)
    } else {
        Ok((family_mask(width) >> host_bits) << host_bits)
    }
}

/// Get the canonical network address for a given IP and prefix length.
pub fn cut_addr(addr: IpAddr, len: u8) -> Result<IpAddr> {
    let mask = get_cidr_mask(len, max_length(addr))?;
    Ok(addr_from_bits(addr_bits(addr) & mask, addr))
}

/// Calculate the broadcast (highest) address for a given IP and prefix length.
pub fn broadcast_addr(addr: IpAddr, len: u8) -> Result<IpAddr> {
    let width = max_length(addr);
    let mask = get_cidr_mask(len, width)?;
    let network_bits = addr_bits(addr) & mask;
    Ok(addr_from_bits(
        network_bits | (!mask & family_mask(width)),
        addr,
    ))
}

/// Number of addresses in a block, saturating at `u128::MAX` for `::/0`.
pub fn address_count(len: u8, width: u8) -> Result<u128> {
    get_cidr_mask(len, width)?;
    let host_bits = (width - len) as u32;
    if host_bits >= 128 {
        Ok(u128::MAX)
    } else {
        Ok(1u128 << host_bits)
    }
}

/// How the network and broadcast addresses of tiny blocks are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityPolicy {
    /// Every block loses its network and broadcast address, so /31 and /32
    /// have no usable hosts.
    #[default]
    Conventional,
    /// /31 blocks are point-to-point links with two usable addresses and /32
    /// blocks hold a single host (likewise /127 and /128).
    PointToPoint,
}

impl FromStr for CapacityPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "conventional" => Ok(CapacityPolicy::Conventional),
            "point-to-point" | "point_to_point" | "p2p" => Ok(CapacityPolicy::PointToPoint),
            other => Err(Error::Validation(format!(
                "Unknown capacity policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for CapacityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CapacityPolicy::Conventional => write!(f, "conventional"),
            CapacityPolicy::PointToPoint => write!(f, "point-to-point"),
        }
    }
}

/// Calculate the number of usable host addresses in a block.
pub fn usable_hosts(len: u8, width: u8, policy: CapacityPolicy) -> Result<u128> {
    let count = address_count(len, width)?;
    match policy {
        CapacityPolicy::PointToPoint if width - len <= 1 => Ok(count),
        _ => Ok(count.saturating_sub(2)),
    }
}

/// An address block in CIDR notation.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Cidr {
    /// The network address.
    pub addr: IpAddr,
    /// The prefix length.
    pub mask: u8,
}

impl Serialize for Cidr {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Cidr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Cidr::new(&s).map_err(de::Error::custom)
    }
}

impl Cidr {
    /// Parse a block from CIDR text (e.g. "10.0.0.0/24"), canonicalizing it.
    pub fn new(addr_cidr: &str) -> Result<Cidr> {
        let addr_cidr = addr_cidr.trim();
        let (network, prefix) = addr_cidr
            .split_once('/')
            .ok_or_else(|| Error::Validation(format!("Invalid CIDR notation: {addr_cidr}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid prefix length: {prefix}")))?;
        Cidr::from_parts(network, prefix)
    }

    /// Build the canonical block for an address literal and a prefix length.
    pub fn from_parts(network: &str, prefix: u8) -> Result<Cidr> {
        Cidr::from_addr(parse_ip(network)?, prefix)
    }

    /// Build the canonical block containing `addr`.
    pub fn from_addr(addr: IpAddr, prefix: u8) -> Result<Cidr> {
        Ok(Cidr {
            addr: cut_addr(addr, prefix)?,
            mask: prefix,
        })
    }

    /// Bits in this block's address family.
    pub fn width(&self) -> u8 {
        max_length(self.addr)
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    /// The mask as an address, e.g. 255.255.255.0.
    pub fn netmask(&self) -> IpAddr {
        let mask = get_cidr_mask(self.mask, self.width()).unwrap_or(0);
        addr_from_bits(mask, self.addr)
    }

    /// The host bits as an address, e.g. 0.0.0.255.
    pub fn wildcard(&self) -> IpAddr {
        let mask = get_cidr_mask(self.mask, self.width()).unwrap_or(0);
        addr_from_bits(!mask & family_mask(self.width()), self.addr)
    }

    /// Get the lowest (network) address in the block.
    pub fn lo(&self) -> IpAddr {
        cut_addr(self.addr, self.mask).unwrap_or(self.addr)
    }

    /// Get the highest (broadcast) address in the block.
    pub fn hi(&self) -> IpAddr {
        broadcast_addr(self.addr, self.mask).unwrap_or(self.addr)
    }

    /// True when `addr` equals the canonical network address.
    pub fn is_canonical(&self) -> bool {
        self.lo() == self.addr
    }

    /// Block membership: `ip AND mask == network`. Never true across families.
    pub fn contains(&self, ip: IpAddr) -> bool {
        if ip.is_ipv4() != self.addr.is_ipv4() {
            return false;
        }
        match get_cidr_mask(self.mask, self.width()) {
            Ok(mask) => addr_bits(ip) & mask == addr_bits(self.addr) & mask,
            Err(_) => false,
        }
    }

    /// True when every address of `other` lies within this block.
    pub fn covers(&self, other: &Cidr) -> bool {
        other.mask >= self.mask && self.contains(other.addr)
    }

    /// True when the two blocks share at least one address.
    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.covers(other) || other.covers(self)
    }

    pub fn address_count(&self) -> u128 {
        address_count(self.mask, self.width()).unwrap_or(0)
    }

    pub fn usable_hosts(&self, policy: CapacityPolicy) -> u128 {
        usable_hosts(self.mask, self.width(), policy).unwrap_or(0)
    }

    /// Inclusive range of usable host addresses as integers.
    fn host_range(&self, policy: CapacityPolicy) -> Option<(u128, u128)> {
        let lo = addr_bits(self.lo());
        let hi = addr_bits(self.hi());
        let point_to_point =
            policy == CapacityPolicy::PointToPoint && self.width().saturating_sub(self.mask) <= 1;
        if point_to_point {
            Some((lo, hi))
        } else if hi - lo < 2 {
            None
        } else {
            Some((lo + 1, hi - 1))
        }
    }

    pub fn first_host(&self, policy: CapacityPolicy) -> Option<IpAddr> {
        self.host_range(policy)
            .map(|(first, _)| addr_from_bits(first, self.addr))
    }

    pub fn last_host(&self, policy: CapacityPolicy) -> Option<IpAddr> {
        self.host_range(policy)
            .map(|(_, last)| addr_from_bits(last, self.addr))
    }

    /// Iterate usable host addresses in ascending order.
    pub fn hosts(&self, policy: CapacityPolicy) -> Hosts {
        Hosts {
            range: self.host_range(policy),
            like: self.addr,
        }
    }

    /// Split this block into equally sized child blocks of `new_prefix`.
    ///
    /// At most 2^16 children are produced.
    pub fn split(&self, new_prefix: u8) -> Result<Vec<Cidr>> {
        if new_prefix <= self.mask {
            return Err(Error::Validation(
                "New prefix must be longer than the current one".to_string(),
            ));
        }
        get_cidr_mask(new_prefix, self.width())?;
        let extra_bits = new_prefix - self.mask;
        if extra_bits > 16 {
            return Err(Error::Validation(format!(
                "Splitting /{} into /{new_prefix} yields too many subnets",
                self.mask
            )));
        }
        let step = address_count(new_prefix, self.width())?;
        let base = addr_bits(self.lo());
        Ok((0..(1u128 << extra_bits))
            .map(|i| Cidr {
                addr: addr_from_bits(base + i * step, self.addr),
                mask: new_prefix,
            })
            .collect())
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

impl FromStr for Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Cidr::new(s)
    }
}

/// Ascending iterator over the usable host addresses of a [`Cidr`].
#[derive(Debug, Clone)]
pub struct Hosts {
    range: Option<(u128, u128)>,
    like: IpAddr,
}

impl Iterator for Hosts {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let (current, last) = self.range?;
        self.range = if current < last {
            Some((current + 1, last))
        } else {
            None
        };
        Some(addr_from_bits(current, self.like))
    }
}
