//! IPv4 CIDR blocks

use enclave_core::{ConstructionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network in `a.b.c.d/n` form with no host bits set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: u32,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Build from address and prefix length
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("prefix /{prefix} is longer than 32"),
            ));
        }
        let network = u32::from(addr);
        if network & !mask(prefix) != 0 {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("{addr}/{prefix} has host bits set"),
            ));
        }
        Ok(Self { network, prefix })
    }

    /// `0.0.0.0/0`
    #[must_use]
    pub const fn any() -> Self {
        Self {
            network: 0,
            prefix: 0,
        }
    }

    /// Parse `a.b.c.d/n`
    pub fn parse(value: &str) -> Result<Self> {
        let Some((addr, prefix)) = value.trim().split_once('/') else {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("'{value}' is not of the form a.b.c.d/n"),
            ));
        };
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| ConstructionError::invalid("cidr", format!("'{value}' has a bad address")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ConstructionError::invalid("cidr", format!("'{value}' has a bad prefix")))?;
        Self::new(addr, prefix)
    }

    /// Network address
    #[inline]
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    /// Prefix length
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    /// Last address as an integer
    fn last(&self) -> u32 {
        self.network | !mask(self.prefix)
    }

    /// Every IPv4 address
    #[inline]
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.prefix == 0
    }

    /// Address lies within the block
    #[must_use]
    pub fn contains_addr(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.prefix) == self.network
    }

    /// `other` lies entirely within this block
    #[must_use]
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix && other.network & mask(self.prefix) == self.network
    }

    /// Blocks share at least one address
    #[must_use]
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The `index`-th sub-block of length `prefix`
    pub fn subnet(&self, prefix: u8, index: u32) -> Result<Self> {
        if prefix < self.prefix || prefix > 32 {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("/{prefix} cannot be carved from {self}"),
            ));
        }
        let count = 1u64 << (prefix - self.prefix);
        if u64::from(index) >= count {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("{self} holds {count} /{prefix} blocks, not {}", u64::from(index) + 1),
            ));
        }
        let step = 1u64 << (32 - u32::from(prefix));
        let offset = u64::from(index) * step;
        // offset < size of self, so the sum stays within u32
        let network = u32::try_from(u64::from(self.network) + offset)
            .map_err(|_| ConstructionError::invalid("cidr", format!("{self} overflows")))?;
        Ok(Self { network, prefix })
    }
}

/// Carves consecutive, aligned sub-blocks out of a parent block
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    parent: Ipv4Cidr,
    cursor: u64,
}

impl CidrAllocator {
    /// Start at the parent's network address
    #[must_use]
    pub fn new(parent: Ipv4Cidr) -> Self {
        Self {
            parent,
            cursor: u64::from(parent.network),
        }
    }

    /// Next free block of length `prefix`
    pub fn next_block(&mut self, prefix: u8) -> Result<Ipv4Cidr> {
        if prefix < self.parent.prefix || prefix > 32 {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("/{prefix} cannot be carved from {}", self.parent),
            ));
        }
        let step = 1u64 << (32 - u32::from(prefix));
        let start = self.cursor.div_ceil(step) * step;
        let end = start + step - 1;
        if end > u64::from(self.parent.last()) {
            return Err(ConstructionError::invalid(
                "cidr",
                format!("no room left in {} for another /{prefix}", self.parent),
            ));
        }
        self.cursor = end + 1;
        let network = u32::try_from(start)
            .map_err(|_| ConstructionError::invalid("cidr", "address space exhausted"))?;
        Ok(Ipv4Cidr { network, prefix })
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = ConstructionError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}
