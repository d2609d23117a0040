use std::error::Error;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Clone, Debug, PartialEq)]
pub struct PrefixError {
    pub reason: String,
}

impl PrefixError {
    pub fn new(reason: String) -> Self {
        PrefixError { reason }
    }
}

impl fmt::Display for PrefixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed prefix: {}", self.reason)
    }
}

impl Error for PrefixError {}

/// Parse a dotted-quad IPv4 address into its numeric value
pub fn parse_ip(s: &str) -> Result<u32, PrefixError> {
    let addr = Ipv4Addr::from_str(s)
        .map_err(|_| PrefixError::new(format!("invalid IPv4 address '{}'", s)))?;
    Ok(u32::from(addr))
}

/// Parse a dotted-quad netmask, rejecting non-contiguous masks
pub fn parse_mask(s: &str) -> Result<u32, PrefixError> {
    let mask = parse_ip(s)?;
    if !mask_is_contiguous(mask) {
        return Err(PrefixError::new(format!("non-contiguous netmask '{}'", s)));
    }
    Ok(mask)
}

pub fn mask_len(mask: u32) -> u8 {
    mask.leading_ones() as u8
}

fn mask_is_contiguous(mask: u32) -> bool {
    mask.leading_ones() + mask.trailing_zeros() == 32
}

/// Number of leading bits in which two addresses agree
pub fn common_prefix_len(a: u32, b: u32) -> u8 {
    (a ^ b).leading_zeros() as u8
}

fn format_ip(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

/// An IPv4 network: a 32-bit network address and a contiguous netmask.
/// Host bits below the mask are always zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Prefix {
    network: u32,
    netmask: u32,
}

impl Prefix {
    pub fn new(network: u32, netmask: u32) -> Result<Self, PrefixError> {
        if !mask_is_contiguous(netmask) {
            return Err(PrefixError::new(format!(
                "non-contiguous netmask {}",
                format_ip(netmask)
            )));
        }
        Ok(Prefix {
            network: network & netmask,
            netmask,
        })
    }

    /// Build a prefix from a network address and a mask length
    pub fn from_len(network: u32, len: u8) -> Self {
        debug_assert!(len <= 32);
        let netmask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
        Prefix {
            network: network & netmask,
            netmask,
        }
    }

    pub fn network(&self) -> u32 {
        self.network
    }

    pub fn netmask(&self) -> u32 {
        self.netmask
    }

    pub fn len(&self) -> u8 {
        mask_len(self.netmask)
    }

    pub fn contains(&self, addr: u32) -> bool {
        (addr & self.netmask) == self.network
    }

    /// Two prefixes are mergeable when they share a netmask and their
    /// networks differ only in the bit just above the mask boundary.
    pub fn mergeable(&self, other: &Prefix) -> bool {
        if self.netmask != other.netmask || self.netmask == 0 {
            return false;
        }
        let parent = self.netmask << 1;
        self.network != other.network && (self.network & parent) == (other.network & parent)
    }

    /// Merged prefix is one bit shorter and takes the lower network
    pub fn merge(&self, other: &Prefix) -> Prefix {
        debug_assert!(self.mergeable(other));
        let parent = self.netmask << 1;
        Prefix {
            network: self.network & parent,
            netmask: parent,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.network), self.len())
    }
}

// Wire form of a prefix: separate dotted-quad network and netmask fields
#[derive(Serialize, Deserialize)]
struct PrefixWire {
    network: String,
    netmask: String,
}

impl Serialize for Prefix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        PrefixWire {
            network: format_ip(self.network),
            netmask: format_ip(self.netmask),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D>(deserializer: D) -> Result<Prefix, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = PrefixWire::deserialize(deserializer)?;
        let network = parse_ip(&wire.network).map_err(de::Error::custom)?;
        let netmask = parse_mask(&wire.netmask).map_err(de::Error::custom)?;
        Prefix::new(network, netmask).map_err(de::Error::custom)
    }
}
