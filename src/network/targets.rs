//! CIDR expansion into probeable host addresses
//!
//! Host rules follow the usual convention:
//! - prefixes up to /30 drop the network and broadcast addresses
//! - /31 is a point-to-point link (RFC 3021), both addresses are hosts
//! - /32 is the single address itself

use crate::ScanError;
use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A parsed IPv4 network that can hand out its usable hosts any number of times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressEnumerator {
    network: Ipv4Network,
}

impl AddressEnumerator {
    /// Parse a CIDR descriptor. A bare address is treated as /32 and
    /// host bits are masked off (`10.1.2.3/24` becomes `10.1.2.0/24`).
    pub fn parse(cidr: &str) -> crate::Result<Self> {
        let cidr = cidr.trim();
        if cidr.is_empty() {
            return Err(ScanError::InvalidRange("Range cannot be empty".to_string()));
        }

        let parsed = Ipv4Network::from_str(cidr)
            .map_err(|e| ScanError::InvalidRange(format!("{}: {}", cidr, e)))?;
        let network = Ipv4Network::new(parsed.network(), parsed.prefix())
            .map_err(|e| ScanError::InvalidRange(format!("{}: {}", cidr, e)))?;

        if network.ip() != parsed.ip() {
            log::warn!("{} has host bits set, scanning {}", cidr, network);
        }

        Ok(Self { network })
    }

    pub fn network(&self) -> Ipv4Network {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }

    /// First and last usable host as integers (inclusive)
    fn host_bounds(&self) -> (u32, u32) {
        let start = u32::from(self.network.network());
        let host_bits = 32 - u32::from(self.prefix());
        let end = if host_bits == 32 {
            u32::MAX
        } else {
            start | ((1u32 << host_bits) - 1)
        };

        match self.prefix() {
            31 | 32 => (start, end),
            _ => (start + 1, end - 1),
        }
    }

    /// Number of usable hosts, computed without iterating
    pub fn len(&self) -> u64 {
        let (first, last) = self.host_bounds();
        u64::from(last) - u64::from(first) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy iterator over the usable hosts, starting from the first every time
    pub fn iter(&self) -> HostIter {
        let (first, last) = self.host_bounds();
        HostIter {
            next: u64::from(first),
            end: u64::from(last) + 1,
        }
    }
}

impl FromStr for AddressEnumerator {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressEnumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network.network(), self.prefix())
    }
}

impl<'a> IntoIterator for &'a AddressEnumerator {
    type Item = Ipv4Addr;
    type IntoIter = HostIter;

    fn into_iter(self) -> HostIter {
        self.iter()
    }
}

/// Iterator returned by [`AddressEnumerator::iter`]
#[derive(Debug, Clone)]
pub struct HostIter {
    next: u64,
    end: u64,
}

impl Iterator for HostIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        if self.next >= self.end {
            return None;
        }
        let addr = Ipv4Addr::from(self.next as u32);
        self.next += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for HostIter {}
