use std::{net::Ipv4Addr, str::FromStr};

use ipnet::Ipv4Net;

use crate::error::Error;

/// Returns the address numerically following `addr`, wrapping at `255.255.255.255`
#[must_use]
pub fn increment(addr: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr).wrapping_add(1))
}

/// The derived boundaries of a single IPv4 CIDR block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    /// The block as it was given, host bits included
    net: Ipv4Net,
}

impl CidrRange {
    /// Wrap an already parsed block
    #[must_use]
    pub fn new(net: Ipv4Net) -> Self {
        Self { net }
    }

    /// Parse a block from its `address/prefix` notation
    pub fn parse(cidr: &str) -> Result<Self, Error> {
        Ipv4Net::from_str(cidr.trim())
            .map(Self::new)
            .map_err(|_| Error::InvalidCidr(cidr.to_string()))
    }

    /// The configured address with the block's mask applied
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        self.net.network()
    }

    /// The highest address in the block
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        self.net.broadcast()
    }

    /// The address reserved for the block's gateway
    #[must_use]
    pub fn gateway(&self) -> Ipv4Addr {
        increment(self.network())
    }

    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Every address strictly between the gateway and the broadcast address, in ascending order
    #[must_use]
    pub fn hosts(&self) -> HostRange {
        HostRange::new(
            u64::from(u32::from(self.network())) + 2,
            u64::from(u32::from(self.broadcast())),
        )
    }
}

/// A half-open range of IPv4 addresses.
///
/// Bounds are tracked as `u64` so that blocks touching either end of the address space
/// (or degenerate `/31` and `/32` blocks) never overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRange {
    /// Next address yielded from the front
    start: u64,
    /// One past the last address yielded from the back
    end: u64,
}

impl HostRange {
    /// Construct a range covering `start..end`. An inverted range is empty.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Check if an address lies within the remaining range
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr = u64::from(u32::from(addr));
        self.start <= addr && addr < self.end
    }

    /// Number of addresses left, without truncating to `usize`
    #[must_use]
    pub fn count_u64(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_addr(value: u64) -> Ipv4Addr {
    // Callers only pass values below `end`, which never exceeds `u32::MAX`
    Ipv4Addr::from(value as u32)
}

impl Iterator for HostRange {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        let addr = to_addr(self.start);
        self.start += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = usize::try_from(self.count_u64()).unwrap_or(usize::MAX);
        (len, Some(len))
    }
}

impl DoubleEndedIterator for HostRange {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        self.end -= 1;
        Some(to_addr(self.end))
    }
}

impl ExactSizeIterator for HostRange {}
