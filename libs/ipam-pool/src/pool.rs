use std::{net::Ipv4Addr, str::FromStr};

use cidr_range::CidrRange;
use ipnet::Ipv4Net;
use rustc_hash::FxHashSet;

use crate::{available::AvailableStack, error::Error, PoolId};

/// Parse an address from a request, either bare or with a valid `/prefix`
pub fn parse_address(value: &str) -> Result<Ipv4Addr, Error> {
    let value = value.trim();
    let addr = if value.contains('/') {
        Ipv4Net::from_str(value).map(|net| net.addr()).ok()
    } else {
        Ipv4Addr::from_str(value).ok()
    };
    addr.ok_or_else(|| Error::MalformedAddress(value.to_string()))
}

/// A single configured CIDR block, allocatable as one unit
#[derive(Debug)]
pub struct AddressPool {
    /// Identifier handed to the orchestrator
    id: PoolId,
    /// The block as configured, without surrounding whitespace
    cidr: String,
    /// Derived block boundaries
    range: CidrRange,
    /// Addresses that may still be issued
    available: AvailableStack,
    /// Addresses popped off `available` and not yet released
    issued: FxHashSet<Ipv4Addr>,
    /// Explicitly requested addresses the pool does not manage
    external: FxHashSet<Ipv4Addr>,
    /// Whether the whole pool is claimed by a network
    taken: bool,
}

impl AddressPool {
    /// Build a free pool from a CIDR block
    pub fn new(cidr: &str, id: PoolId) -> Result<Self, Error> {
        let cidr = cidr.trim();
        let range = CidrRange::parse(cidr)?;
        log::trace!(
            "Pool {} ({}): network {}, gateway {}, broadcast {}",
            id,
            cidr,
            range.network(),
            range.gateway(),
            range.broadcast()
        );

        Ok(Self {
            id,
            cidr: cidr.to_string(),
            range,
            available: AvailableStack::new(range.hosts()),
            issued: FxHashSet::default(),
            external: FxHashSet::default(),
            taken: false,
        })
    }

    #[must_use]
    pub fn id(&self) -> &PoolId {
        &self.id
    }

    /// The block as it appeared in the configuration
    #[must_use]
    pub fn cidr(&self) -> &str {
        &self.cidr
    }

    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        self.range.network()
    }

    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        self.range.broadcast()
    }

    #[must_use]
    pub fn gateway(&self) -> Ipv4Addr {
        self.range.gateway()
    }

    #[must_use]
    pub fn is_taken(&self) -> bool {
        self.taken
    }

    #[must_use]
    pub fn available(&self) -> &AvailableStack {
        &self.available
    }

    /// Number of addresses currently handed out from the stack
    #[must_use]
    pub fn issued_len(&self) -> usize {
        self.issued.len()
    }

    pub(crate) fn set_taken(&mut self, taken: bool) {
        self.taken = taken;
    }

    /// Issue the address on top of the available stack
    #[profiling::function]
    pub fn take_address(&mut self) -> Result<Ipv4Addr, Error> {
        let addr = self
            .available
            .pop()
            .ok_or_else(|| Error::AddressPoolEmpty(self.id.clone()))?;
        self.issued.insert(addr);
        log::trace!("Issued {} from pool {}", addr, self.id);
        Ok(addr)
    }

    /// Remember an address the orchestrator chose itself, so that its release is accepted
    pub fn record_external(&mut self, addr: Ipv4Addr) {
        log::trace!("Recording external address {} in pool {}", addr, self.id);
        self.external.insert(addr);
    }

    /// Return an address to the pool.
    ///
    /// Only addresses issued by [`AddressPool::take_address`] go back on the available stack.
    /// Releasing the gateway or a recorded external address is accepted without touching it.
    #[profiling::function]
    pub fn release_address(&mut self, addr: Ipv4Addr) -> Result<(), Error> {
        if addr == self.gateway() {
            log::debug!("Ignoring release of gateway {} in pool {}", addr, self.id);
            return Ok(());
        }

        if self.issued.remove(&addr) {
            self.available.push(addr);
            log::trace!("Returned {} to pool {}", addr, self.id);
            return Ok(());
        }

        if self.external.remove(&addr) {
            log::debug!("Forgot external address {} in pool {}", addr, self.id);
            return Ok(());
        }

        Err(Error::AddressNotIssued {
            address: addr,
            pool: self.id.clone(),
        })
    }
}
