//! The allocation engine behind the plugin API.
//!
//! Pools are claimed whole by a network (`request_pool` / `release_pool`), after which individual
//! addresses inside them are handed out (`request_address` / `release_address`).

use std::{collections::HashMap, net::Ipv4Addr};

use ipam_pool::{parse_address, PoolId, PoolRegistry, Scope, ScopeUsage};
use ipnet::Ipv4Net;

mod error;
pub use error::{Error, Result};

/// Symbolic name of the global address space
pub const GLOBAL_ADDRESS_SPACE: &str = "alpha_global";
/// Symbolic name of the local address space
pub const LOCAL_ADDRESS_SPACE: &str = "beta_local";

/// Option key naming the kind of address being requested
pub const REQUEST_ADDRESS_TYPE: &str = "RequestAddressType";
/// `REQUEST_ADDRESS_TYPE` value marking a request for the pool's gateway
pub const GATEWAY_REQUEST: &str = "com.docker.network.gateway";

/// Prefix length attached to every address issued from a pool
const ADDRESS_PREFIX_LEN: u8 = 24;
/// Prefix length attached to gateway addresses
const GATEWAY_PREFIX_LEN: u8 = 32;

/// What the driver can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub requires_mac_address: bool,
}

/// The default address space names for each scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpaces {
    pub global: &'static str,
    pub local: &'static str,
}

/// A claimed pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolGrant {
    /// The block as configured
    pub pool: String,
    pub pool_id: PoolId,
    /// Opaque data passed through to the orchestrator
    pub data: HashMap<String, String>,
}

/// An assigned address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressGrant {
    /// Address in `a.b.c.d/len` form, or exactly what the caller asked for
    pub address: String,
    pub data: HashMap<String, String>,
}

/// Map an address space name onto a scope. An empty name means the local scope.
pub fn scope_for(address_space: &str) -> Result<Scope> {
    match address_space {
        GLOBAL_ADDRESS_SPACE => Ok(Scope::Global),
        LOCAL_ADDRESS_SPACE | "" => Ok(Scope::Local),
        other => Err(Error::UnknownAddressSpace(other.to_string())),
    }
}

/// The IPAM driver
#[derive(Debug)]
pub struct IpamDriver {
    registry: PoolRegistry,
    /// Returned alongside every claimed pool
    pool_data: HashMap<String, String>,
}

impl IpamDriver {
    /// Build the driver and every configured pool
    pub fn new<S: AsRef<str>>(global_pools: &[S], local_pools: &[S]) -> Result<Self> {
        let driver = Self {
            registry: PoolRegistry::new(global_pools, local_pools)?,
            pool_data: HashMap::from([("DNS".to_string(), "8.8.8.8".to_string())]),
        };
        driver.refresh_gauges();
        Ok(driver)
    }

    /// Replace the data returned with every claimed pool
    #[must_use]
    pub fn with_pool_data(mut self, pool_data: HashMap<String, String>) -> Self {
        self.pool_data = pool_data;
        self
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn capabilities(&self) -> Capabilities {
        log::debug!("Get capabilities request received");
        Capabilities {
            requires_mac_address: false,
        }
    }

    pub fn default_address_spaces(&self) -> AddressSpaces {
        log::debug!("Get default address spaces request received");
        AddressSpaces {
            global: GLOBAL_ADDRESS_SPACE,
            local: LOCAL_ADDRESS_SPACE,
        }
    }

    /// Claim a pool.
    ///
    /// With both an address space and a pool value, that exact pool is claimed. Otherwise the
    /// first free pool of the address space is.
    #[profiling::function]
    pub fn request_pool(
        &self,
        address_space: &str,
        pool: Option<&str>,
        v6: bool,
    ) -> Result<PoolGrant> {
        log::debug!(
            "Pool request received: address space {:?}, pool {:?}, v6 {}",
            address_space,
            pool,
            v6
        );
        if v6 {
            return Err(Error::Ipv6Unsupported);
        }

        let pool = pool.filter(|value| !value.is_empty());
        let lease = match (address_space, pool) {
            ("", Some(value)) => {
                log::warn!(
                    "Ignoring requested pool {} because no address space was given",
                    value
                );
                self.registry.find_free_pool(scope_for(address_space)?)?
            }
            (space, Some(value)) => self.registry.find_pool_by_value(scope_for(space)?, value)?,
            (space, None) => self.registry.find_free_pool(scope_for(space)?)?,
        };
        self.refresh_gauges();

        log::info!("Assigned {} pool {} ({})", lease.scope, lease.id, lease.cidr);
        if let Ok(available) = self
            .registry
            .with_pool(lease.id.as_str(), |pool| pool.available().len())
        {
            log::debug!("Pool {} has {} addresses available", lease.id, available);
        }
        Ok(PoolGrant {
            pool: lease.cidr,
            pool_id: lease.id,
            data: self.pool_data.clone(),
        })
    }

    /// Free a pool. Unknown identifiers are ignored so that retried releases succeed.
    #[profiling::function]
    pub fn release_pool(&self, pool_id: &str) {
        log::debug!("Release pool request received: {}", pool_id);
        if self.registry.release_pool(pool_id) {
            log::info!("Released pool {}", pool_id);
            self.refresh_gauges();
        } else {
            log::debug!("Release of unknown pool {} ignored", pool_id);
        }
    }

    /// Assign an address from a claimed pool.
    ///
    /// Gateway requests return the pool's gateway. An explicit `address` is returned unchanged
    /// and is not taken from the pool. Otherwise the next available address is issued.
    #[profiling::function]
    pub fn request_address(
        &self,
        pool_id: &str,
        address: Option<&str>,
        options: &HashMap<String, String>,
    ) -> Result<AddressGrant> {
        log::debug!(
            "Address request received: pool {}, address {:?}, options {:?}",
            pool_id,
            address,
            options
        );

        if options.get(REQUEST_ADDRESS_TYPE).map(String::as_str) == Some(GATEWAY_REQUEST) {
            let gateway = self.registry.find_pool_by_id(pool_id)?.gateway;
            return Ok(AddressGrant {
                address: with_prefix(gateway, GATEWAY_PREFIX_LEN),
                data: HashMap::new(),
            });
        }

        if let Some(address) = address.filter(|value| !value.is_empty()) {
            // Keep track of it so a later release is recognized
            match parse_address(address) {
                Ok(addr) if self.registry.record_external_address(pool_id, addr) => {}
                _ => log::debug!(
                    "Explicit address {} is not tracked by pool {}",
                    address,
                    pool_id
                ),
            }
            return Ok(AddressGrant {
                address: address.to_string(),
                data: HashMap::new(),
            });
        }

        let addr = self.registry.take_address(pool_id)?;
        self.refresh_gauges();
        log::debug!("Issued {} from pool {}", addr, pool_id);
        Ok(AddressGrant {
            address: with_prefix(addr, ADDRESS_PREFIX_LEN),
            data: HashMap::new(),
        })
    }

    /// Return an address to its pool
    #[profiling::function]
    pub fn release_address(&self, pool_id: &str, address: &str) -> Result<()> {
        log::debug!(
            "Release address request received: pool {}, address {}",
            pool_id,
            address
        );
        let addr = parse_address(address)?;
        self.registry.release_address(pool_id, addr)?;
        self.refresh_gauges();
        log::debug!("Released {} back to pool {}", addr, pool_id);
        Ok(())
    }

    /// Publish the current pool occupancy
    fn refresh_gauges(&self) {
        let usage = self.registry.usage();
        for scope in Scope::ALL {
            let ScopeUsage { taken, available, .. } = usage.scope(scope);
            let taken = i64::try_from(taken).unwrap_or(i64::MAX);
            let available = i64::try_from(available).unwrap_or(i64::MAX);
            ipam_metrics::metrics::POOLS_TAKEN
                .with_label_values(&[scope.as_str()])
                .set(taken);
            ipam_metrics::metrics::ADDRESSES_AVAILABLE
                .with_label_values(&[scope.as_str()])
                .set(available);
        }
    }
}

fn with_prefix(addr: Ipv4Addr, prefix_len: u8) -> String {
    match Ipv4Net::new(addr, prefix_len) {
        Ok(net) => net.to_string(),
        Err(_) => format!("{addr}/{prefix_len}"),
    }
}
