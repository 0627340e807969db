use std::net::Ipv4Addr;

use crate::{PoolId, Scope};

/// All errors produced while building or allocating from address pools
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("Invalid pool configuration: {0}")]
    InvalidPoolConfiguration(#[from] cidr_range::Error),
    #[error("Pool not found: {0}")]
    PoolNotFound(String),
    #[error("No free pools left in the {0} address space")]
    PoolExhausted(Scope),
    #[error("No IP address available in pool {0}")]
    AddressPoolEmpty(PoolId),
    #[error("Malformed IPv4 address: {0:?}")]
    MalformedAddress(String),
    #[error("Address {address} is not currently issued by pool {pool}")]
    AddressNotIssued { address: Ipv4Addr, pool: PoolId },
}

/// Result type for `ipam-pool`
pub type Result<T> = std::result::Result<T, Error>;
