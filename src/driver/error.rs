/// Reasons the driver rejects a request
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error(transparent)]
    Pool(#[from] ipam_pool::Error),
    #[error("Unknown address space: {0:?}")]
    UnknownAddressSpace(String),
    #[error("IPv6 pools are not supported by this driver")]
    Ipv6Unsupported,
}

/// Result type for the driver
pub type Result<T> = std::result::Result<T, Error>;
