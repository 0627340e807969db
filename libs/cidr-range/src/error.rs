//! Error types for this library

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("Invalid IPv4 CIDR block: {0:?}. Expected an address and prefix length such as 10.0.0.0/24")]
    InvalidCidr(String),
}
