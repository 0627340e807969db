#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod available;
mod error;
mod id;
mod pool;
mod registry;
mod scope;

pub use available::AvailableStack;
pub use error::{Error, Result};
pub use id::{PoolId, PoolIdGenerator};
pub use pool::{parse_address, AddressPool};
pub use registry::{PoolLease, PoolRegistry, ScopeUsage, Usage};
pub use scope::Scope;
