//! The plugin HTTP API the container runtime talks to

mod server;
mod spec_file;
pub mod types;

pub use server::serve;
pub use spec_file::SpecFile;
