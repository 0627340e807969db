//! Process-level glue shared by the `ipamd` binary

pub mod logging;
pub mod profiler;
