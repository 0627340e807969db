use std::sync::Arc;

use args::ipamd::Args;
use clap::Parser;
use common::{logging::enable_logger, profiler::start_puffin_server};
use driver::IpamDriver;
use ipam_pool::Scope;
use plugin::SpecFile;

mod args;
mod common;
mod driver;
mod plugin;

#[tokio::main]
pub async fn main() {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    if let Err(error) = enable_logger(args.verbose) {
        eprintln!("Failed to initialize logging: {error}");
        std::process::exit(1);
    }

    // Start profiling if it was requested and compiled in
    #[allow(clippy::let_unit_value)]
    let _puffin_server = start_puffin_server(&args.profiler_args);

    // Load and validate the pool configuration
    let config = args.data().unwrap_or_else(|error| {
        log::error!("{}", error);
        std::process::exit(1);
    });

    // Build every pool up front. A single bad block is fatal.
    let driver = IpamDriver::new(config.global_pools.as_slice(), config.local_pools.as_slice())
        .unwrap_or_else(|error| {
            log::error!("{}", error);
            std::process::exit(1);
        })
        .with_pool_data(config.pool_data);
    let usage = driver.registry().usage();
    for scope in Scope::ALL {
        let usage = usage.scope(scope);
        log::info!(
            "{} pools: {}, {} addresses: {}",
            scope,
            usage.pools,
            scope,
            usage.available
        );
    }

    // Optionally expose metrics
    if let Some(bind_addr) = args.prom_bind_addr {
        tokio::spawn(ipam_metrics::http::serve_metrics(bind_addr));
    }

    // Announce the plugin to the container runtime
    let spec_file = SpecFile::write(&args.spec_dir, &args.name, args.advertise_addr())
        .unwrap_or_else(|error| {
            log::error!("Failed to write plugin spec file: {}", error);
            std::process::exit(1);
        });
    log::info!(
        "IPAM driver {} started, announced via {}",
        args.name,
        spec_file.path().display()
    );

    // Serve until interrupted
    if let Err(error) = plugin::serve(args.bind, Arc::new(driver)).await {
        log::error!("Plugin API error: {}", error);
        drop(spec_file);
        std::process::exit(1);
    }
}
