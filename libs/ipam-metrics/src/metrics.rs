use lazy_static::lazy_static;

pub mod label_values {
    /// Pool claims
    pub const OPERATION_REQUEST_POOL: &str = "request_pool";
    /// Pool releases
    pub const OPERATION_RELEASE_POOL: &str = "release_pool";
    /// Address requests, gateway requests included
    pub const OPERATION_REQUEST_ADDRESS: &str = "request_address";
    /// Address releases
    pub const OPERATION_RELEASE_ADDRESS: &str = "release_address";

    /// The driver answered the request
    pub const STATUS_OK: &str = "ok";
    /// The driver rejected the request
    pub const STATUS_FAILED: &str = "failed";
}

lazy_static! {
    /// Counter for the number of allocation requests handled
    pub static ref REQUEST_COUNTER: prometheus::IntCounterVec = prometheus::register_int_counter_vec!(
        "ipam_requests",
        "Number of IPAM driver requests handled",
        &["operation", "status"]
    ).unwrap();

    /// Number of pools currently claimed, per address space scope
    pub static ref POOLS_TAKEN: prometheus::IntGaugeVec = prometheus::register_int_gauge_vec!(
        "ipam_pools_taken",
        "Number of pools currently claimed by a network",
        &["scope"]
    ).unwrap();

    /// Number of addresses still available for allocation, per address space scope
    pub static ref ADDRESSES_AVAILABLE: prometheus::IntGaugeVec = prometheus::register_int_gauge_vec!(
        "ipam_addresses_available",
        "Number of host addresses that can still be issued",
        &["scope"]
    ).unwrap();
}
