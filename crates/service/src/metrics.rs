use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

// Prometheus metrics (default registry)
pub static INCREMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "counter_store_increments_total",
        "Total increments applied to existing counters"
    )
    .expect("register increments_total")
});

pub static COUNTERS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "counter_store_counters_created_total",
        "Total counters created by a first increment"
    )
    .expect("register counters_created_total")
});

pub static COUNTERS_DELETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "counter_store_counters_deleted_total",
        "Total counters deleted"
    )
    .expect("register counters_deleted_total")
});

pub static CREATION_CONFLICTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "counter_store_creation_conflicts_total",
        "Total insert attempts that lost a creation race"
    )
    .expect("register creation_conflicts_total")
});

pub static STORE_BUSY_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "counter_store_store_busy_retries_total",
        "Total store calls retried after lock contention"
    )
    .expect("register store_busy_retries_total")
});

pub static STORE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "counter_store_store_errors_total",
        "Total store failures surfaced to callers"
    )
    .expect("register store_errors_total")
});
