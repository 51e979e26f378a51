//! Prometheus metrics definitions

use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Gauge, HistogramVec,
};

lazy_static::lazy_static! {
    /// Total number of reconciliations
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "helm_release_operator_reconciliations_total",
        "Total number of reconciliations",
        &["kind"]
    ).unwrap();

    /// Total number of reconciliation errors
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "helm_release_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
        &["kind"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "helm_release_operator_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Dependent watches established, by correlation handler
    pub static ref WATCH_REGISTRATIONS: CounterVec = register_counter_vec!(
        "helm_release_operator_watch_registrations_total",
        "Total number of dependent resource watches established",
        &["handler"]
    ).unwrap();

    /// Distinct dependent kinds currently watched
    pub static ref WATCHED_KINDS: Gauge = register_gauge!(
        "helm_release_operator_watched_kinds",
        "Number of distinct dependent resource kinds watched"
    ).unwrap();
}
