//! Prometheus metrics for the Helm Release Operator
//!
//! Metrics are registered in the default registry; exposing them over HTTP
//! is left to the process embedding the operator.

pub mod prometheus;

pub use prometheus::*;
