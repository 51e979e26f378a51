//! Reconciliation logic for release-backed custom resources

pub mod release;
