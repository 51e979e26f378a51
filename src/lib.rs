//! Helm Release Operator
//!
//! This operator turns custom resources into Helm releases and keeps
//! reconciliation reactive to changes in every resource those releases
//! create, without knowing the chart's contents up front.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod error;
pub mod metrics;
pub mod reconcilers;
pub mod status;
pub mod watches;

pub use error::{Error, Result};
