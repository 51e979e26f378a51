//! Operator configuration loaded from the environment

use std::path::Path;
use std::time::Duration;

use kube::core::GroupVersionKind;

use crate::{Error, Result};

/// Default requeue period after a successful reconciliation
const DEFAULT_RECONCILE_PERIOD_SECS: u64 = 60;

/// Runtime configuration of the operator
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Kind of the custom resource that drives releases
    pub owner: GroupVersionKind,
    /// Chart reference or local path handed to helm
    pub chart: String,
    /// Only reconcile owners in this namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Release namespace for cluster-scoped owners
    pub release_namespace: String,
    pub reconcile_period: Duration,
    pub max_concurrent_reconciles: u16,
    pub helm_binary: String,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                Error::ConfigError(format!("{} environment variable is required", key))
            })
        };

        let api_version = require("OWNER_API_VERSION")?;
        let kind = require("OWNER_KIND")?;
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version.as_str()),
        };
        if version.is_empty() || version.contains('/') {
            return Err(Error::ConfigError(format!(
                "OWNER_API_VERSION '{}' is not a valid apiVersion",
                api_version
            )));
        }

        let chart = require("HELM_CHART")?;
        if is_local_path(&chart) && !Path::new(&chart).exists() {
            return Err(Error::ConfigError(format!(
                "HELM_CHART path '{}' does not exist",
                chart
            )));
        }

        let reconcile_period = match get("RECONCILE_PERIOD_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                Error::ConfigError(format!("RECONCILE_PERIOD_SECS '{}' is not a number", raw))
            })?,
            None => DEFAULT_RECONCILE_PERIOD_SECS,
        };

        let max_concurrent_reconciles = match get("MAX_CONCURRENT_RECONCILES") {
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    Error::ConfigError(format!(
                        "MAX_CONCURRENT_RECONCILES '{}' must be a number >= 1",
                        raw
                    ))
                })?,
            None => 1,
        };

        Ok(Self {
            owner: GroupVersionKind::gvk(group, version, &kind),
            chart,
            watch_namespace: get("WATCH_NAMESPACE"),
            release_namespace: get("RELEASE_NAMESPACE").unwrap_or_else(|| "default".to_string()),
            reconcile_period: Duration::from_secs(reconcile_period),
            max_concurrent_reconciles,
            helm_binary: get("HELM_BINARY").unwrap_or_else(|| "helm".to_string()),
        })
    }
}

fn is_local_path(chart: &str) -> bool {
    chart.starts_with('/') || chart.starts_with("./") || chart.starts_with("../")
}
