//! Status written back to the owning custom resource

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Condition type set once a release is installed and its dependents watched
pub const CONDITION_DEPLOYED: &str = "Deployed";

/// Condition type set when the last reconciliation failed
pub const CONDITION_RELEASE_FAILED: &str = "ReleaseFailed";

/// Status of a release-backed custom resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStatus {
    /// Current conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Last successfully deployed release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_release: Option<DeployedRelease>,

    /// Generation observed by the controller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Release details surfaced on the owner
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeployedRelease {
    pub name: String,
    /// Number of distinct resource kinds watched for this controller
    pub watched_kinds: usize,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,
    /// Status (True, False, Unknown)
    pub status: String,
    /// Last transition time
    pub last_transition_time: DateTime<Utc>,
    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReleaseStatus {
    /// Status after a successful install/upgrade with all dependents watched
    pub fn deployed(
        release_name: &str,
        watched_kinds: usize,
        generation: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            conditions: vec![
                Condition {
                    type_: CONDITION_DEPLOYED.to_string(),
                    status: "True".to_string(),
                    last_transition_time: now,
                    reason: Some("InstallSuccessful".to_string()),
                    message: Some(format!("Release {} deployed", release_name)),
                },
                Condition {
                    type_: CONDITION_RELEASE_FAILED.to_string(),
                    status: "False".to_string(),
                    last_transition_time: now,
                    reason: None,
                    message: None,
                },
            ],
            deployed_release: Some(DeployedRelease {
                name: release_name.to_string(),
                watched_kinds,
            }),
            observed_generation: generation,
        }
    }

    /// Status surfacing the latest reconciliation error.
    ///
    /// The reason tells a missing CRD apart from malformed chart output.
    pub fn failed(err: &Error, generation: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            conditions: vec![Condition {
                type_: CONDITION_RELEASE_FAILED.to_string(),
                status: "True".to_string(),
                last_transition_time: now,
                reason: Some(err.reason().to_string()),
                message: Some(err.to_string()),
            }],
            deployed_release: None,
            observed_generation: generation,
        }
    }
}
