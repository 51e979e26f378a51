//! Release management through the `helm` binary

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::OperatorConfig;
use crate::reconcilers::release::{Release, ReleaseManager};
use crate::watches::Owner;
use crate::{Error, Result};

/// Subset of `helm ... --output json`
#[derive(Deserialize)]
struct HelmRelease {
    name: String,
    namespace: Option<String>,
    #[serde(default)]
    manifest: String,
}

/// Installs, upgrades and uninstalls one release per owner
pub struct HelmCli {
    binary: String,
    chart: String,
    default_namespace: String,
}

impl HelmCli {
    pub fn new(config: &OperatorConfig) -> Self {
        Self {
            binary: config.helm_binary.clone(),
            chart: config.chart.clone(),
            default_namespace: config.release_namespace.clone(),
        }
    }

    /// Releases live next to their owner; cluster-scoped owners use the default
    pub fn release_namespace(&self, owner: &Owner) -> String {
        owner
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.default_namespace.clone())
    }

    fn upgrade_args(&self, owner: &Owner) -> Vec<String> {
        vec![
            "upgrade".to_string(),
            "--install".to_string(),
            owner.name.clone(),
            self.chart.clone(),
            "--namespace".to_string(),
            self.release_namespace(owner),
            "--values".to_string(),
            "-".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ]
    }

    fn uninstall_args(&self, owner: &Owner) -> Vec<String> {
        vec![
            "uninstall".to_string(),
            owner.name.clone(),
            "--namespace".to_string(),
            self.release_namespace(owner),
        ]
    }

    async fn run(&self, args: &[String], stdin: Option<Vec<u8>>) -> Result<String> {
        debug!(binary = %self.binary, ?args, "Running helm");
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ReleaseError(format!("failed to run {}: {}", self.binary, e)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(&input)
                .await
                .map_err(|e| Error::ReleaseError(format!("failed to pass values to helm: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::ReleaseError(format!("failed to wait for helm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ReleaseError(format!(
                "helm {} failed: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ReleaseManager for HelmCli {
    async fn install_or_upgrade(&self, owner: &Owner, values: &serde_json::Value) -> Result<Release> {
        let input = serde_json::to_vec(values)
            .map_err(|e| Error::ReleaseError(format!("failed to encode values: {}", e)))?;
        let stdout = self.run(&self.upgrade_args(owner), Some(input)).await?;
        let release = parse_release(&stdout, &self.release_namespace(owner))?;
        info!(release = %release.name, namespace = %release.namespace, "Release installed or upgraded");
        Ok(release)
    }

    async fn uninstall(&self, owner: &Owner) -> Result<()> {
        match self.run(&self.uninstall_args(owner), None).await {
            Ok(_) => {
                info!(release = %owner.name, "Release uninstalled");
                Ok(())
            }
            Err(Error::ReleaseError(msg)) if msg.contains("not found") => {
                debug!(release = %owner.name, "Release already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_release(stdout: &str, requested_namespace: &str) -> Result<Release> {
    let release: HelmRelease = serde_json::from_str(stdout)
        .map_err(|e| Error::ReleaseError(format!("unexpected helm output: {}", e)))?;
    Ok(Release {
        name: release.name,
        namespace: release
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| requested_namespace.to_string()),
        manifest: release.manifest,
    })
}
