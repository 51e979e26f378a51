//! Reconciliation logic for release-backed custom resources

use async_trait::async_trait;
use chrono::Utc;
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::status::ReleaseStatus;
use crate::watches::{DependentLink, DependentPatcher, DependentResourceWatcher, Owner};
use crate::{Error, Result};

/// Finalizer that keeps the owner around until its release is uninstalled
pub const FINALIZER: &str = "helm.sdk.operatorframework.io/uninstall-release";

/// A deployed release and the manifest it rendered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    /// Namespace the release installed its namespaced objects into
    pub namespace: String,
    pub manifest: String,
}

/// Executes Helm release operations for an owner
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    async fn install_or_upgrade(&self, owner: &Owner, values: &serde_json::Value) -> Result<Release>;

    async fn uninstall(&self, owner: &Owner) -> Result<()>;
}

/// Chart values for an owner: its `spec`, or an empty map
pub fn release_values(obj: &DynamicObject) -> serde_json::Value {
    match obj.data.get("spec") {
        Some(spec) if spec.is_object() => spec.clone(),
        _ => json!({}),
    }
}

/// Install or upgrade the owner's release, watch everything it rendered and
/// link each rendered object back to the owner
pub async fn sync_release(
    owner: &Owner,
    values: &serde_json::Value,
    releases: &dyn ReleaseManager,
    watcher: &DependentResourceWatcher,
    dependents: &dyn DependentPatcher,
) -> Result<Release> {
    let release = releases.install_or_upgrade(owner, values).await?;
    watcher.exec(owner, &release.manifest).await?;

    let links = watcher
        .links(owner, &release.manifest, &release.namespace)
        .await?;
    link_dependents(owner, &links, dependents).await?;
    Ok(release)
}

/// Write the correlation metadata each link calls for
pub async fn link_dependents(
    owner: &Owner,
    links: &[DependentLink],
    dependents: &dyn DependentPatcher,
) -> Result<()> {
    for link in links {
        let patch = link.apply_patch(owner)?;
        dependents
            .patch(
                &link.descriptor.group_version_kind(),
                link.namespace.as_deref(),
                &link.descriptor.name,
                &patch,
            )
            .await?;
    }
    debug!(owner = %owner.key(), objects = links.len(), "Linked dependents to owner");
    Ok(())
}

/// Write `status` to the owner's status subresource
pub async fn update_status(
    api: &Api<DynamicObject>,
    obj: &DynamicObject,
    status: &ReleaseStatus,
) -> Result<()> {
    let name = obj.name_any();
    let patch = json!({ "status": status });
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| Error::KubeError(format!("Failed to update status: {}", e)))?;
    Ok(())
}

/// Record a reconciliation error on the owner without masking it
pub async fn report_failure(api: &Api<DynamicObject>, obj: &DynamicObject, err: &Error) {
    let status = ReleaseStatus::failed(err, obj.metadata.generation, Utc::now());
    if let Err(e) = update_status(api, obj, &status).await {
        warn!(owner = %obj.name_any(), error = %e, "Failed to record reconciliation error");
    } else {
        info!(owner = %obj.name_any(), reason = err.reason(), "Recorded reconciliation error");
    }
}
