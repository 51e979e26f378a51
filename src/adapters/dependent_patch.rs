//! Writes correlation metadata onto live dependents with server-side apply

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiResource};
use kube::{Api, Client};
use tracing::debug;

use crate::watches::DependentPatcher;
use crate::{Error, Result};

/// Field manager owning the injected owner references and annotations
pub const FIELD_MANAGER: &str = "helm-release-operator";

/// Applies patches through the API server, caching discovered resources
pub struct KubeDependentPatcher {
    client: Client,
    resources: RwLock<HashMap<GroupVersionKind, ApiResource>>,
}

impl KubeDependentPatcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, kind: &GroupVersionKind) -> Option<ApiResource> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .cloned()
    }

    async fn api_resource(&self, kind: &GroupVersionKind) -> Result<ApiResource> {
        if let Some(resource) = self.cached(kind) {
            return Ok(resource);
        }

        let (resource, _) = discovery::pinned_kind(&self.client, kind)
            .await
            .map_err(|e| {
                Error::KubeError(format!("Failed to discover {}/{}: {}", kind.group, kind.kind, e))
            })?;
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind.clone(), resource.clone());
        Ok(resource)
    }
}

#[async_trait]
impl DependentPatcher for KubeDependentPatcher {
    async fn patch(
        &self,
        kind: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let resource = self.api_resource(kind).await?;
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };

        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(patch),
        )
        .await
        .map_err(|e| {
            Error::KubeError(format!("Failed to link {} {}: {}", kind.kind, name, e))
        })?;

        debug!(kind = %kind.kind, name, namespace = namespace.unwrap_or_default(), "Linked dependent to owner");
        Ok(())
    }
}
