//! REST scope resolution for resource kinds

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use kube::core::GroupVersionKind;
use kube::discovery::{self, Scope};
use kube::Client;
use tracing::debug;

use crate::watches::{GroupKind, ResourceScope, ScopeResolver};
use crate::{Error, Result};

type MappingKey = (GroupKind, String);

fn mapping_key(gvk: &GroupVersionKind) -> MappingKey {
    (GroupKind::from(gvk), gvk.version.clone())
}

fn unknown_kind(gvk: &GroupVersionKind) -> Error {
    Error::UnknownKind {
        group: gvk.group.clone(),
        kind: gvk.kind.clone(),
        searched_versions: vec![gvk.version.clone()],
    }
}

/// Resolves scopes through API discovery, caching every hit.
///
/// Misses are not cached: a kind that is unknown now may be served once its
/// CRD is established.
pub struct KubeScopeResolver {
    client: Client,
    cache: RwLock<HashMap<MappingKey, ResourceScope>>,
}

impl KubeScopeResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &MappingKey) -> Option<ResourceScope> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }
}

#[async_trait]
impl ScopeResolver for KubeScopeResolver {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceScope> {
        let key = mapping_key(gvk);
        if let Some(scope) = self.cached(&key) {
            return Ok(scope);
        }

        let (_, capabilities) = discovery::pinned_kind(&self.client, gvk)
            .await
            .map_err(|e| match e {
                kube::Error::Discovery(_) => unknown_kind(gvk),
                kube::Error::Api(ref resp) if resp.code == 404 => unknown_kind(gvk),
                other => Error::KubeError(format!(
                    "Failed to discover {}/{}: {}",
                    gvk.group, gvk.kind, other
                )),
            })?;

        let scope = match capabilities.scope {
            Scope::Namespaced => ResourceScope::Namespaced,
            Scope::Cluster => ResourceScope::ClusterScoped,
        };
        debug!(kind = %key.0, version = %key.1, ?scope, "Discovered resource scope");
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, scope);
        Ok(scope)
    }
}

/// Fixed table of kind to scope mappings
#[derive(Default)]
pub struct StaticScopeResolver {
    mappings: RwLock<HashMap<MappingKey, ResourceScope>>,
}

impl StaticScopeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the mapping for one group/version/kind
    pub fn add(&self, gvk: &GroupVersionKind, scope: ResourceScope) {
        self.mappings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mapping_key(gvk), scope);
    }

    pub fn with(self, gvk: &GroupVersionKind, scope: ResourceScope) -> Self {
        self.add(gvk, scope);
        self
    }
}

#[async_trait]
impl ScopeResolver for StaticScopeResolver {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceScope> {
        self.mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&mapping_key(gvk))
            .copied()
            .ok_or_else(|| unknown_kind(gvk))
    }
}
