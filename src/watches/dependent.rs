//! Watches every kind of resource a release render produced

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{select_handler, DependentLink, GroupKind, Owner, ScopeResolver, WatchRegistry};
use crate::adapters::manifest::split_manifest;
use crate::Result;

/// Sets up dependent watches for an owner after each release render
pub struct DependentResourceWatcher {
    registry: Arc<WatchRegistry>,
    resolver: Arc<dyn ScopeResolver>,
}

impl DependentResourceWatcher {
    pub fn new(registry: Arc<WatchRegistry>, resolver: Arc<dyn ScopeResolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Make sure every kind in `manifest` is watched on behalf of `owner`.
    ///
    /// Stops at the first error. Watches registered for kinds earlier in the
    /// manifest stay in place.
    #[instrument(skip(self, owner, manifest), fields(owner = %owner.key(), kind = %owner.group_kind()))]
    pub async fn exec(&self, owner: &Owner, manifest: &str) -> Result<()> {
        let owner_scope = self.resolver.resolve(&owner.gvk).await?;
        let descriptors = split_manifest(manifest)?;

        let mut seen: HashSet<GroupKind> = HashSet::new();
        let mut registered = 0usize;
        for descriptor in &descriptors {
            let group_kind = descriptor.group_kind();
            if !seen.insert(group_kind.clone()) {
                continue;
            }

            let gvk = descriptor.group_version_kind();
            let dependent_scope = self.resolver.resolve(&gvk).await?;

            // Helm puts objects without a namespace into the release namespace
            let dependent_namespace = descriptor
                .namespace
                .as_deref()
                .or(owner.namespace.as_deref());
            let variant = select_handler(
                owner_scope,
                owner.namespace.as_deref(),
                dependent_scope,
                dependent_namespace,
            );
            debug!(kind = %group_kind, handler = %variant, "Selected dependent handler");

            if self
                .registry
                .register_once(&gvk, || variant.handler_for(owner, owner_scope))
                .await?
            {
                registered += 1;
            }
        }

        info!(
            objects = descriptors.len(),
            kinds = seen.len(),
            registered,
            "Dependent resources watched"
        );
        Ok(())
    }

    /// Plan the correlation metadata for every object in `manifest`.
    ///
    /// Unlike [`exec`](Self::exec) this looks at each object, since two
    /// objects of one kind can need different handlers. Namespaced objects
    /// without a namespace are placed in `release_namespace`.
    pub async fn links(
        &self,
        owner: &Owner,
        manifest: &str,
        release_namespace: &str,
    ) -> Result<Vec<DependentLink>> {
        let owner_scope = self.resolver.resolve(&owner.gvk).await?;
        let descriptors = split_manifest(manifest)?;

        let mut links = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let dependent_scope = self
                .resolver
                .resolve(&descriptor.group_version_kind())
                .await?;
            let namespace = if dependent_scope.is_namespaced() {
                Some(
                    descriptor
                        .namespace
                        .clone()
                        .unwrap_or_else(|| release_namespace.to_string()),
                )
            } else {
                None
            };
            let variant = select_handler(
                owner_scope,
                owner.namespace.as_deref(),
                dependent_scope,
                namespace.as_deref(),
            );
            links.push(DependentLink {
                descriptor,
                namespace,
                variant,
            });
        }
        Ok(links)
    }
}
