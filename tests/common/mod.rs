//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use helm_release_operator::adapters::scope_resolver::StaticScopeResolver;
use helm_release_operator::watches::{
    DependentPatcher, DependentResourceWatcher, EventHandler, GroupKind, HandlerVariant, Owner,
    ResourceScope, WatchController, WatchRegistry,
};
use helm_release_operator::{Error, Result};
use kube::core::GroupVersionKind;

// ============================================================================
// Fake watch controller
// ============================================================================

/// One recorded `watch` call
#[derive(Clone, Debug)]
pub struct WatchCall {
    pub kind: GroupVersionKind,
    pub handler: EventHandler,
}

/// Records watch calls; can be told to fail for a kind or to stall
#[derive(Default)]
pub struct FakeController {
    calls: Mutex<Vec<WatchCall>>,
    failing: Mutex<Vec<GroupKind>>,
    delay: Option<Duration>,
}

impl FakeController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn fail_for(&self, kind: GroupKind) {
        self.failing.lock().unwrap().push(kind);
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn variants(&self) -> Vec<HandlerVariant> {
        self.calls().iter().map(|c| c.handler.variant()).collect()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.kind.kind.clone()).collect()
    }
}

#[async_trait]
impl WatchController for FakeController {
    async fn watch(&self, kind: &GroupVersionKind, handler: EventHandler) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let group_kind = GroupKind::from(kind);
        if self.failing.lock().unwrap().contains(&group_kind) {
            return Err(Error::WatchRegistration {
                kind: group_kind.to_string(),
                message: "watch refused".to_string(),
            });
        }
        self.calls.lock().unwrap().push(WatchCall {
            kind: kind.clone(),
            handler,
        });
        Ok(())
    }
}

// ============================================================================
// Fake dependent patcher
// ============================================================================

/// One recorded server-side apply of correlation metadata
#[derive(Clone, Debug)]
pub struct AppliedPatch {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
    pub body: serde_json::Value,
}

/// Records patches instead of sending them
#[derive(Default)]
pub struct RecordingPatcher {
    applied: Mutex<Vec<AppliedPatch>>,
}

impl RecordingPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<AppliedPatch> {
        self.applied.lock().unwrap().clone()
    }

    pub fn for_object(&self, name: &str) -> AppliedPatch {
        self.applied()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("no patch recorded for {}", name))
    }
}

#[async_trait]
impl DependentPatcher for RecordingPatcher {
    async fn patch(
        &self,
        kind: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        self.applied.lock().unwrap().push(AppliedPatch {
            kind: kind.kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            body: patch.clone(),
        });
        Ok(())
    }
}

// ============================================================================
// Kinds, owners and manifests
// ============================================================================

pub fn deployment() -> GroupVersionKind {
    GroupVersionKind::gvk("apps", "v1", "Deployment")
}

pub fn replica_set() -> GroupVersionKind {
    GroupVersionKind::gvk("apps", "v1", "ReplicaSet")
}

pub fn stateful_set() -> GroupVersionKind {
    GroupVersionKind::gvk("apps", "v1", "StatefulSet")
}

pub fn cluster_role() -> GroupVersionKind {
    GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRole")
}

pub fn cluster_role_binding() -> GroupVersionKind {
    GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding")
}

/// Resolver that knows the apps and rbac kinds used in these tests
pub fn known_apis() -> StaticScopeResolver {
    StaticScopeResolver::new()
        .with(&deployment(), ResourceScope::Namespaced)
        .with(&replica_set(), ResourceScope::Namespaced)
        .with(&stateful_set(), ResourceScope::Namespaced)
        .with(&cluster_role(), ResourceScope::ClusterScoped)
        .with(&cluster_role_binding(), ResourceScope::ClusterScoped)
}

pub fn deployment_owner() -> Owner {
    Owner::new(deployment(), Some("ownerNamespace"), "testDeployment")
}

pub fn cluster_role_owner() -> Owner {
    Owner::new(cluster_role(), None, "testClusterRole")
}

/// `owner` as read back from the API server, uid included
pub fn persisted(mut owner: Owner) -> Owner {
    owner.uid = Some(format!("uid-{}", owner.name));
    owner
}

pub fn watcher_with(
    controller: Arc<FakeController>,
    resolver: StaticScopeResolver,
) -> DependentResourceWatcher {
    let registry = Arc::new(WatchRegistry::new(controller));
    DependentResourceWatcher::new(registry, Arc::new(resolver))
}

pub fn manifest(documents: &[&str]) -> String {
    documents.join("---\n")
}

pub const RS_OWNER_NAMESPACE: &str = r#"
apiVersion: apps/v1
kind: ReplicaSet
metadata:
  name: testReplicaSet
  namespace: ownerNamespace
"#;

pub const RS_OWNER_NAMESPACE_2: &str = r#"
apiVersion: apps/v1
kind: ReplicaSet
metadata:
  name: otherReplicaSet
  namespace: ownerNamespace
"#;

pub const SS_OTHER_NAMESPACE: &str = r#"
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: otherTestStatefulSet
  namespace: otherNamespace
"#;

pub const CLUSTER_ROLE: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: testClusterRole
"#;

pub const CLUSTER_ROLE_2: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: otherClusterRole
"#;

pub const CLUSTER_ROLE_BINDING: &str = r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: testClusterRoleBinding
"#;
