//! Dependent resource watching
//!
//! After every release render the operator learns which kinds of objects the
//! chart produced and makes sure each kind is watched exactly once, with an
//! event handler that maps changes back to the owning custom resource.

pub mod dependent;
pub mod handler;
pub mod link;
pub mod registry;

use std::fmt;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use dependent::DependentResourceWatcher;
pub use handler::{
    select_handler, EnqueueForAnnotation, EnqueueForOwner, EventHandler, HandlerVariant,
    OwnerRequest,
};
pub use link::DependentLink;
pub use registry::WatchRegistry;

/// A resource kind without its version
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl From<&GroupVersionKind> for GroupKind {
    fn from(gvk: &GroupVersionKind) -> Self {
        Self::new(gvk.group.clone(), gvk.kind.clone())
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Whether a kind lives inside a namespace or at cluster level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    Namespaced,
    ClusterScoped,
}

impl ResourceScope {
    pub fn is_namespaced(self) -> bool {
        self == ResourceScope::Namespaced
    }
}

/// The custom resource instance whose reconciliation triggered a release
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owner {
    pub gvk: GroupVersionKind,
    pub namespace: Option<String>,
    pub name: String,
    pub uid: Option<String>,
}

impl Owner {
    pub fn new(gvk: GroupVersionKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            gvk,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            uid: None,
        }
    }

    /// Build an owner from a dynamically typed object of a known kind
    pub fn from_object(obj: &DynamicObject, gvk: &GroupVersionKind) -> Result<Self> {
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::InvalidOwner(format!("{} has no metadata.name", gvk.kind)))?;
        Ok(Self {
            gvk: gvk.clone(),
            namespace: obj.namespace(),
            name,
            uid: obj.uid(),
        })
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::from(&self.gvk)
    }

    /// `namespace/name`, or just `name` for cluster-scoped owners
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Resolves the REST scope of a kind
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// Fails with [`Error::UnknownKind`] when no mapping exists for the kind
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceScope>;
}

/// The add-watch capability of the enclosing controller
#[async_trait]
pub trait WatchController: Send + Sync {
    async fn watch(&self, kind: &GroupVersionKind, handler: EventHandler) -> Result<()>;
}

/// Applies partial metadata to a live dependent object
#[async_trait]
pub trait DependentPatcher: Send + Sync {
    /// `patch` is a server-side apply body naming the object
    async fn patch(
        &self,
        kind: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()>;
}
