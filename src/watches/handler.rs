//! Handler selection and the event handlers it produces
//!
//! Native owner references only work for some owner/dependent scope pairings.
//! Where they can't be used, the dependent carries annotations naming its
//! owner and changes are mapped back through those instead.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::ResourceExt;

use super::{GroupKind, Owner, ResourceScope};

/// Annotation holding `namespace/name` (or `name`) of the owning resource
pub const PRIMARY_RESOURCE_ANNOTATION: &str = "operator-sdk/primary-resource";

/// Annotation holding the owning resource's `Kind.group`
pub const PRIMARY_RESOURCE_TYPE_ANNOTATION: &str = "operator-sdk/primary-resource-type";

/// How changes to a dependent kind are correlated with its owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerVariant {
    OwnerReference,
    Annotation,
}

impl HandlerVariant {
    /// Build the concrete handler for this variant and owner
    pub fn handler_for(self, owner: &Owner, owner_scope: ResourceScope) -> EventHandler {
        match self {
            HandlerVariant::OwnerReference => EventHandler::OwnerReference(EnqueueForOwner {
                owner: owner.group_kind(),
                owner_scope,
            }),
            HandlerVariant::Annotation => EventHandler::Annotation(EnqueueForAnnotation {
                owner: owner.group_kind(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerVariant::OwnerReference => "owner-reference",
            HandlerVariant::Annotation => "annotation",
        }
    }
}

impl fmt::Display for HandlerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the correlation strategy for a dependent kind.
///
/// Owner references are used when the dependent is cluster-scoped, when the
/// owner is cluster-scoped, or when both share a namespace. A namespaced
/// dependent in a different namespace than its namespaced owner falls back to
/// annotations.
pub fn select_handler(
    owner_scope: ResourceScope,
    owner_namespace: Option<&str>,
    dependent_scope: ResourceScope,
    dependent_namespace: Option<&str>,
) -> HandlerVariant {
    if dependent_scope == ResourceScope::ClusterScoped {
        return HandlerVariant::OwnerReference;
    }
    if owner_scope == ResourceScope::ClusterScoped {
        return HandlerVariant::OwnerReference;
    }
    if owner_namespace == dependent_namespace {
        return HandlerVariant::OwnerReference;
    }
    HandlerVariant::Annotation
}

/// A request to reconcile one owner
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerRequest {
    pub namespace: Option<String>,
    pub name: String,
}

/// Maps dependent change events to owner reconcile requests
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventHandler {
    OwnerReference(EnqueueForOwner),
    Annotation(EnqueueForAnnotation),
}

impl EventHandler {
    pub fn variant(&self) -> HandlerVariant {
        match self {
            EventHandler::OwnerReference(_) => HandlerVariant::OwnerReference,
            EventHandler::Annotation(_) => HandlerVariant::Annotation,
        }
    }

    /// Owners that should be reconciled because `obj` changed
    pub fn requests_for(&self, obj: &DynamicObject) -> Vec<OwnerRequest> {
        match self {
            EventHandler::OwnerReference(h) => h.requests_for(obj),
            EventHandler::Annotation(h) => h.requests_for(obj).into_iter().collect(),
        }
    }
}

/// Enqueues the controlling owner named in a dependent's owner references
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnqueueForOwner {
    pub owner: GroupKind,
    pub owner_scope: ResourceScope,
}

impl EnqueueForOwner {
    /// Controller reference to `owner`; `None` until the owner has a uid
    pub fn owner_reference_for(owner: &Owner) -> Option<OwnerReference> {
        Some(OwnerReference {
            api_version: owner.gvk.api_version(),
            kind: owner.gvk.kind.clone(),
            name: owner.name.clone(),
            uid: owner.uid.clone().filter(|uid| !uid.is_empty())?,
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }

    /// Owners named by `obj`'s controller references.
    ///
    /// A namespaced owner paired with a cluster-scoped dependent never
    /// correlates: the request carries no namespace to find the owner in.
    pub fn requests_for(&self, obj: &DynamicObject) -> Vec<OwnerRequest> {
        let namespace = match self.owner_scope {
            ResourceScope::Namespaced => obj.namespace(),
            ResourceScope::ClusterScoped => None,
        };

        let mut requests: Vec<OwnerRequest> = obj
            .owner_references()
            .iter()
            .filter(|r| r.controller == Some(true))
            .filter(|r| r.kind == self.owner.kind && api_group(&r.api_version) == self.owner.group)
            .map(|r| OwnerRequest {
                namespace: namespace.clone(),
                name: r.name.clone(),
            })
            .collect();
        requests.sort();
        requests.dedup();
        requests
    }
}

/// Enqueues the owner recorded in a dependent's primary-resource annotations
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnqueueForAnnotation {
    pub owner: GroupKind,
}

impl EnqueueForAnnotation {
    /// The annotations a dependent needs so changes to it reach `owner`
    pub fn annotations_for(owner: &Owner) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        annotations.insert(PRIMARY_RESOURCE_ANNOTATION.to_string(), owner.key());
        annotations.insert(
            PRIMARY_RESOURCE_TYPE_ANNOTATION.to_string(),
            owner.group_kind().to_string(),
        );
        annotations
    }

    pub fn requests_for(&self, obj: &DynamicObject) -> Option<OwnerRequest> {
        let annotations = obj.annotations();
        let type_ = annotations.get(PRIMARY_RESOURCE_TYPE_ANNOTATION)?;
        if *type_ != self.owner.to_string() {
            return None;
        }

        let primary = annotations.get(PRIMARY_RESOURCE_ANNOTATION)?.trim();
        let (namespace, name) = match primary.split_once('/') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, primary),
        };
        if name.is_empty() {
            return None;
        }
        Some(OwnerRequest {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            name: name.to_string(),
        })
    }
}

/// Group part of an `apiVersion`; empty for the core group
pub(crate) fn api_group(api_version: &str) -> &str {
    match api_version.split_once('/') {
        Some((group, _)) => group,
        None => "",
    }
}
