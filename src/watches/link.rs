//! Correlation metadata written onto rendered dependents
//!
//! Helm renders plain objects. Before a dependent watch can map a change back
//! to its owner, the object must carry either a controller reference or the
//! primary-resource annotations, whichever the selected handler reads.

use serde_json::json;

use super::{EnqueueForAnnotation, EnqueueForOwner, HandlerVariant, Owner};
use crate::adapters::manifest::ResourceDescriptor;
use crate::{Error, Result};

/// A rendered object, where it lives, and how it correlates to its owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependentLink {
    pub descriptor: ResourceDescriptor,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    pub variant: HandlerVariant,
}

impl DependentLink {
    /// Server-side apply body holding only the correlation metadata
    pub fn apply_patch(&self, owner: &Owner) -> Result<serde_json::Value> {
        let mut metadata = json!({ "name": self.descriptor.name });
        if let Some(ns) = &self.namespace {
            metadata["namespace"] = json!(ns);
        }

        match self.variant {
            HandlerVariant::OwnerReference => {
                let reference = EnqueueForOwner::owner_reference_for(owner).ok_or_else(|| {
                    Error::InvalidOwner(format!("{} has no uid", owner.key()))
                })?;
                metadata["ownerReferences"] = json!([reference]);
            }
            HandlerVariant::Annotation => {
                metadata["annotations"] = json!(EnqueueForAnnotation::annotations_for(owner));
            }
        }

        Ok(json!({
            "apiVersion": self.descriptor.api_version,
            "kind": self.descriptor.kind,
            "metadata": metadata,
        }))
    }
}
