//! kube-runtime backed watches on kinds only known at runtime

use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiResource};
use kube::runtime::reflector::ObjectRef;
use kube::{Api, Client};
use kube_runtime::{watcher, WatchStreamExt};
use tracing::{debug, info, warn};

use crate::watches::{EventHandler, GroupKind, OwnerRequest, WatchController};
use crate::{Error, Result};

/// Owner reconcile requests produced by dependent watches
pub type OwnerTriggers = UnboundedReceiver<ObjectRef<DynamicObject>>;

/// Starts one watch stream per registered kind and forwards the owners its
/// handler maps events to into the owner controller's trigger stream.
pub struct DynamicWatchController {
    client: Client,
    owner_resource: ApiResource,
    triggers: UnboundedSender<ObjectRef<DynamicObject>>,
}

impl DynamicWatchController {
    /// The receiver must be handed to the owner controller's `reconcile_on`
    pub fn new(client: Client, owner_resource: ApiResource) -> (Self, OwnerTriggers) {
        let (triggers, receiver) = mpsc::unbounded();
        (
            Self {
                client,
                owner_resource,
                triggers,
            },
            receiver,
        )
    }
}

/// Reconcile request for one owner, as the owner controller expects it
pub fn owner_ref(request: &OwnerRequest, owner_resource: &ApiResource) -> ObjectRef<DynamicObject> {
    let reference = ObjectRef::new_with(&request.name, owner_resource.clone());
    match &request.namespace {
        Some(ns) => reference.within(ns),
        None => reference,
    }
}

#[async_trait]
impl WatchController for DynamicWatchController {
    async fn watch(&self, kind: &GroupVersionKind, handler: EventHandler) -> Result<()> {
        let group_kind = GroupKind::from(kind);
        let (resource, _) = discovery::pinned_kind(&self.client, kind)
            .await
            .map_err(|e| Error::WatchRegistration {
                kind: group_kind.to_string(),
                message: e.to_string(),
            })?;

        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let owner_resource = self.owner_resource.clone();
        let triggers = self.triggers.clone();

        tokio::spawn(async move {
            let mut events = watcher(api, watcher::Config::default())
                .default_backoff()
                .touched_objects()
                .boxed();

            while let Some(event) = events.next().await {
                let obj = match event {
                    Ok(obj) => obj,
                    Err(e) => {
                        warn!(kind = %group_kind, error = %e, "Dependent watch error");
                        continue;
                    }
                };
                for request in handler.requests_for(&obj) {
                    debug!(
                        kind = %group_kind,
                        owner = %request.name,
                        namespace = ?request.namespace,
                        "Dependent change enqueues owner"
                    );
                    if triggers
                        .unbounded_send(owner_ref(&request, &owner_resource))
                        .is_err()
                    {
                        info!(kind = %group_kind, "Owner controller stopped, ending dependent watch");
                        return;
                    }
                }
            }
        });

        Ok(())
    }
}
