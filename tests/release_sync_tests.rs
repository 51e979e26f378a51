//! Integration tests for release synchronisation
//!
//! A fake release manager stands in for helm so the hand-off from a rendered
//! release to dependent watching and linking can be checked end to end.

mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use common::*;
use helm_release_operator::adapters::scope_resolver::StaticScopeResolver;
use helm_release_operator::reconcilers::release::{
    release_values, sync_release, Release, ReleaseManager,
};
use helm_release_operator::status::ReleaseStatus;
use helm_release_operator::watches::handler::{
    PRIMARY_RESOURCE_ANNOTATION, PRIMARY_RESOURCE_TYPE_ANNOTATION,
};
use helm_release_operator::watches::{HandlerVariant, Owner, ResourceScope};
use helm_release_operator::{Error, Result};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::json;

struct FakeReleases {
    manifest: String,
    fail: bool,
    installs: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeReleases {
    fn rendering(manifest: String) -> Self {
        Self {
            manifest,
            fail: false,
            installs: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            manifest: String::new(),
            fail: true,
            installs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReleaseManager for FakeReleases {
    async fn install_or_upgrade(&self, owner: &Owner, values: &serde_json::Value) -> Result<Release> {
        if self.fail {
            return Err(Error::ReleaseError("chart not found".to_string()));
        }
        self.installs
            .lock()
            .unwrap()
            .push((owner.name.clone(), values.clone()));
        Ok(Release {
            name: owner.name.clone(),
            namespace: owner
                .namespace
                .clone()
                .unwrap_or_else(|| "operators".to_string()),
            manifest: self.manifest.clone(),
        })
    }

    async fn uninstall(&self, _owner: &Owner) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn sync_installs_then_watches_rendered_kinds() {
    let controller = FakeController::new();
    let watcher = watcher_with(controller.clone(), known_apis());
    let releases =
        FakeReleases::rendering(manifest(&[RS_OWNER_NAMESPACE, SS_OTHER_NAMESPACE]));
    let values = json!({ "replicaCount": 2 });

    let patcher = RecordingPatcher::new();

    let release = sync_release(
        &persisted(deployment_owner()),
        &values,
        &releases,
        &watcher,
        &patcher,
    )
    .await
    .unwrap();

    assert_eq!(release.name, "testDeployment");
    assert_eq!(
        releases.installs.lock().unwrap().as_slice(),
        &[("testDeployment".to_string(), values)]
    );
    assert_eq!(
        controller.variants(),
        vec![HandlerVariant::OwnerReference, HandlerVariant::Annotation]
    );
}

#[tokio::test]
async fn install_failure_skips_watch_setup() {
    let controller = FakeController::new();
    let watcher = watcher_with(controller.clone(), known_apis());

    let patcher = RecordingPatcher::new();

    let result = sync_release(
        &persisted(deployment_owner()),
        &json!({}),
        &FakeReleases::failing(),
        &watcher,
        &patcher,
    )
    .await;

    assert!(matches!(result, Err(Error::ReleaseError(_))));
    assert!(controller.calls().is_empty());
    assert!(patcher.applied().is_empty());
}

#[tokio::test]
async fn missing_crd_is_reported_as_unknown_kind_on_status() {
    let controller = FakeController::new();
    let resolver = StaticScopeResolver::new().with(&deployment(), ResourceScope::Namespaced);
    let watcher = watcher_with(controller.clone(), resolver);
    let widget = "\napiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\n";
    let releases = FakeReleases::rendering(manifest(&[widget]));

    let err = sync_release(
        &persisted(deployment_owner()),
        &json!({}),
        &releases,
        &watcher,
        &RecordingPatcher::new(),
    )
    .await
    .unwrap_err();
    let status = ReleaseStatus::failed(&err, Some(4), chrono::Utc::now());

    assert_eq!(status.conditions[0].type_, "ReleaseFailed");
    assert_eq!(status.conditions[0].reason.as_deref(), Some("UnknownKind"));
    assert!(status.conditions[0]
        .message
        .as_deref()
        .unwrap_or_default()
        .contains("Widget"));
}

#[tokio::test]
async fn rendered_objects_carry_the_metadata_their_handler_reads() {
    let controller = FakeController::new();
    let watcher = watcher_with(controller.clone(), known_apis());
    let unnamespaced = "\napiVersion: apps/v1\nkind: ReplicaSet\nmetadata:\n  name: defaultedReplicaSet\n";
    let releases = FakeReleases::rendering(manifest(&[
        RS_OWNER_NAMESPACE,
        SS_OTHER_NAMESPACE,
        CLUSTER_ROLE,
        unnamespaced,
    ]));
    let patcher = RecordingPatcher::new();
    let owner = persisted(deployment_owner());

    sync_release(&owner, &json!({}), &releases, &watcher, &patcher)
        .await
        .unwrap();
    assert_eq!(patcher.applied().len(), 4);

    let same_namespace = patcher.for_object("testReplicaSet");
    assert_eq!(same_namespace.namespace.as_deref(), Some("ownerNamespace"));
    let reference = &same_namespace.body["metadata"]["ownerReferences"][0];
    assert_eq!(reference["apiVersion"], "apps/v1");
    assert_eq!(reference["kind"], "Deployment");
    assert_eq!(reference["name"], "testDeployment");
    assert_eq!(reference["uid"], "uid-testDeployment");
    assert_eq!(reference["controller"], true);

    let other_namespace = patcher.for_object("otherTestStatefulSet");
    assert_eq!(other_namespace.namespace.as_deref(), Some("otherNamespace"));
    let annotations = &other_namespace.body["metadata"]["annotations"];
    assert_eq!(
        annotations[PRIMARY_RESOURCE_ANNOTATION],
        "ownerNamespace/testDeployment"
    );
    assert_eq!(annotations[PRIMARY_RESOURCE_TYPE_ANNOTATION], "Deployment.apps");
    assert!(other_namespace.body["metadata"].get("ownerReferences").is_none());

    let cluster_scoped = patcher.for_object("testClusterRole");
    assert_eq!(cluster_scoped.kind, "ClusterRole");
    assert_eq!(cluster_scoped.namespace, None);
    assert!(cluster_scoped.body["metadata"].get("namespace").is_none());

    let defaulted = patcher.for_object("defaultedReplicaSet");
    assert_eq!(defaulted.namespace.as_deref(), Some("ownerNamespace"));
    assert_eq!(defaulted.body["metadata"]["namespace"], "ownerNamespace");
}

#[tokio::test]
async fn injected_metadata_maps_dependent_changes_back_to_owner() {
    let controller = FakeController::new();
    let watcher = watcher_with(controller.clone(), known_apis());
    let releases = FakeReleases::rendering(manifest(&[RS_OWNER_NAMESPACE, SS_OTHER_NAMESPACE]));
    let patcher = RecordingPatcher::new();
    let owner = persisted(deployment_owner());

    sync_release(&owner, &json!({}), &releases, &watcher, &patcher)
        .await
        .unwrap();

    for call in controller.calls() {
        let applied = patcher
            .applied()
            .into_iter()
            .find(|p| p.kind == call.kind.kind)
            .unwrap();
        let mut live: DynamicObject = serde_json::from_value(applied.body).unwrap();
        live.metadata.namespace = applied.namespace.clone();

        let requests = call.handler.requests_for(&live);
        assert_eq!(requests.len(), 1, "{} did not correlate", call.kind.kind);
        assert_eq!(requests[0].name, "testDeployment");
        assert_eq!(requests[0].namespace.as_deref(), Some("ownerNamespace"));
    }
}

#[tokio::test]
async fn owner_without_uid_cannot_be_referenced() {
    let controller = FakeController::new();
    let watcher = watcher_with(controller.clone(), known_apis());
    let releases = FakeReleases::rendering(manifest(&[RS_OWNER_NAMESPACE]));

    let result = sync_release(
        &deployment_owner(),
        &json!({}),
        &releases,
        &watcher,
        &RecordingPatcher::new(),
    )
    .await;

    assert!(matches!(result, Err(Error::InvalidOwner(_))));
}

#[test]
fn values_come_from_owner_spec() {
    let resource = ApiResource::from_gvk(&deployment());
    let obj = DynamicObject::new("web", &resource)
        .within("ownerNamespace")
        .data(json!({ "spec": { "image": "memcached:1.6" } }));
    assert_eq!(release_values(&obj), json!({ "image": "memcached:1.6" }));

    let bare = DynamicObject::new("web", &resource);
    assert_eq!(release_values(&bare), json!({}));
}
