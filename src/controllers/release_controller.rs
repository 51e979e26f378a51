//! Controller for release-backed custom resources

use futures::StreamExt;
use kube::{
    api::DynamicObject,
    runtime::{
        controller::{self, Action, Controller},
        finalizer::{finalizer, Event},
        watcher::Config,
    },
    Api, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::adapters::dynamic_watch::OwnerTriggers;
use crate::controllers::Context;
use crate::metrics::prometheus::{RECONCILE_DURATION, RECONCILIATIONS, RECONCILIATION_ERRORS};
use crate::reconcilers::release::{self, sync_release, FINALIZER};
use crate::status::ReleaseStatus;
use crate::watches::Owner;
use crate::Error;

/// Run the release controller.
///
/// `triggers` carries owner reconcile requests raised by dependent watches.
pub async fn run(ctx: Arc<Context>, triggers: OwnerTriggers) {
    let client = ctx.client.clone();
    let owners: Api<DynamicObject> = match &ctx.config.watch_namespace {
        Some(ns) => Api::namespaced_with(client, ns, &ctx.owner_resource),
        None => Api::all_with(client, &ctx.owner_resource),
    };
    let kind = ctx.config.owner.kind.clone();

    info!(kind = %kind, "Starting release controller");

    let controller_config =
        controller::Config::default().concurrency(ctx.config.max_concurrent_reconciles);

    Controller::new_with(
        owners,
        Config::default().any_semantic(),
        ctx.owner_resource.clone(),
    )
    .with_config(controller_config)
    .reconcile_on(triggers)
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(|res| async move {
        match res {
            Ok(o) => info!("Reconciled {:?}", o),
            Err(e) => error!("Reconcile failed: {:?}", e),
        }
    })
    .await;

    info!(kind = %kind, "Release controller stopped");
}

fn owner_api(obj: &DynamicObject, ctx: &Context) -> Api<DynamicObject> {
    match obj.namespace() {
        Some(ns) => Api::namespaced_with(ctx.client.clone(), &ns, &ctx.owner_resource),
        None => Api::all_with(ctx.client.clone(), &ctx.owner_resource),
    }
}

/// Reconcile one owner
#[instrument(skip(obj, ctx), fields(name = %obj.name_any(), namespace = obj.namespace().unwrap_or_default()))]
async fn reconcile(obj: Arc<DynamicObject>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start = std::time::Instant::now();
    let kind = ctx.config.owner.kind.as_str();
    let name = obj.name_any();

    RECONCILIATIONS.with_label_values(&[kind]).inc();

    let owners = owner_api(&obj, &ctx);
    let result = finalizer(&owners, FINALIZER, obj, |event| async {
        match event {
            Event::Apply(obj) => apply(&obj, &ctx).await,
            Event::Cleanup(obj) => cleanup(&obj, &ctx).await,
        }
    })
    .await;

    let duration = start.elapsed().as_secs_f64();
    RECONCILE_DURATION.with_label_values(&[kind]).observe(duration);

    match &result {
        Ok(_) => info!("Successfully reconciled {} in {:.2}s", name, duration),
        Err(e) => {
            RECONCILIATION_ERRORS.with_label_values(&[kind]).inc();
            error!("Failed to reconcile {}: {}", name, e);
        }
    }

    Ok(result?)
}

/// Install or upgrade the release, watch its dependents and link them
async fn apply(obj: &DynamicObject, ctx: &Context) -> Result<Action, Error> {
    let owner = Owner::from_object(obj, &ctx.config.owner)?;
    let api = owner_api(obj, ctx);

    let values = release::release_values(obj);
    let deployed = match sync_release(
        &owner,
        &values,
        ctx.releases.as_ref(),
        &ctx.watcher,
        ctx.dependents.as_ref(),
    )
    .await
    {
        Ok(deployed) => deployed,
        Err(e) => {
            release::report_failure(&api, obj, &e).await;
            return Err(e);
        }
    };

    let status = ReleaseStatus::deployed(
        &deployed.name,
        ctx.watcher.registry().len(),
        obj.metadata.generation,
        chrono::Utc::now(),
    );
    release::update_status(&api, obj, &status).await?;

    Ok(Action::requeue(ctx.config.reconcile_period))
}

/// Uninstall the release when its owner is deleted
async fn cleanup(obj: &DynamicObject, ctx: &Context) -> Result<Action, Error> {
    let owner = Owner::from_object(obj, &ctx.config.owner)?;
    info!("Uninstalling release for {}", owner.key());

    ctx.releases.uninstall(&owner).await?;

    // Dependent watches stay registered; other owners may share the kinds
    Ok(Action::await_change())
}

/// Requeue delay for a failed reconciliation
pub fn requeue_delay(err: &Error) -> Duration {
    match err.root_cause() {
        // The kind may be served once its CRD is established
        Error::UnknownKind { .. } => Duration::from_secs(15),
        cause if cause.is_transient() => Duration::from_secs(30),
        _ => Duration::from_secs(300),
    }
}

/// Error policy for the controller
fn error_policy(obj: Arc<DynamicObject>, err: &Error, _ctx: Arc<Context>) -> Action {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    error!("Reconciliation error for {}/{}: {:?}", ns, name, err);

    Action::requeue(requeue_delay(err))
}
