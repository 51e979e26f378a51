//! Helm Release Operator
//!
//! Main entry point for the operator. Loads configuration, sets up the
//! Kubernetes client and dependent watch machinery, and runs the
//! reconciliation loop.

use std::sync::Arc;

use anyhow::Context as _;
use kube::{discovery, Client};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use helm_release_operator::{
    adapters::{
        dependent_patch::KubeDependentPatcher, dynamic_watch::DynamicWatchController,
        helm::HelmCli, scope_resolver::KubeScopeResolver,
    },
    config::OperatorConfig,
    controllers::{release_controller, Context},
    watches::{DependentResourceWatcher, WatchRegistry},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    info!("Starting Helm Release Operator");

    let config = OperatorConfig::from_env()?;
    info!(
        owner = %format!("{}/{} {}", config.owner.group, config.owner.version, config.owner.kind),
        chart = %config.chart,
        namespace = config.watch_namespace.as_deref().unwrap_or("all namespaces"),
        "Loaded configuration"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let (owner_resource, _) = discovery::pinned_kind(&client, &config.owner)
        .await
        .with_context(|| format!("owner kind {} is not served by the cluster", config.owner.kind))?;

    let (watch_controller, triggers) =
        DynamicWatchController::new(client.clone(), owner_resource.clone());
    let registry = Arc::new(WatchRegistry::new(Arc::new(watch_controller)));
    let watcher =
        DependentResourceWatcher::new(registry, Arc::new(KubeScopeResolver::new(client.clone())));
    let releases = Arc::new(HelmCli::new(&config));
    let dependents = Arc::new(KubeDependentPatcher::new(client.clone()));

    // Create shared context
    let context = Context::new(client, config, owner_resource, releases, watcher, dependents);

    // Run the release controller
    let controller_handle = tokio::spawn(release_controller::run(context, triggers));

    // Handle graceful shutdown
    tokio::select! {
        _ = controller_handle => {
            error!("Release controller exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
        }
    }

    info!("Helm Release Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,helm_release_operator=debug,kube=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
