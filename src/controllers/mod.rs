//! Controller implementations for watching and reconciling resources

pub mod release_controller;

use kube::discovery::ApiResource;
use kube::Client;
use std::sync::Arc;

use crate::config::OperatorConfig;
use crate::reconcilers::release::ReleaseManager;
use crate::watches::{DependentPatcher, DependentResourceWatcher};

/// Shared context for controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Operator configuration
    pub config: OperatorConfig,
    /// Discovered API resource of the owner kind
    pub owner_resource: ApiResource,
    /// Helm release operations
    pub releases: Arc<dyn ReleaseManager>,
    /// Dependent watch setup, shared by every reconciliation
    pub watcher: DependentResourceWatcher,
    /// Writes owner references and annotations onto rendered objects
    pub dependents: Arc<dyn DependentPatcher>,
}

impl Context {
    /// Create a new context
    pub fn new(
        client: Client,
        config: OperatorConfig,
        owner_resource: ApiResource,
        releases: Arc<dyn ReleaseManager>,
        watcher: DependentResourceWatcher,
        dependents: Arc<dyn DependentPatcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            config,
            owner_resource,
            releases,
            watcher,
            dependents,
        })
    }
}
