//! Process-wide record of which dependent kinds are already watched

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kube::core::GroupVersionKind;
use tracing::{debug, info, warn};

use super::{EventHandler, GroupKind, WatchController};
use crate::metrics::prometheus::{WATCHED_KINDS, WATCH_REGISTRATIONS};
use crate::Result;

/// Ensures each kind is watched at most once for the lifetime of a controller.
///
/// Kinds are never removed once their watch is established, so objects left
/// behind by an older chart revision keep triggering reconciliation.
pub struct WatchRegistry {
    controller: Arc<dyn WatchController>,
    watched: Mutex<HashSet<GroupKind>>,
}

impl WatchRegistry {
    pub fn new(controller: Arc<dyn WatchController>) -> Self {
        Self {
            controller,
            watched: Mutex::new(HashSet::new()),
        }
    }

    /// Register a watch for `kind` unless one already exists.
    ///
    /// Returns `true` when this call performed the registration. `handler` is
    /// only invoked in that case. Concurrent callers for the same kind see
    /// `false` as soon as one of them has claimed it, even while that claim's
    /// watch call is still running. If the call then fails the claim is
    /// dropped, but those callers have already reported success; the kind is
    /// picked up again on their next reconciliation.
    pub async fn register_once<F>(&self, kind: &GroupVersionKind, handler: F) -> Result<bool>
    where
        F: FnOnce() -> EventHandler,
    {
        let group_kind = GroupKind::from(kind);
        if !self.claim(&group_kind) {
            debug!(kind = %group_kind, "Dependent kind already watched");
            return Ok(false);
        }

        let handler = handler();
        let variant = handler.variant();
        if let Err(e) = self.controller.watch(kind, handler).await {
            // Give the kind back so a later reconciliation can retry
            self.release(&group_kind);
            warn!(kind = %group_kind, error = %e, "Failed to watch dependent kind");
            return Err(e);
        }

        WATCH_REGISTRATIONS
            .with_label_values(&[variant.as_str()])
            .inc();
        WATCHED_KINDS.set(self.len() as f64);
        info!(kind = %group_kind, handler = %variant, "Watching dependent resource kind");
        Ok(true)
    }

    pub fn is_watched(&self, kind: &GroupKind) -> bool {
        self.lock().contains(kind)
    }

    /// Sorted snapshot of every claimed kind
    pub fn watched_kinds(&self) -> Vec<GroupKind> {
        let mut kinds: Vec<GroupKind> = self.lock().iter().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Atomic check-and-insert
    fn claim(&self, kind: &GroupKind) -> bool {
        self.lock().insert(kind.clone())
    }

    fn release(&self, kind: &GroupKind) {
        self.lock().remove(kind);
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<GroupKind>> {
        // The set is never left half-updated, so a poisoned lock is still usable
        self.watched.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
