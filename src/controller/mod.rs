//! Reconciliation of cluster snapshots into the proxy.
//!
//! # Data Flow
//! ```text
//! ClusterSnapshot
//!     → global / defaults annotations → change detector → push (restart / reload)
//!     → per referenced service port:
//!         ensure backend → backend annotations → push on change (reload)
//!         endpoints → AddressSet ─┐
//!         annotations → template, min slots ─┴→ Synchronizer
//!     → ReconcileOutcome { action, backends, failures }
//! ```
//!
//! # Design Decisions
//! - One backend's failure is logged and counted; the pass continues
//! - Runtime state is owned by the controller, keyed by `BackendKey`

use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

use crate::annotations::{self, Annotations};
use crate::config::schema::ControllerSettings;
use crate::haproxy::models::{Backend, ConfigObject};
use crate::haproxy::{ControlPlane, ControlPlaneError};
use crate::observability::metrics;
use crate::store::{BackendKey, ClusterSnapshot, Ingress, RuntimeState, Service, ServicePort};
use crate::sync::{
    classify, describe_changes, Address, AddressSet, ModelSnapshot, SyncAction, SyncError, SyncRequest, Synchronizer,
};

pub mod source;

pub use source::{load_snapshot, SnapshotError, SnapshotWatcher};

/// Failure of one backend or configuration section.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Most severe corrective action required.
    pub action: SyncAction,
    /// Backends synchronized in this pass.
    pub backends: usize,
    /// Backends whose pass finished with errors.
    pub failed_backends: Vec<String>,
    /// Global sections (`global`, `defaults`) that could not be read or pushed.
    pub failed_sections: Vec<&'static str>,
}

impl ReconcileOutcome {
    pub fn is_success(&self) -> bool {
        self.failed_backends.is_empty() && self.failed_sections.is_empty()
    }
}

/// A service port referenced by at least one ingress.
struct BackendRef<'s> {
    service: &'s Service,
    port: &'s ServicePort,
    /// First ingress referencing the port; its annotations apply.
    ingress: &'s Ingress,
}

/// Drives reconciliation passes against a control plane.
pub struct Controller<C> {
    client: C,
    state: RuntimeState,
    ingress_class: Option<String>,
    default_annotations: BTreeMap<String, String>,
}

impl<C: ControlPlane> Controller<C> {
    pub fn new(client: C, settings: &ControllerSettings) -> Self {
        Self {
            client,
            state: RuntimeState::new(),
            ingress_class: settings.ingress_class.clone(),
            default_annotations: settings.default_annotations.clone(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Run one pass over `snapshot`.
    pub async fn reconcile(&mut self, snapshot: &ClusterSnapshot) -> ReconcileOutcome {
        let started = Instant::now();
        let mut outcome = ReconcileOutcome::default();

        let global_annotations = Annotations::new()
            .with(&snapshot.config_map.annotations)
            .with(&self.default_annotations);
        match self.handle_global(&global_annotations).await {
            Ok(action) => outcome.action.escalate(action),
            Err(err) => {
                tracing::error!(error = %err, "Failed to update global section");
                outcome.failed_sections.push("global");
            }
        }
        match self.handle_defaults(&global_annotations).await {
            Ok(action) => outcome.action.escalate(action),
            Err(err) => {
                tracing::error!(error = %err, "Failed to update defaults section");
                outcome.failed_sections.push("defaults");
            }
        }

        let backends = self.referenced_backends(snapshot);
        for (key, backend_ref) in &backends {
            let name = key.backend_name();
            let mut action = SyncAction::None;
            let result = self.handle_backend(key, backend_ref, snapshot, &mut action).await;
            outcome.action.escalate(action);
            if let Err(err) = result {
                tracing::error!(backend = %name, error = %err, "Backend synchronization failed");
                metrics::record_backend_error(&name);
                outcome.failed_backends.push(name);
            }
            outcome.backends += 1;
        }

        for key in self.state.prune(|key| backends.contains_key(key)) {
            tracing::info!(backend = %key, "Dropping state of removed service port");
        }

        metrics::record_reconcile(outcome.action.as_str(), started.elapsed());
        tracing::info!(
            action = %outcome.action,
            backends = outcome.backends,
            failed = outcome.failed_backends.len() + outcome.failed_sections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation pass finished"
        );
        outcome
    }

    async fn handle_global(&self, annotations: &Annotations<'_>) -> Result<SyncAction, ReconcileError> {
        let current = self.client.get_global().await?;
        let mut desired = current.clone();
        annotations::apply_global(&mut desired, annotations);

        let action = classify(&ModelSnapshot::Global(current.clone()), &ModelSnapshot::Global(desired.clone()));
        if action > SyncAction::None {
            self.client.push_configuration(&ConfigObject::Global(desired.clone())).await?;
            tracing::debug!(changes = ?describe_changes(&current, &desired), "Global config updated, restart required");
        }
        Ok(action)
    }

    async fn handle_defaults(&self, annotations: &Annotations<'_>) -> Result<SyncAction, ReconcileError> {
        let current = self.client.get_defaults().await?;
        let mut desired = current.clone();
        annotations::apply_defaults(&mut desired, annotations);

        let action = classify(&ModelSnapshot::Defaults(current.clone()), &ModelSnapshot::Defaults(desired.clone()));
        if action > SyncAction::None {
            self.client.push_configuration(&ConfigObject::Defaults(desired.clone())).await?;
            tracing::debug!(changes = ?describe_changes(&current, &desired), "Defaults config updated, reload required");
        }
        Ok(action)
    }

    /// Ensure the backend exists and is configured, then synchronize its servers.
    ///
    /// `action` is raised as soon as a change is applied, so it stays accurate
    /// when a later step fails.
    async fn handle_backend(
        &mut self,
        key: &BackendKey,
        backend_ref: &BackendRef<'_>,
        snapshot: &ClusterSnapshot,
        action: &mut SyncAction,
    ) -> Result<(), ReconcileError> {
        let name = key.backend_name();
        let annotations = Annotations::new()
            .with(&backend_ref.service.annotations)
            .with(&backend_ref.ingress.annotations)
            .with(&snapshot.config_map.annotations)
            .with(&self.default_annotations);

        let new_backend = match self.client.get_backend(&name).await {
            Ok(current) => {
                let mut desired = current.clone();
                annotations::apply_backend(&mut desired, &annotations);
                let backend_action = classify(&ModelSnapshot::Backend(current.clone()), &ModelSnapshot::Backend(desired.clone()));
                if backend_action > SyncAction::None {
                    self.client.push_configuration(&ConfigObject::Backend(desired.clone())).await?;
                    tracing::debug!(backend = %name, changes = ?describe_changes(&current, &desired), "Backend config updated, reload required");
                    action.escalate(backend_action);
                }
                false
            }
            Err(err) if err.is_not_found() => {
                let mut backend = Backend::http(name.clone());
                annotations::apply_backend(&mut backend, &annotations);
                self.client.create_backend(&backend).await?;
                tracing::info!(backend = %name, "Backend created, reload required");
                action.escalate(SyncAction::Reload);
                true
            }
            Err(err) => return Err(err.into()),
        };

        let request = SyncRequest {
            backend: name,
            new_backend,
            addresses: addresses_for(key, backend_ref, snapshot),
            template: annotations::server_options(&annotations),
            min_slots: annotations::resolve_min_slots(&annotations),
        };

        let synchronizer = Synchronizer::new(&self.client);
        let slots = self.state.entry(key.clone());
        let synced = synchronizer.synchronize(slots, request).await;
        if synced.reload_required {
            action.escalate(SyncAction::Reload);
        }
        synced.into_result()?;
        Ok(())
    }

    /// Service ports referenced by live ingresses of the handled class.
    fn referenced_backends<'s>(&self, snapshot: &'s ClusterSnapshot) -> BTreeMap<BackendKey, BackendRef<'s>> {
        let mut backends = BTreeMap::new();

        for (namespace, ns) in &snapshot.namespaces {
            for tracked in ns.ingresses.values().filter(|ingress| ingress.is_live()) {
                let ingress = &tracked.resource;
                if !self.handles_class(ingress) {
                    continue;
                }
                for path in ingress.paths() {
                    let Some(service) = snapshot.service(namespace, &path.service) else {
                        tracing::warn!(ingress = %ingress.name, namespace = %namespace, service = %path.service, "Service not found");
                        continue;
                    };
                    let Some(port) = service.resolve_port(&path.port) else {
                        tracing::warn!(ingress = %ingress.name, namespace = %namespace, service = %path.service, port = %path.port, "Service port not found");
                        continue;
                    };
                    let key = BackendKey::new(namespace.clone(), service.name.clone(), port_id(port));
                    backends.entry(key).or_insert(BackendRef { service, port, ingress });
                }
            }
        }
        backends
    }

    fn handles_class(&self, ingress: &Ingress) -> bool {
        match &self.ingress_class {
            Some(class) => ingress.class.as_deref() == Some(class.as_str()),
            None => true,
        }
    }
}

/// Port component of a backend key: the port name, or its number when unnamed.
fn port_id(port: &ServicePort) -> String {
    if port.name.is_empty() {
        port.port.to_string()
    } else {
        port.name.clone()
    }
}

/// Live addresses of a referenced service port.
///
/// ExternalName services resolve to their DNS name on the service port.
fn addresses_for(key: &BackendKey, backend_ref: &BackendRef<'_>, snapshot: &ClusterSnapshot) -> AddressSet {
    if let Some(dns) = &backend_ref.service.dns {
        return [Address::new(dns.clone(), backend_ref.port.port)].into_iter().collect();
    }
    match snapshot.port_endpoints(&key.namespace, &key.service, &backend_ref.port.name) {
        Some(endpoints) => AddressSet::from_endpoints(endpoints),
        None => {
            tracing::debug!(backend = %key, "No endpoints for service port");
            AddressSet::new()
        }
    }
}
