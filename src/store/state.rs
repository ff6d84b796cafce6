//! Per-backend runtime state owned by the reconciliation task.

use std::collections::BTreeMap;
use std::fmt;

use crate::haproxy::models::ServerOptions;
use crate::sync::slots::SlotPool;

/// Composite key identifying one (namespace, service, service port) backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackendKey {
    pub namespace: String,
    pub service: String,
    pub port: String,
}

impl BackendKey {
    pub fn new(namespace: impl Into<String>, service: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
            port: port.into(),
        }
    }

    /// Proxy-facing backend name, stable for the lifetime of the service port.
    pub fn backend_name(&self) -> String {
        format!("{}-{}-{}", self.namespace, self.service, self.port)
    }
}

impl fmt::Display for BackendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.service, self.port)
    }
}

/// Slot pool of a backend plus the server template last pushed to it.
#[derive(Debug, Clone, Default)]
pub struct BackendSlots {
    pub pool: SlotPool,
    /// `None` until a template was applied in this process.
    pub applied_template: Option<ServerOptions>,
}

/// Owned map of all backend runtime state.
#[derive(Debug, Default)]
pub struct RuntimeState {
    backends: BTreeMap<BackendKey, BackendSlots>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state of a backend, creating an empty one on first use.
    pub fn entry(&mut self, key: BackendKey) -> &mut BackendSlots {
        self.backends.entry(key).or_default()
    }

    pub fn get(&self, key: &BackendKey) -> Option<&BackendSlots> {
        self.backends.get(key)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendKey, &BackendSlots)> {
        self.backends.iter()
    }

    /// Drop the state of backends whose owning service port is gone.
    /// Returns the removed keys.
    pub fn prune<F>(&mut self, mut keep: F) -> Vec<BackendKey>
    where
        F: FnMut(&BackendKey) -> bool,
    {
        let removed: Vec<BackendKey> = self
            .backends
            .keys()
            .filter(|key| !keep(key))
            .cloned()
            .collect();
        for key in &removed {
            self.backends.remove(key);
        }
        removed
    }
}
