//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use ingress_sync::haproxy::models::{Backend, ConfigObject, Defaults, Global, Server, ServerOptions, ServerState, Toggle};
use ingress_sync::haproxy::{ControlPlane, ControlPlaneError, ControlPlaneResult};
use ingress_sync::sync::SlotPool;

pub const BACKEND: &str = "default-web-http";

/// A control-plane call as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetAddress { backend: String, server: String, ip: String, port: u16 },
    SetState { backend: String, server: String, state: ServerState },
    ListServers(String),
    GetServer { backend: String, server: String },
    CreateServer { backend: String, server: Server },
    EditServer { backend: String, server: Server },
    GetBackend(String),
    CreateBackend(String),
    GetGlobal,
    GetDefaults,
    Push(&'static str),
}

impl Call {
    pub fn is_runtime(&self) -> bool {
        matches!(self, Call::SetAddress { .. } | Call::SetState { .. })
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Call::ListServers(_) | Call::GetServer { .. } | Call::GetBackend(_) | Call::GetGlobal | Call::GetDefaults)
    }
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    servers: BTreeMap<(String, String), Server>,
    backends: BTreeMap<String, Backend>,
    global: Global,
    defaults: Defaults,
    /// Servers unknown to the running proxy.
    missing_runtime: BTreeSet<String>,
    /// (operation, object name) pairs that fail.
    failures: BTreeSet<(&'static str, String)>,
}

/// In-memory control plane recording every call.
#[derive(Default)]
pub struct MockControlPlane {
    inner: Mutex<Inner>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register servers matching `pool` in the configuration of `backend`.
    pub fn with_servers(self, backend: &str, pool: &SlotPool, options: &ServerOptions) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            for slot in pool.iter() {
                let server = Server {
                    name: slot.name().to_string(),
                    address: slot.address.clone(),
                    port: Some(slot.port),
                    maintenance: Some(Toggle::from(slot.is_disabled())),
                    options: options.clone(),
                };
                inner.servers.insert((backend.to_string(), slot.name().to_string()), server);
            }
        }
        self
    }

    pub fn with_backend(self, backend: Backend) -> Self {
        self.inner.lock().unwrap().backends.insert(backend.name.clone(), backend);
        self
    }

    pub fn with_global(self, global: Global) -> Self {
        self.inner.lock().unwrap().global = global;
        self
    }

    pub fn with_defaults(self, defaults: Defaults) -> Self {
        self.inner.lock().unwrap().defaults = defaults;
        self
    }

    /// Make `operation` fail for the object called `name`.
    pub fn fail(&self, operation: &'static str, name: &str) {
        self.inner.lock().unwrap().failures.insert((operation, name.to_string()));
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    /// Report `server` as unknown to the running proxy.
    pub fn missing_at_runtime(&self, server: &str) {
        self.inner.lock().unwrap().missing_runtime.insert(server.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn runtime_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_runtime).collect()
    }

    pub fn write_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn server(&self, backend: &str, name: &str) -> Option<Server> {
        self.inner.lock().unwrap().servers.get(&(backend.to_string(), name.to_string())).cloned()
    }

    pub fn server_count(&self, backend: &str) -> usize {
        self.inner.lock().unwrap().servers.keys().filter(|(b, _)| b == backend).count()
    }

    pub fn backend(&self, name: &str) -> Option<Backend> {
        self.inner.lock().unwrap().backends.get(name).cloned()
    }

    pub fn global(&self) -> Global {
        self.inner.lock().unwrap().global.clone()
    }

    pub fn defaults(&self) -> Defaults {
        self.inner.lock().unwrap().defaults.clone()
    }

    fn record(&self, call: Call, operation: &'static str, name: &str) -> ControlPlaneResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.failures.contains(&(operation, name.to_string())) {
            return Err(ControlPlaneError::Runtime {
                command: operation.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl ControlPlane for MockControlPlane {
    async fn set_server_address(&self, backend: &str, server: &str, ip: &str, port: u16) -> ControlPlaneResult<()> {
        let call = Call::SetAddress { backend: backend.into(), server: server.into(), ip: ip.into(), port };
        self.record(call, "set_server_address", server)?;
        if self.inner.lock().unwrap().missing_runtime.contains(server) {
            return Err(ControlPlaneError::server_not_found(backend, server));
        }
        Ok(())
    }

    async fn set_server_state(&self, backend: &str, server: &str, state: ServerState) -> ControlPlaneResult<()> {
        let call = Call::SetState { backend: backend.into(), server: server.into(), state };
        self.record(call, "set_server_state", server)?;
        if self.inner.lock().unwrap().missing_runtime.contains(server) {
            return Err(ControlPlaneError::server_not_found(backend, server));
        }
        Ok(())
    }

    async fn list_servers(&self, backend: &str) -> ControlPlaneResult<Vec<Server>> {
        self.record(Call::ListServers(backend.into()), "list_servers", backend)?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .servers
            .iter()
            .filter(|((b, _), _)| b == backend)
            .map(|(_, server)| server.clone())
            .collect())
    }

    async fn get_server(&self, backend: &str, name: &str) -> ControlPlaneResult<Server> {
        self.record(Call::GetServer { backend: backend.into(), server: name.into() }, "get_server", name)?;
        self.server(backend, name)
            .ok_or_else(|| ControlPlaneError::server_not_found(backend, name))
    }

    async fn create_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()> {
        self.record(Call::CreateServer { backend: backend.into(), server: server.clone() }, "create_server", &server.name)?;
        self.inner
            .lock()
            .unwrap()
            .servers
            .insert((backend.to_string(), server.name.clone()), server.clone());
        Ok(())
    }

    async fn edit_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()> {
        self.record(Call::EditServer { backend: backend.into(), server: server.clone() }, "edit_server", &server.name)?;
        let mut inner = self.inner.lock().unwrap();
        let key = (backend.to_string(), server.name.clone());
        match inner.servers.get_mut(&key) {
            Some(existing) => {
                *existing = server.clone();
                Ok(())
            }
            None => Err(ControlPlaneError::server_not_found(backend, &server.name)),
        }
    }

    async fn get_backend(&self, name: &str) -> ControlPlaneResult<Backend> {
        self.record(Call::GetBackend(name.into()), "get_backend", name)?;
        self.backend(name)
            .ok_or_else(|| ControlPlaneError::backend_not_found(name))
    }

    async fn create_backend(&self, backend: &Backend) -> ControlPlaneResult<()> {
        self.record(Call::CreateBackend(backend.name.clone()), "create_backend", &backend.name)?;
        self.inner.lock().unwrap().backends.insert(backend.name.clone(), backend.clone());
        Ok(())
    }

    async fn get_global(&self) -> ControlPlaneResult<Global> {
        self.record(Call::GetGlobal, "get_global", "")?;
        Ok(self.global())
    }

    async fn get_defaults(&self) -> ControlPlaneResult<Defaults> {
        self.record(Call::GetDefaults, "get_defaults", "")?;
        Ok(self.defaults())
    }

    async fn push_configuration(&self, object: &ConfigObject) -> ControlPlaneResult<()> {
        self.record(Call::Push(object.class()), "push_configuration", object.class())?;
        let mut inner = self.inner.lock().unwrap();
        match object {
            ConfigObject::Global(global) => inner.global = global.clone(),
            ConfigObject::Defaults(defaults) => inner.defaults = defaults.clone(),
            ConfigObject::Backend(backend) => {
                inner.backends.insert(backend.name.clone(), backend.clone());
            }
        }
        Ok(())
    }
}
