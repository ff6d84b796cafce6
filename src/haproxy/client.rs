//! Combined control-plane client: runtime API for live server mutations,
//! Data Plane API for configuration.

use crate::haproxy::dataplane::DataPlaneClient;
use crate::haproxy::error::ControlPlaneResult;
use crate::haproxy::models::{Backend, ConfigObject, Defaults, Global, Server, ServerState};
use crate::haproxy::runtime::RuntimeClient;
use crate::haproxy::ControlPlane;

/// Control plane backed by a live HAProxy instance.
#[derive(Debug, Clone)]
pub struct HaproxyClient {
    runtime: RuntimeClient,
    dataplane: DataPlaneClient,
}

impl HaproxyClient {
    pub fn new(runtime: RuntimeClient, dataplane: DataPlaneClient) -> Self {
        Self { runtime, dataplane }
    }

    pub fn runtime(&self) -> &RuntimeClient {
        &self.runtime
    }
}

impl ControlPlane for HaproxyClient {
    async fn set_server_address(&self, backend: &str, server: &str, ip: &str, port: u16) -> ControlPlaneResult<()> {
        self.runtime.set_server_addr(backend, server, ip, port).await
    }

    async fn set_server_state(&self, backend: &str, server: &str, state: ServerState) -> ControlPlaneResult<()> {
        self.runtime.set_server_state(backend, server, state).await
    }

    async fn list_servers(&self, backend: &str) -> ControlPlaneResult<Vec<Server>> {
        self.dataplane.get_servers(backend).await
    }

    async fn get_server(&self, backend: &str, name: &str) -> ControlPlaneResult<Server> {
        self.dataplane.get_server(backend, name).await
    }

    async fn create_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()> {
        self.dataplane.create_server(backend, server).await
    }

    async fn edit_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()> {
        self.dataplane.put_server(backend, server).await
    }

    async fn get_backend(&self, name: &str) -> ControlPlaneResult<Backend> {
        self.dataplane.get_backend(name).await
    }

    async fn create_backend(&self, backend: &Backend) -> ControlPlaneResult<()> {
        self.dataplane.create_backend(backend).await
    }

    async fn get_global(&self) -> ControlPlaneResult<Global> {
        self.dataplane.get_global().await
    }

    async fn get_defaults(&self) -> ControlPlaneResult<Defaults> {
        self.dataplane.get_defaults().await
    }

    async fn push_configuration(&self, object: &ConfigObject) -> ControlPlaneResult<()> {
        match object {
            ConfigObject::Global(global) => self.dataplane.put_global(global).await,
            ConfigObject::Defaults(defaults) => self.dataplane.put_defaults(defaults).await,
            ConfigObject::Backend(backend) => self.dataplane.put_backend(backend).await,
        }
    }
}
