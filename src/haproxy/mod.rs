//! HAProxy control plane.
//!
//! # Data Flow
//! ```text
//! sync / controller
//!     → ControlPlane trait
//!         → runtime.rs   (runtime API socket: server address/state, no reload)
//!         → dataplane.rs (Data Plane API: server/backend/global/defaults config)
//!     → HAProxy process
//! ```
//!
//! # Design Decisions
//! - Synchronization logic only sees the `ControlPlane` trait, never a transport
//! - "does not exist" answers are mapped to `ControlPlaneError::NotFound` so callers
//!   can fall back to creating the object
//! - Every call is a blocking round-trip from the caller's point of view

pub mod client;
pub mod dataplane;
pub mod error;
pub mod models;
pub mod runtime;

pub use client::HaproxyClient;
pub use error::{ControlPlaneError, ControlPlaneResult};
pub use models::{Backend, ConfigObject, Defaults, Global, Server, ServerOptions, ServerState};

/// Operations the synchronization core needs from the proxy.
#[allow(async_fn_in_trait)]
pub trait ControlPlane {
    /// Change the address of a live server.
    async fn set_server_address(&self, backend: &str, server: &str, ip: &str, port: u16) -> ControlPlaneResult<()>;

    /// Change the administrative state of a live server.
    async fn set_server_state(&self, backend: &str, server: &str, state: ServerState) -> ControlPlaneResult<()>;

    /// Every server configured in a backend.
    async fn list_servers(&self, backend: &str) -> ControlPlaneResult<Vec<Server>>;

    /// Read a server from the configuration.
    async fn get_server(&self, backend: &str, name: &str) -> ControlPlaneResult<Server>;

    /// Add a server to the configuration.
    async fn create_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()>;

    /// Replace a server in the configuration. Fails with `NotFound` when it must be created.
    async fn edit_server(&self, backend: &str, server: &Server) -> ControlPlaneResult<()>;

    /// Read a backend from the configuration.
    async fn get_backend(&self, name: &str) -> ControlPlaneResult<Backend>;

    /// Add a backend to the configuration.
    async fn create_backend(&self, backend: &Backend) -> ControlPlaneResult<()>;

    async fn get_global(&self) -> ControlPlaneResult<Global>;

    async fn get_defaults(&self) -> ControlPlaneResult<Defaults>;

    /// Push a whole configuration section.
    async fn push_configuration(&self, object: &ConfigObject) -> ControlPlaneResult<()>;
}
