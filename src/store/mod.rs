//! Cluster resource snapshots and per-backend runtime state.
//!
//! # Data Flow
//! ```text
//! watching collaborator (external)
//!     → types.rs (ClusterSnapshot: services, endpoints, ingresses, configmap)
//!     → controller reconciliation pass
//!     → state.rs (RuntimeState: BackendKey → slot pool + applied template)
//! ```
//!
//! # Design Decisions
//! - Resource status lives next to the resource (`Tracked<T>`), never inside it,
//!   so derived equality only looks at fields with proxy effect
//! - Runtime state is an owned map handed to a single reconciliation task;
//!   there is no process-wide registry

pub mod state;
pub mod types;

pub use state::{BackendKey, BackendSlots, RuntimeState};
pub use types::{
    ClusterSnapshot, ConfigMap, Endpoints, Ingress, IngressPath, IngressRule, NamespaceSnapshot,
    PortEndpoints, Service, ServicePort, ServicePortRef, Status, Tracked,
};
