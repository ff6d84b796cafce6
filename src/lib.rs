//! HAProxy ingress backend synchronization.
//!
//! Maps service endpoints onto stable pools of named server slots, pushes
//! changes through the HAProxy runtime and Data Plane APIs, and classifies
//! every pass as no-op, reload or restart.

pub mod annotations;
pub mod config;
pub mod controller;
pub mod haproxy;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;
pub mod sync;

pub use config::schema::ControllerConfig;
pub use controller::{Controller, ReconcileOutcome};
pub use haproxy::{ControlPlane, HaproxyClient};
pub use lifecycle::Shutdown;
pub use sync::{SyncAction, Synchronizer};
