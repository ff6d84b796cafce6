//! Dynamic backend synchronization and change detection.
//!
//! # Data Flow
//! ```text
//! AddressSet (live endpoints of a service port)
//!     → servers.rs (reconcile: match, disable stale, reuse disabled slots)
//!     → slots.rs   (scale: grow to minimum, mint slots for leftovers)
//!     → servers.rs (push dirty slots: runtime API + configuration write)
//!     → ControlPlane
//!
//! Any model object (global, defaults, backend, server template)
//!     → detect.rs (before/after value comparison)
//!     → SyncAction: none / reload / restart
//! ```
//!
//! # Design Decisions
//! - Pure logic over the `ControlPlane` trait; no transport knowledge
//! - Per-slot failures are collected (errors.rs) and never abort a pass
//! - Failed slots stay dirty and are retried on the next pass

pub mod detect;
pub mod errors;
pub mod servers;
pub mod slots;

pub use detect::{changed, classify, describe_changes, ModelSnapshot, SyncAction};
pub use errors::{ErrorList, Operation, SlotError, SyncError};
pub use servers::{SyncOutcome, SyncRequest, Synchronizer};
pub use slots::{Address, AddressSet, Slot, SlotPool};
