//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → reconcile loop finishes the current pass → exit
//! ```
//!
//! # Design Decisions
//! - A pass is never interrupted halfway; slot state stays consistent
//! - Watchers are dropped with the loop

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
