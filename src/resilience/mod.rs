//! Resilience helpers.
//!
//! A failed reconcile pass leaves the affected slots dirty, so the next pass
//! retries them. Consecutive failures space passes out with exponential
//! backoff so an unreachable proxy is not hammered.

pub mod backoff;

pub use backoff::{pass_delay, Backoff};
