//! Per-pass error aggregation.

use std::fmt;
use thiserror::Error;

use crate::haproxy::ControlPlaneError;

/// Control-plane operation issued for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SetAddress,
    SetState,
    EditServer,
    CreateServer,
    ListServers,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SetAddress => "set_server_address",
            Operation::SetState => "set_server_state",
            Operation::EditServer => "edit_server",
            Operation::CreateServer => "create_server",
            Operation::ListServers => "list_servers",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed control-plane call for one slot.
#[derive(Debug, Error)]
#[error("{operation} '{backend}/{server}': {source}")]
pub struct SlotError {
    pub backend: String,
    pub server: String,
    pub operation: Operation,
    #[source]
    pub source: ControlPlaneError,
}

/// Collects the slot errors of one pass.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<SlotError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, backend: &str, server: &str, operation: Operation, source: ControlPlaneError) {
        self.errors.push(SlotError {
            backend: backend.to_string(),
            server: server.to_string(),
            operation,
            source,
        });
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Combined error, or `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), SyncError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError { errors: self.errors })
        }
    }
}

/// All slot errors of one synchronization pass.
#[derive(Debug)]
pub struct SyncError {
    errors: Vec<SlotError>,
}

impl SyncError {
    pub fn errors(&self) -> &[SlotError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} control-plane call(s) failed: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for SyncError {}
