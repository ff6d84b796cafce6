//! Control-plane error definitions.

use thiserror::Error;

/// Errors reported by a control-plane call.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The addressed server or backend is not part of the live configuration.
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    /// The runtime API answered with an error message.
    #[error("runtime API rejected '{command}': {message}")]
    Runtime { command: String, message: String },

    /// Runtime socket could not be reached or was closed mid-command.
    #[error("runtime socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Control-plane call did not complete in time.
    #[error("control-plane call timed out after {0} ms")]
    Timeout(u64),

    /// Data Plane API answered with a non-success status.
    #[error("Data Plane API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP transport failure.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("invalid Data Plane API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("invalid Data Plane API URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ControlPlaneError {
    pub fn server_not_found(backend: &str, server: &str) -> Self {
        ControlPlaneError::NotFound {
            kind: "server",
            name: format!("{}/{}", backend, server),
        }
    }

    pub fn backend_not_found(backend: &str) -> Self {
        ControlPlaneError::NotFound {
            kind: "backend",
            name: backend.to_string(),
        }
    }

    /// Whether the error signals that the target must be created instead of edited.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlPlaneError::NotFound { .. })
    }
}

/// Result type for control-plane operations.
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;
