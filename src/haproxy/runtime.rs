//! HAProxy runtime API client.
//!
//! # Responsibilities
//! - Send one command per connection over the stats/master Unix socket
//! - Classify the textual answer into success, not-found or error
//!
//! # Design Decisions
//! - Non-interactive mode: connect, write the command, read until close
//! - Each command is bounded by the configured timeout

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time;

use crate::haproxy::error::{ControlPlaneError, ControlPlaneResult};
use crate::haproxy::models::ServerState;

/// Client for the HAProxy runtime API.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl RuntimeClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Execute a raw command and return the answer.
    pub async fn execute(&self, command: &str) -> ControlPlaneResult<String> {
        let exchange = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            stream.write_all(format!("{}\n", command).as_bytes()).await?;
            let mut response = String::new();
            stream.read_to_string(&mut response).await?;
            Ok::<_, std::io::Error>(response)
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ControlPlaneError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    pub async fn set_server_addr(&self, backend: &str, server: &str, ip: &str, port: u16) -> ControlPlaneResult<()> {
        let command = format!("set server {}/{} addr {} port {}", backend, server, ip, port);
        let response = self.execute(&command).await?;
        check_response(&command, &response, backend, server)
    }

    pub async fn set_server_state(&self, backend: &str, server: &str, state: ServerState) -> ControlPlaneResult<()> {
        let command = format!("set server {}/{} state {}", backend, server, state);
        let response = self.execute(&command).await?;
        check_response(&command, &response, backend, server)
    }
}

/// Classify a runtime API answer to a `set server` command.
fn check_response(command: &str, response: &str, backend: &str, server: &str) -> ControlPlaneResult<()> {
    let message = response.trim();
    if message.is_empty() {
        return Ok(());
    }

    let lower = message.to_ascii_lowercase();
    if lower.starts_with("no such server") {
        return Err(ControlPlaneError::server_not_found(backend, server));
    }
    if lower.starts_with("no such backend") {
        return Err(ControlPlaneError::backend_not_found(backend));
    }
    // Address changes are acknowledged with an informational line.
    if lower.contains("changed from") || lower.contains("nothing changed") || lower.contains("no need to change") {
        return Ok(());
    }

    Err(ControlPlaneError::Runtime {
        command: command.to_string(),
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    const CMD: &str = "set server be/SRV_1 addr 10.0.0.1 port 80";

    #[test]
    fn test_check_response() {
        assert!(check_response(CMD, "\n", "be", "SRV_1").is_ok());
        assert!(check_response(CMD, "IP changed from '127.0.0.1' to '10.0.0.1', port changed from '0' to '80' by 'stats socket command'\n", "be", "SRV_1").is_ok());
        assert!(check_response(CMD, "nothing changed\n", "be", "SRV_1").is_ok());

        let err = check_response(CMD, "No such server.\n", "be", "SRV_1").unwrap_err();
        assert!(err.is_not_found());

        let err = check_response(CMD, "No such backend.\n", "be", "SRV_1").unwrap_err();
        assert!(err.is_not_found());

        let err = check_response(CMD, "Invalid addr.\n", "be", "SRV_1").unwrap_err();
        assert!(matches!(err, ControlPlaneError::Runtime { .. }));
    }

    #[tokio::test]
    async fn test_execute_over_socket() {
        let path = std::env::temp_dir().join(format!("ingress-sync-runtime-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            let command = String::from_utf8_lossy(&buf[..n]).to_string();
            socket.write_all(b"\n").await.unwrap();
            command
        });

        let client = RuntimeClient::new(&path, Duration::from_secs(2));
        client.set_server_state("be", "SRV_1", ServerState::Maint).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, "set server be/SRV_1 state maint\n");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_socket_is_io_error() {
        let client = RuntimeClient::new("/nonexistent/ingress-sync.sock", Duration::from_secs(1));
        let err = client.execute("show info").await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Io(_)));
    }
}
