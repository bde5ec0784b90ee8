//! IPC client for communicating with the daemon

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use crate::catalog::ServiceCatalog;
use crate::coordinator::StatusReport;

use super::get_socket_path;
use super::listener::MAX_MESSAGE_SIZE;
use super::messages::{ControlMessage, ControlResponse};

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct SyncClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for SyncClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client with a custom socket path (for testing)
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check if the daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("SyncClient: pinging daemon");
        match self.send_message(ControlMessage::Ping).await? {
            ControlResponse::Pong { version } => Ok(version),
            ControlResponse::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Fetch connection status for every registered surface
    pub async fn status(&self) -> Result<StatusReport> {
        debug!("SyncClient: requesting status");
        match self.send_message(ControlMessage::GetStatus).await? {
            ControlResponse::Status { report } => Ok(report),
            ControlResponse::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Set the global sync flag
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<bool> {
        debug!(enabled, "SyncClient: setting sync flag");
        match self.send_message(ControlMessage::SetSyncEnabled { enabled }).await? {
            ControlResponse::SyncEnabled { enabled } => Ok(enabled),
            ControlResponse::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Fetch the service catalog
    pub async fn get_services(&self) -> Result<ServiceCatalog> {
        debug!("SyncClient: requesting services");
        match self.send_message(ControlMessage::GetServices).await? {
            ControlResponse::Services { services } => Ok(services),
            ControlResponse::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Persist the service catalog
    pub async fn save_services(&self, services: ServiceCatalog) -> Result<()> {
        debug!("SyncClient: saving services");
        match self.send_message(ControlMessage::SaveServices { services }).await? {
            ControlResponse::Ok => Ok(()),
            ControlResponse::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Request the daemon to shut down gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("SyncClient: requesting daemon shutdown");
        match self.send_message(ControlMessage::Shutdown).await? {
            ControlResponse::Ok => Ok(()),
            ControlResponse::Error { message } => Err(eyre::eyre!("Daemon error: {}", message)),
            _ => Err(eyre::eyre!("Unexpected response")),
        }
    }

    /// Send a message to the daemon and wait for the response
    async fn send_message(&self, msg: ControlMessage) -> Result<ControlResponse> {
        debug!(?self.socket_path, ?msg, "SyncClient: sending message");

        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")?;

        self.send_on_stream(stream, msg).await
    }

    async fn send_on_stream(&self, mut stream: UnixStream, msg: ControlMessage) -> Result<ControlResponse> {
        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;

        if msg_json.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        tokio::time::timeout(self.timeout, async {
            stream.write_all(msg_json.as_bytes()).await.context("Failed to write message")?;
            stream.write_all(b"\n").await.context("Failed to write newline")?;
            stream.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let mut reader = BufReader::new(&mut stream);
        let mut response_line = String::new();

        tokio::time::timeout(self.timeout, async {
            let bytes_read = reader
                .read_line(&mut response_line)
                .await
                .context("Failed to read response")?;

            if bytes_read > MAX_MESSAGE_SIZE {
                return Err(eyre::eyre!("Response too large: {} bytes", bytes_read));
            }

            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Read timeout")??;

        let response: ControlResponse =
            serde_json::from_str(response_line.trim()).context("Failed to parse daemon response")?;

        debug!(?response, "SyncClient: received response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{create_listener_at, read_message, send_response};
    use tempfile::TempDir;

    #[test]
    fn test_client_default() {
        let client = SyncClient::default();
        assert!(client.socket_path.ends_with("daemon.sock"));
    }

    #[test]
    fn test_client_with_custom_path() {
        let path = PathBuf::from("/custom/path/daemon.sock");
        let client = SyncClient::with_socket_path(path.clone());
        assert_eq!(client.socket_path, path);
    }

    #[test]
    fn test_client_with_timeout() {
        let client = SyncClient::new().with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_socket_exists_false() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.sock");
        let client = SyncClient::with_socket_path(path);
        assert!(!client.socket_exists());
    }

    #[tokio::test]
    async fn test_ping_against_stub_server() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let msg = read_message(&mut stream).await.unwrap();
            assert_eq!(msg, ControlMessage::Ping);
            send_response(
                &mut stream,
                ControlResponse::Pong {
                    version: "9.9.9".to_string(),
                },
            )
            .await
            .unwrap();
        });

        let client = SyncClient::with_socket_path(socket_path);
        let version = client.ping().await.unwrap();
        assert_eq!(version, "9.9.9");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_becomes_error() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_message(&mut stream).await.unwrap();
            send_response(
                &mut stream,
                ControlResponse::Error {
                    message: "store unavailable".to_string(),
                },
            )
            .await
            .unwrap();
        });

        let client = SyncClient::with_socket_path(socket_path);
        let result = client.set_sync_enabled(true).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("store unavailable"));

        server.await.unwrap();
    }
}
