//! Inter-process communication for daemon control
//!
//! Unix Domain Socket IPC between the dashboard/CLI and the daemon. Each
//! message is a single line of JSON followed by `\n`. The daemon's accept
//! loop translates control messages into coordinator requests.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::SyncClient;
pub use listener::{cleanup_socket, create_listener, create_listener_at, read_message, send_response};
pub use messages::{ControlMessage, ControlResponse};

/// Get the socket path for daemon IPC
///
/// Uses the same base directory as the other daemon files (PID file,
/// version file).
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("syncpane")
        .join("daemon.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_daemon_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("syncpane/daemon.sock"));
    }
}
