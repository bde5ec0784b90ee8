//! IPC message types for daemon control
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON
//! followed by `\n`.

use serde::{Deserialize, Serialize};

use crate::catalog::ServiceCatalog;
use crate::coordinator::StatusReport;

/// Messages from dashboard/CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Current connection status and sync flag
    GetStatus,

    /// Persist and fan out a new sync flag
    SetSyncEnabled { enabled: bool },

    /// Read the service catalog
    GetServices,

    /// Persist the service catalog
    SaveServices { services: ServiceCatalog },

    /// Ping to check if the daemon is alive
    Ping,

    /// Request the daemon to stop gracefully
    Shutdown,
}

/// Responses from daemon to dashboard/CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ControlResponse {
    /// Acknowledgment
    Ok,

    /// Connection status and sync flag
    Status {
        #[serde(flatten)]
        report: StatusReport,
    },

    /// The sync flag after a SetSyncEnabled
    SyncEnabled { enabled: bool },

    /// The service catalog
    Services { services: ServiceCatalog },

    /// Pong response to ping
    Pong { version: String },

    /// Error response
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    #[test]
    fn test_get_status_serialize() {
        let msg = ControlMessage::GetStatus;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"GetStatus"}"#);
    }

    #[test]
    fn test_set_sync_enabled_serialize() {
        let msg = ControlMessage::SetSyncEnabled { enabled: false };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"SetSyncEnabled","enabled":false}"#);
    }

    #[test]
    fn test_ping_serialize() {
        let msg = ControlMessage::Ping;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"Ping"}"#);
    }

    #[test]
    fn test_shutdown_serialize() {
        let msg = ControlMessage::Shutdown;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"Shutdown"}"#);
    }

    #[test]
    fn test_pong_response_serialize() {
        let resp = ControlResponse::Pong {
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"Pong","version":"0.1.0"}"#);
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ControlResponse::Error {
            message: "Something went wrong".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"Error","message":"Something went wrong"}"#);
    }

    #[test]
    fn test_status_response_flattens_report() {
        let resp = ControlResponse::Status {
            report: StatusReport {
                status: Default::default(),
                sync_enabled: true,
            },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""type":"Status""#));
        assert!(json.contains(r#""sync-enabled":true"#));

        let parsed: ControlResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, resp);
    }

    #[test]
    fn test_roundtrip_all_messages() {
        let messages = vec![
            ControlMessage::GetStatus,
            ControlMessage::SetSyncEnabled { enabled: true },
            ControlMessage::GetServices,
            ControlMessage::SaveServices {
                services: default_catalog(),
            },
            ControlMessage::Ping,
            ControlMessage::Shutdown,
        ];

        for msg in messages {
            let json = serde_json::to_string(&msg).unwrap();
            let parsed: ControlMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(msg, parsed);
        }
    }

    #[test]
    fn test_roundtrip_all_responses() {
        let responses = vec![
            ControlResponse::Ok,
            ControlResponse::SyncEnabled { enabled: false },
            ControlResponse::Services {
                services: default_catalog(),
            },
            ControlResponse::Pong {
                version: "1.2.3".to_string(),
            },
            ControlResponse::Error {
                message: "test error".to_string(),
            },
        ];

        for resp in responses {
            let json = serde_json::to_string(&resp).unwrap();
            let parsed: ControlResponse = serde_json::from_str(&json).unwrap();
            assert_eq!(resp, parsed);
        }
    }
}
