//! Message types for the Coordinator

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::catalog::ServiceCatalog;

use super::registry::{ContainerId, SubContextId};

/// Errors surfaced to request/response callers
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Coordinator channel closed")]
    ChannelClosed,

    #[error("Coordinator dropped the reply")]
    ReplyDropped,
}

pub type CoordResult<T> = Result<T, CoordError>;

/// Messages delivered to registered surfaces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Replace the surface's full text
    SyncText { text: String },

    /// Trigger the surface's submit action
    DoSubmit,

    /// The global sync flag changed
    SyncStateChanged { enabled: bool },
}

/// Reply to a registration request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterReply {
    /// Whether the surface was admitted into the registry
    pub admitted: bool,

    /// Current global sync flag, so the surface starts in the right state
    #[serde(rename = "sync-enabled")]
    pub sync_enabled: bool,
}

/// Connection info for one service in a status report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionInfo {
    #[serde(rename = "container-id")]
    pub container_id: ContainerId,

    #[serde(rename = "sub-context-id")]
    pub sub_context_id: SubContextId,

    pub connected: bool,
}

/// Snapshot of which services are connected plus the sync flag
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    /// Service key -> connection info for every live surface
    pub status: BTreeMap<String, ConnectionInfo>,

    #[serde(rename = "sync-enabled")]
    pub sync_enabled: bool,
}

/// Best-effort pushes to a subscribed dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// The set of connected surfaces changed (or a periodic refresh fired)
    ConnectionStatus(StatusReport),

    /// The global sync flag changed
    SyncStateChanged { enabled: bool },
}

/// Requests sent to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Register a surface; replies with admission and the current sync flag
    Register {
        container_id: ContainerId,
        sub_context_id: SubContextId,
        service_key: String,
        /// Address of the registering container, for the identity fallback
        origin: String,
        tx: mpsc::Sender<PeerMessage>,
        reply: oneshot::Sender<RegisterReply>,
    },

    /// Remove one surface; idempotent
    Unregister {
        container_id: ContainerId,
        sub_context_id: SubContextId,
    },

    /// A container was torn down; remove all of its surfaces
    ContainerClosed { container_id: ContainerId },

    /// A surface observed a local edit (fire-and-forget)
    TextChanged {
        container_id: ContainerId,
        sub_context_id: SubContextId,
        text: String,
    },

    /// A surface detected a local submit intent (fire-and-forget)
    SubmitTriggered {
        container_id: ContainerId,
        sub_context_id: SubContextId,
    },

    /// Current connection status and sync flag
    GetStatus { reply: oneshot::Sender<StatusReport> },

    /// Persist and fan out a new sync flag
    SetSyncEnabled {
        enabled: bool,
        reply: oneshot::Sender<CoordResult<bool>>,
    },

    /// Read the service catalog, merged with built-in defaults
    GetServices {
        reply: oneshot::Sender<CoordResult<ServiceCatalog>>,
    },

    /// Persist the service catalog
    SaveServices {
        services: ServiceCatalog,
        reply: oneshot::Sender<CoordResult<()>>,
    },

    /// Get current metrics
    GetMetrics {
        reply: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Idle status-refresh deadline fired (internal)
    IdleRefresh { generation: u64 },

    /// Shutdown the coordinator
    Shutdown,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default)]
pub struct CoordinatorMetrics {
    pub registered_surfaces: usize,
    pub messages_received: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub registrations_rejected: u64,
    pub broadcasts_suppressed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_text_serialize() {
        let msg = PeerMessage::SyncText {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"SyncText","text":"hello"}"#);
    }

    #[test]
    fn test_do_submit_serialize() {
        let msg = PeerMessage::DoSubmit;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"DoSubmit"}"#);
    }

    #[test]
    fn test_sync_state_changed_roundtrip() {
        let msg = PeerMessage::SyncStateChanged { enabled: false };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: PeerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, parsed);
    }

    #[test]
    fn test_register_reply_field_names() {
        let reply = RegisterReply {
            admitted: true,
            sync_enabled: false,
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"admitted":true,"sync-enabled":false}"#);
    }

    #[test]
    fn test_status_report_serialization() {
        let mut report = StatusReport {
            status: BTreeMap::new(),
            sync_enabled: true,
        };
        report.status.insert(
            "chatgpt".to_string(),
            ConnectionInfo {
                container_id: 7,
                sub_context_id: 2,
                connected: true,
            },
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""sync-enabled":true"#));
        assert!(json.contains(r#""container-id":7"#));

        let parsed: StatusReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
