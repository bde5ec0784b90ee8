//! Syncpane - mirror embedded chat prompts across services
//!
//! Syncpane keeps several independent, embedded text-editing surfaces (one
//! per external chat service, each in its own isolated sub-context) mirrored
//! in near-real time: typing in one surface replays into all others, and
//! triggering submit in one triggers it in all others.
//!
//! # Core Concepts
//!
//! - **One broker, many surfaces**: a single Coordinator actor owns the
//!   registry and relays events; surfaces never talk to each other directly
//! - **Ephemeral broker**: the Coordinator may be torn down when idle; only
//!   the dashboard identity, the sync flag, and the service catalog are
//!   persisted, everything else is reconstructible cache
//! - **Best-effort sync**: delivery is fire-and-forget; a failed target is
//!   simply unregistered and re-registers itself later
//! - **One active typist**: full-text replace with last-writer-wins rather
//!   than merge machinery
//!
//! # Modules
//!
//! - [`coordinator`] - registry, broadcast engine, dashboard identity, sync state
//! - [`peer`] - per-surface sync agent (debounce, echo guard)
//! - [`surface`] - the adapter seam surfaces sit behind
//! - [`catalog`] - the service catalog and its defaults
//! - [`ipc`] - Unix-socket control plane for the dashboard/CLI
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod catalog;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod ipc;
pub mod peer;
pub mod surface;

// Re-export commonly used types
pub use catalog::{ServiceCatalog, ServiceDef, default_catalog};
pub use config::{Config, StorageConfig};
pub use coordinator::{
    ConnectionInfo, ContainerId, CoordError, CoordRequest, CoordResult, Coordinator, CoordinatorConfig,
    CoordinatorHandle, CoordinatorMetrics, DashboardEvent, Delivery, FrameEntry, FrameHandle, PeerHandle, PeerMessage,
    Registry, RegisterReply, StatusReport, SubContextId,
};
pub use daemon::{DaemonManager, DaemonStatus};
pub use ipc::{ControlMessage, ControlResponse, SyncClient};
pub use peer::{Debouncer, PeerConfig, PeerState, PeerSyncAgent, SurfaceEvent};
pub use surface::SurfaceAdapter;
