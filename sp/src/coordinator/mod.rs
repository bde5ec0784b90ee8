//! Coordinator for cross-surface sync
//!
//! The Coordinator is the single broker between surfaces:
//! - **Registry:** which surfaces are currently live
//! - **Broadcast:** relay edit/submit events to every other surface
//! - **Identity:** decide which container is the trusted dashboard
//! - **Sync state:** the global enable/disable flag, persisted and pushed
//!
//! It runs as one actor task; all mutable state is owned by the run loop
//! and mutated sequentially. The task is ephemeral by design: after an idle
//! period it drops everything in memory and lazily rebuilds from the
//! persistent store as surfaces re-register.

mod broadcast;
mod config;
mod core;
mod handle;
mod identity;
mod messages;
mod registry;

pub use broadcast::{Delivery, FanOut, fan_out};
pub use config::CoordinatorConfig;
pub use self::core::{Coordinator, KEY_SYNC_ENABLED};
pub use handle::{CoordinatorHandle, PeerHandle};
pub use identity::{Admission, IdentityManager, KEY_DASHBOARD_CONTAINER};
pub use messages::{
    ConnectionInfo, CoordError, CoordRequest, CoordResult, CoordinatorMetrics, DashboardEvent, PeerMessage,
    RegisterReply, StatusReport,
};
pub use registry::{ContainerId, FrameEntry, FrameHandle, Registry, SubContextId};
