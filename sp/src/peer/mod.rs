//! Peer sync agent - the per-surface side of the sync contract
//!
//! One agent runs per surface. It registers with the Coordinator, observes
//! local edits through a debounced, echo-guarded pipeline, and applies the
//! events it receives through the surface adapter.

mod agent;
mod debounce;

pub use agent::{PeerConfig, PeerState, PeerSyncAgent, SurfaceEvent};
pub use debounce::Debouncer;
