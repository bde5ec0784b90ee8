//! Frame registry - the surfaces that are currently live
//!
//! Rebuilt from scratch on every coordinator (re)start; never persisted.
//! Entries leave on explicit unregister, on failed delivery, or when their
//! owning container is torn down.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::debug;

use super::messages::PeerMessage;

/// Identifies a top-level browsing container (one dashboard tab)
pub type ContainerId = u64;

/// Identifies a sub-context within a container (one embedded surface)
pub type SubContextId = u64;

/// Identity of one live surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHandle {
    pub container_id: ContainerId,
    pub sub_context_id: SubContextId,
    pub service_key: String,
}

/// One registry entry: the surface identity plus its delivery channel
#[derive(Debug, Clone)]
pub struct FrameEntry {
    pub handle: FrameHandle,
    pub tx: mpsc::Sender<PeerMessage>,
}

/// Live surfaces, in registration order
///
/// Insertion order is irrelevant for correctness but preserved so status
/// reporting comes out deterministic. Invariant: at most one entry per
/// `(container_id, sub_context_id)` pair.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<FrameEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert a surface, replacing any prior entry for the same
    /// `(container, sub-context)` pair. Always succeeds.
    pub fn register(&mut self, handle: FrameHandle, tx: mpsc::Sender<PeerMessage>) {
        self.entries.retain(|e| {
            !(e.handle.container_id == handle.container_id && e.handle.sub_context_id == handle.sub_context_id)
        });
        debug!(
            container_id = handle.container_id,
            sub_context_id = handle.sub_context_id,
            service_key = %handle.service_key,
            total = self.entries.len() + 1,
            "Registered frame"
        );
        self.entries.push(FrameEntry { handle, tx });
    }

    /// Remove a surface if present; idempotent. Returns whether it existed.
    pub fn unregister(&mut self, container_id: ContainerId, sub_context_id: SubContextId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.handle.container_id == container_id && e.handle.sub_context_id == sub_context_id));
        let removed = self.entries.len() != before;
        if removed {
            debug!(container_id, sub_context_id, total = self.entries.len(), "Unregistered frame");
        }
        removed
    }

    /// Remove every surface belonging to a container; returns how many left
    pub fn unregister_container(&mut self, container_id: ContainerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle.container_id != container_id);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(container_id, removed, "Unregistered container frames");
        }
        removed
    }

    pub fn get(&self, container_id: ContainerId, sub_context_id: SubContextId) -> Option<&FrameEntry> {
        self.entries
            .iter()
            .find(|e| e.handle.container_id == container_id && e.handle.sub_context_id == sub_context_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry (coordinator teardown)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Read-only view: service key -> handle, most recent registration wins
    pub fn snapshot(&self) -> BTreeMap<String, FrameHandle> {
        let mut map = BTreeMap::new();
        for entry in &self.entries {
            map.insert(entry.handle.service_key.clone(), entry.handle.clone());
        }
        map
    }
}
