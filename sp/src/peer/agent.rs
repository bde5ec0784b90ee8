//! Per-surface sync agent

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::coordinator::{PeerHandle, PeerMessage};
use crate::surface::SurfaceAdapter;

use super::debounce::Debouncer;

/// Local events observed on the surface, fed in by the embedder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The editable element's full text changed
    TextChanged(String),

    /// The user signalled submit (an affirmative keypress)
    SubmitIntent,
}

/// Agent lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Unregistered,
    Registering,
    Admitted,
    /// Admission failed; the agent is inert and never observes or emits.
    /// This is what lets the same adapter run harmlessly outside the
    /// dashboard.
    Rejected,
}

/// Peer agent timing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Quiet window before a local edit is sent upstream
    #[serde(rename = "debounce-ms", default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Delay between a received submit and invoking it, so an immediately
    /// preceding text replace finishes mutating the surface first
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_debounce_ms() -> u64 {
    80
}

fn default_settle_ms() -> u64 {
    150
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

/// Runs the send/receive discipline for one surface
pub struct PeerSyncAgent {
    handle: PeerHandle,
    adapter: Arc<dyn SurfaceAdapter>,
    events: mpsc::Receiver<SurfaceEvent>,
    config: PeerConfig,
    state: PeerState,
    sync_enabled: bool,
    /// Exact text most recently received from the coordinator. A local
    /// observation equal to it is an echo of our own apply and must not be
    /// re-broadcast.
    last_synced: Option<String>,
    debouncer: Debouncer,
}

impl PeerSyncAgent {
    pub fn new(
        handle: PeerHandle,
        adapter: Arc<dyn SurfaceAdapter>,
        events: mpsc::Receiver<SurfaceEvent>,
        config: PeerConfig,
    ) -> Self {
        let debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms));
        Self {
            handle,
            adapter,
            events,
            config,
            state: PeerState::Unregistered,
            sync_enabled: true,
            last_synced: None,
            debouncer,
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Register and run until the local event feed closes
    ///
    /// A rejected registration leaves the agent inert and returns. Loss of
    /// the broker (delivery channel closed) triggers a proactive
    /// re-registration with a fresh channel.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.state = PeerState::Registering;
            let reply = match self.handle.register().await {
                Ok(reply) => reply,
                Err(e) => {
                    // Sync failure must never block ordinary use of the
                    // surface; give up quietly.
                    warn!(
                        error = %e,
                        service_key = %self.handle.service_key(),
                        "Registration failed, surface continues unsynced"
                    );
                    self.state = PeerState::Unregistered;
                    return Ok(());
                }
            };

            if !reply.admitted {
                debug!(service_key = %self.handle.service_key(), "Registration rejected, agent inert");
                self.state = PeerState::Rejected;
                return Ok(());
            }

            self.state = PeerState::Admitted;
            self.sync_enabled = reply.sync_enabled;
            info!(
                service_key = %self.handle.service_key(),
                sync_enabled = self.sync_enabled,
                "Surface admitted"
            );

            if !self.pump().await {
                return Ok(());
            }
            debug!(service_key = %self.handle.service_key(), "Broker went away, re-registering");
        }
    }

    /// Process events until the local feed ends (returns false) or the
    /// broker goes away (returns true; the caller re-registers)
    async fn pump(&mut self) -> bool {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(SurfaceEvent::TextChanged(text)) => self.on_local_text(text),
                    Some(SurfaceEvent::SubmitIntent) => self.on_local_submit().await,
                    None => {
                        debug!("Local event feed closed");
                        return false;
                    }
                },
                message = self.handle.recv() => match message {
                    Some(message) => self.on_peer_message(message).await,
                    None => return true,
                },
                _ = sleep_until_opt(deadline) => {
                    if let Some(text) = self.debouncer.fire() {
                        self.send_text(text).await;
                    }
                }
            }
        }
    }

    fn on_local_text(&mut self, text: String) {
        if !self.sync_enabled {
            return;
        }
        if self.last_synced.as_deref() == Some(text.as_str()) {
            debug!("Echo of last synced value, dropped");
            return;
        }
        self.debouncer.observe(text);
    }

    async fn on_local_submit(&mut self) {
        if !self.sync_enabled {
            return;
        }
        // Flush pending text first so receivers apply the final value
        // before their settle-delayed submit reads it
        if let Some(text) = self.debouncer.fire() {
            self.send_text(text).await;
        }
        if let Err(e) = self.handle.submit_triggered().await {
            debug!(error = %e, "Failed to send submit event");
        }
    }

    async fn send_text(&self, text: String) {
        if let Err(e) = self.handle.text_changed(text).await {
            debug!(error = %e, "Failed to send text event");
        }
    }

    async fn on_peer_message(&mut self, message: PeerMessage) {
        match message {
            PeerMessage::SyncText { text } => {
                if !self.sync_enabled || text.is_empty() {
                    return;
                }
                self.last_synced = Some(text.clone());
                if let Err(e) = self.adapter.set_text(&text).await {
                    warn!(error = %e, service_key = %self.adapter.service_key(), "Adapter failed to apply text");
                }
            }
            PeerMessage::DoSubmit => {
                if !self.sync_enabled {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
                if let Err(e) = self.adapter.submit().await {
                    warn!(error = %e, service_key = %self.adapter.service_key(), "Adapter failed to submit");
                }
            }
            PeerMessage::SyncStateChanged { enabled } => {
                debug!(enabled, "Sync state changed");
                self.sync_enabled = enabled;
                if !enabled {
                    self.debouncer.cancel();
                }
            }
        }
    }
}

/// Sleep until the deadline, or forever when none is armed
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, CoordinatorConfig, PeerMessage};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use syncstore::Store;
    use tempfile::tempdir;

    const HOME_ORIGIN: &str = "app://syncpane/dashboard";

    struct RecordingSurface {
        key: String,
        texts: Mutex<Vec<String>>,
        submits: AtomicUsize,
    }

    impl RecordingSurface {
        fn new(key: &str) -> Arc<Self> {
            Arc::new(Self {
                key: key.to_string(),
                texts: Mutex::new(Vec::new()),
                submits: AtomicUsize::new(0),
            })
        }

        fn texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().clone()
        }

        fn submits(&self) -> usize {
            self.submits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SurfaceAdapter for RecordingSurface {
        fn service_key(&self) -> &str {
            &self.key
        }

        async fn set_text(&self, text: &str) -> Result<()> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn submit(&self) -> Result<()> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> PeerConfig {
        PeerConfig {
            debounce_ms: 30,
            settle_ms: 10,
        }
    }

    struct TestBed {
        coordinator_task: tokio::task::JoinHandle<()>,
        control: crate::coordinator::CoordinatorHandle,
        _temp: tempfile::TempDir,
        coordinator_sender: tokio::sync::mpsc::Sender<crate::coordinator::CoordRequest>,
    }

    async fn spawn_coordinator() -> TestBed {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        let coordinator = Coordinator::new(CoordinatorConfig::default(), store);
        let control = coordinator.control_handle();
        let coordinator_sender = coordinator.sender();
        let coordinator_task = tokio::spawn(coordinator.run());
        TestBed {
            coordinator_task,
            control,
            _temp: temp,
            coordinator_sender,
        }
    }

    fn peer_handle(bed: &TestBed, sub_context_id: u64, service_key: &str) -> PeerHandle {
        PeerHandle::new(
            bed.coordinator_sender.clone(),
            32,
            1,
            sub_context_id,
            service_key.to_string(),
            HOME_ORIGIN.to_string(),
        )
    }

    /// Register a bare observer surface and return its delivery stream
    async fn register_observer(bed: &TestBed, sub_context_id: u64, service_key: &str) -> PeerHandle {
        let mut handle = peer_handle(bed, sub_context_id, service_key);
        let reply = handle.register().await.unwrap();
        assert!(reply.admitted);
        handle
    }

    #[tokio::test]
    async fn test_debounce_collapses_burst_to_last_value() {
        let bed = spawn_coordinator().await;
        let mut observer = register_observer(&bed, 2, "gemini").await;

        let adapter = RecordingSurface::new("chatgpt");
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut agent = PeerSyncAgent::new(peer_handle(&bed, 1, "chatgpt"), adapter, events_rx, fast_config());

        let agent_task = async {
            // Feed a burst of per-keystroke observations within the window
            events_tx.send(SurfaceEvent::TextChanged("h".into())).await.unwrap();
            events_tx.send(SurfaceEvent::TextChanged("he".into())).await.unwrap();
            events_tx.send(SurfaceEvent::TextChanged("hello".into())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(events_tx);
        };
        let (run_result, ()) = tokio::join!(agent.run(), agent_task);
        run_result.unwrap();

        // Exactly one delivery, carrying the last observed value
        assert_eq!(
            observer.recv().await.unwrap(),
            PeerMessage::SyncText {
                text: "hello".to_string()
            }
        );
        assert!(observer.try_recv().is_none());

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_guard_drops_received_value() {
        let bed = spawn_coordinator().await;
        let mut sender_surface = register_observer(&bed, 2, "gemini").await;

        let adapter = RecordingSurface::new("chatgpt");
        let applied = adapter.clone();
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut agent = PeerSyncAgent::new(peer_handle(&bed, 1, "chatgpt"), adapter, events_rx, fast_config());

        let agent_task = async {
            // Another surface authors "hola"
            sender_surface.text_changed("hola".to_string()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;

            // Our own observer fires with the value we just applied
            events_tx.send(SurfaceEvent::TextChanged("hola".into())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(events_tx);
        };
        let (run_result, ()) = tokio::join!(agent.run(), agent_task);
        run_result.unwrap();

        // The agent applied the received text once
        assert_eq!(applied.texts(), vec!["hola".to_string()]);

        // ...and produced zero outbound echoes back at the sender
        assert!(sender_surface.try_recv().is_none());

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_received_submit_invokes_adapter_after_settle() {
        let bed = spawn_coordinator().await;
        let sender_surface = register_observer(&bed, 2, "gemini").await;

        let adapter = RecordingSurface::new("chatgpt");
        let submits = adapter.clone();
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut agent = PeerSyncAgent::new(peer_handle(&bed, 1, "chatgpt"), adapter, events_rx, fast_config());

        let agent_task = async {
            sender_surface.submit_triggered().await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(events_tx);
        };
        let (run_result, ()) = tokio::join!(agent.run(), agent_task);
        run_result.unwrap();

        assert_eq!(submits.submits(), 1);

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_local_submit_flushes_pending_text_first() {
        let bed = spawn_coordinator().await;
        let mut observer = register_observer(&bed, 2, "gemini").await;

        let adapter = RecordingSurface::new("chatgpt");
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut agent = PeerSyncAgent::new(peer_handle(&bed, 1, "chatgpt"), adapter, events_rx, fast_config());

        let agent_task = async {
            // Submit lands while the text is still pending in the debouncer
            events_tx.send(SurfaceEvent::TextChanged("final words".into())).await.unwrap();
            events_tx.send(SurfaceEvent::SubmitIntent).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(events_tx);
        };
        let (run_result, ()) = tokio::join!(agent.run(), agent_task);
        run_result.unwrap();

        assert_eq!(
            observer.recv().await.unwrap(),
            PeerMessage::SyncText {
                text: "final words".to_string()
            }
        );
        assert_eq!(observer.recv().await.unwrap(), PeerMessage::DoSubmit);

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_agent_is_inert() {
        let bed = spawn_coordinator().await;

        let adapter = RecordingSurface::new("chatgpt");
        let (events_tx, events_rx) = mpsc::channel(16);
        // Foreign container, origin that doesn't match the home prefix
        let handle = PeerHandle::new(
            bed.coordinator_sender.clone(),
            32,
            99,
            1,
            "chatgpt".to_string(),
            "https://chatgpt.com/".to_string(),
        );
        let mut agent = PeerSyncAgent::new(handle, adapter, events_rx, fast_config());

        agent.run().await.unwrap();
        assert_eq!(agent.state(), PeerState::Rejected);
        drop(events_tx);

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_sync_stops_apply_and_emit() {
        let bed = spawn_coordinator().await;
        let mut observer = register_observer(&bed, 2, "gemini").await;

        let adapter = RecordingSurface::new("chatgpt");
        let applied = adapter.clone();
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut agent = PeerSyncAgent::new(peer_handle(&bed, 1, "chatgpt"), adapter, events_rx, fast_config());

        let control = bed.control.clone();
        let agent_task = async {
            // Let the agent register, then disable sync globally
            tokio::time::sleep(Duration::from_millis(50)).await;
            control.set_sync_enabled(false).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            // Local edits while disabled go nowhere
            events_tx.send(SurfaceEvent::TextChanged("muted".into())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;

            // Re-enable and edit again
            control.set_sync_enabled(true).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            events_tx.send(SurfaceEvent::TextChanged("audible".into())).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
            drop(events_tx);
        };
        let (run_result, ()) = tokio::join!(agent.run(), agent_task);
        run_result.unwrap();

        // The observer sees the two state changes and only the enabled edit
        let mut received = Vec::new();
        while let Some(message) = observer.try_recv() {
            received.push(message);
        }
        assert!(received.contains(&PeerMessage::SyncStateChanged { enabled: false }));
        assert!(received.contains(&PeerMessage::SyncStateChanged { enabled: true }));
        assert!(received.contains(&PeerMessage::SyncText {
            text: "audible".to_string()
        }));
        assert!(!received.contains(&PeerMessage::SyncText {
            text: "muted".to_string()
        }));

        // Nothing was applied locally either
        assert!(applied.texts().is_empty());

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_sync_text_not_applied() {
        let bed = spawn_coordinator().await;
        let sender_surface = register_observer(&bed, 2, "gemini").await;

        let adapter = RecordingSurface::new("chatgpt");
        let applied = adapter.clone();
        let (events_tx, events_rx) = mpsc::channel(16);
        let mut agent = PeerSyncAgent::new(peer_handle(&bed, 1, "chatgpt"), adapter, events_rx, fast_config());

        let agent_task = async {
            sender_surface.text_changed(String::new()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(events_tx);
        };
        let (run_result, ()) = tokio::join!(agent.run(), agent_task);
        run_result.unwrap();

        assert!(applied.texts().is_empty());

        bed.control.shutdown().await.unwrap();
        bed.coordinator_task.await.unwrap();
    }
}
