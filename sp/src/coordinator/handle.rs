//! Client handles for talking to the Coordinator
//!
//! `CoordinatorHandle` is the sender-only control-plane interface used by
//! the dashboard/CLI side; `PeerHandle` binds one surface to the broker and
//! owns its delivery stream.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::catalog::ServiceCatalog;

use super::messages::{
    CoordError, CoordRequest, CoordResult, CoordinatorMetrics, PeerMessage, RegisterReply, StatusReport,
};
use super::registry::{ContainerId, SubContextId};

/// Control-plane handle (dashboard/CLI side); cheap to clone
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CoordRequest,
        label: &str,
    ) -> CoordResult<T> {
        debug!(%label, "CoordinatorHandle: sending request");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| CoordError::ChannelClosed)?;
        reply_rx.await.map_err(|_| CoordError::ReplyDropped)
    }

    /// Current connection status and sync flag
    pub async fn get_status(&self) -> CoordResult<StatusReport> {
        self.request(|reply| CoordRequest::GetStatus { reply }, "get_status").await
    }

    /// Persist and fan out a new sync flag
    pub async fn set_sync_enabled(&self, enabled: bool) -> CoordResult<bool> {
        self.request(|reply| CoordRequest::SetSyncEnabled { enabled, reply }, "set_sync_enabled")
            .await?
    }

    /// Read the service catalog, merged with built-in defaults
    pub async fn get_services(&self) -> CoordResult<ServiceCatalog> {
        self.request(|reply| CoordRequest::GetServices { reply }, "get_services")
            .await?
    }

    /// Persist the service catalog
    pub async fn save_services(&self, services: ServiceCatalog) -> CoordResult<()> {
        self.request(|reply| CoordRequest::SaveServices { services, reply }, "save_services")
            .await?
    }

    /// Current coordinator metrics
    pub async fn metrics(&self) -> CoordResult<CoordinatorMetrics> {
        self.request(|reply| CoordRequest::GetMetrics { reply }, "metrics").await
    }

    /// Announce that a container was torn down
    pub async fn container_closed(&self, container_id: ContainerId) -> CoordResult<()> {
        self.tx
            .send(CoordRequest::ContainerClosed { container_id })
            .await
            .map_err(|_| CoordError::ChannelClosed)
    }

    /// Request the coordinator to stop
    pub async fn shutdown(&self) -> CoordResult<()> {
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| CoordError::ChannelClosed)
    }
}

/// Per-surface handle: registration plus the delivery stream
///
/// Not cloneable; exactly one task owns a surface's delivery stream. Each
/// (re-)registration creates a fresh delivery channel, so a handle whose
/// broker was torn down can simply register again.
pub struct PeerHandle {
    tx: mpsc::Sender<CoordRequest>,
    peer_buffer: usize,
    container_id: ContainerId,
    sub_context_id: SubContextId,
    service_key: String,
    origin: String,
    rx: Option<mpsc::Receiver<PeerMessage>>,
}

impl PeerHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<CoordRequest>,
        peer_buffer: usize,
        container_id: ContainerId,
        sub_context_id: SubContextId,
        service_key: String,
        origin: String,
    ) -> Self {
        Self {
            tx,
            peer_buffer,
            container_id,
            sub_context_id,
            service_key,
            origin,
            rx: None,
        }
    }

    pub fn container_id(&self) -> ContainerId {
        self.container_id
    }

    pub fn sub_context_id(&self) -> SubContextId {
        self.sub_context_id
    }

    pub fn service_key(&self) -> &str {
        &self.service_key
    }

    /// Register (or re-register) this surface with the coordinator
    ///
    /// Replaces the delivery stream with a fresh channel; the reply carries
    /// the admission decision and the current sync flag.
    pub async fn register(&mut self) -> CoordResult<RegisterReply> {
        debug!(
            container_id = self.container_id,
            sub_context_id = self.sub_context_id,
            service_key = %self.service_key,
            "PeerHandle: registering"
        );
        let (peer_tx, peer_rx) = mpsc::channel(self.peer_buffer);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(CoordRequest::Register {
                container_id: self.container_id,
                sub_context_id: self.sub_context_id,
                service_key: self.service_key.clone(),
                origin: self.origin.clone(),
                tx: peer_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoordError::ChannelClosed)?;

        let reply = reply_rx.await.map_err(|_| CoordError::ReplyDropped)?;
        self.rx = Some(peer_rx);
        Ok(reply)
    }

    /// Send a debounced local edit upstream (fire-and-forget)
    pub async fn text_changed(&self, text: String) -> CoordResult<()> {
        self.tx
            .send(CoordRequest::TextChanged {
                container_id: self.container_id,
                sub_context_id: self.sub_context_id,
                text,
            })
            .await
            .map_err(|_| CoordError::ChannelClosed)
    }

    /// Send a local submit intent upstream (fire-and-forget)
    pub async fn submit_triggered(&self) -> CoordResult<()> {
        self.tx
            .send(CoordRequest::SubmitTriggered {
                container_id: self.container_id,
                sub_context_id: self.sub_context_id,
            })
            .await
            .map_err(|_| CoordError::ChannelClosed)
    }

    /// Remove this surface from the registry
    pub async fn unregister(&self) -> CoordResult<()> {
        self.tx
            .send(CoordRequest::Unregister {
                container_id: self.container_id,
                sub_context_id: self.sub_context_id,
            })
            .await
            .map_err(|_| CoordError::ChannelClosed)
    }

    /// Receive the next message from the coordinator
    ///
    /// Returns `None` when unregistered or when the broker dropped the
    /// delivery channel (teardown) - the caller should re-register.
    pub async fn recv(&mut self) -> Option<PeerMessage> {
        match &mut self.rx {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Receive without blocking
    pub fn try_recv(&mut self) -> Option<PeerMessage> {
        self.rx.as_mut()?.try_recv().ok()
    }
}
