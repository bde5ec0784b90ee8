//! Main Coordinator task implementation

use syncstore::Store;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::catalog;

use super::broadcast::fan_out;
use super::config::CoordinatorConfig;
use super::handle::{CoordinatorHandle, PeerHandle};
use super::identity::IdentityManager;
use super::messages::{
    ConnectionInfo, CoordError, CoordRequest, CoordinatorMetrics, DashboardEvent, PeerMessage, RegisterReply,
    StatusReport,
};
use super::registry::{ContainerId, FrameHandle, Registry, SubContextId};

/// Store key for the persisted sync flag
pub const KEY_SYNC_ENABLED: &str = "syncEnabled";

/// Sync participation defaults to on for first runs
const DEFAULT_SYNC_ENABLED: bool = true;

/// The Coordinator relays edit/submit events between registered surfaces
///
/// It owns the registry, the dashboard identity, and the sync flag; nothing
/// else mutates them. The task is ephemeral: after an idle period all
/// in-memory state is dropped and lazily rebuilt from the store.
pub struct Coordinator {
    config: CoordinatorConfig,
    store: Store,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    dashboard_tx: broadcast::Sender<DashboardEvent>,
}

impl Coordinator {
    /// Create a new Coordinator over the given persistent store
    pub fn new(config: CoordinatorConfig, store: Store) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        let (dashboard_tx, _) = broadcast::channel(64);
        Self {
            config,
            store,
            tx,
            rx,
            dashboard_tx,
        }
    }

    /// Get a sender for constructing handles
    pub fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    /// Subscribe to best-effort dashboard pushes
    pub fn subscribe_dashboard(&self) -> broadcast::Receiver<DashboardEvent> {
        self.dashboard_tx.subscribe()
    }

    /// Create a handle bound to one surface
    pub fn peer_handle(
        &self,
        container_id: ContainerId,
        sub_context_id: SubContextId,
        service_key: impl Into<String>,
        origin: impl Into<String>,
    ) -> PeerHandle {
        PeerHandle::new(
            self.tx.clone(),
            self.config.peer_channel_buffer,
            container_id,
            sub_context_id,
            service_key.into(),
            origin.into(),
        )
    }

    /// Create a sender-only handle for control callers (dashboard/CLI)
    pub fn control_handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Run the Coordinator task
    ///
    /// Consumes the Coordinator and runs until shutdown is requested. On
    /// idle expiry the in-memory state is dropped (the broker behaves as if
    /// freshly respawned); persisted facts reload lazily on the next
    /// message and surfaces re-register when their delivery channel closes.
    pub async fn run(mut self) {
        let coord_tx = self.tx.clone();
        let idle_timeout = self.config.idle_timeout();

        let mut registry = Registry::new();
        let mut identity = IdentityManager::new(&self.config.home_prefix);
        let mut sync_cache: Option<bool> = None;
        let mut refresh_generation: u64 = 0;
        let mut metrics = CoordinatorMetrics::default();

        info!("Coordinator started");

        loop {
            let req = match tokio::time::timeout(idle_timeout, self.rx.recv()).await {
                Ok(Some(req)) => req,
                Ok(None) => break,
                Err(_) => {
                    if !registry.is_empty() {
                        debug!(dropped = registry.len(), "Idle timeout, dropping in-memory state");
                    }
                    registry.clear();
                    identity.forget_cache();
                    sync_cache = None;
                    refresh_generation += 1;
                    metrics.registered_surfaces = 0;
                    continue;
                }
            };
            metrics.messages_received += 1;

            match req {
                CoordRequest::Register {
                    container_id,
                    sub_context_id,
                    service_key,
                    origin,
                    tx,
                    reply,
                } => {
                    let sync_enabled = read_sync(&self.store, &mut sync_cache);

                    let service_enabled = match catalog::load(&self.store) {
                        Ok(services) => services.is_enabled(&service_key),
                        Err(e) => {
                            warn!(error = %e, "Failed to load service catalog during registration");
                            false
                        }
                    };

                    let admitted = if !service_enabled {
                        debug!(%service_key, "Registration rejected: service not enabled");
                        false
                    } else {
                        match identity.evaluate(&self.store, container_id, &origin) {
                            Ok(admission) => admission.is_admitted(),
                            Err(e) => {
                                warn!(error = %e, container_id, "Identity check failed, rejecting registration");
                                false
                            }
                        }
                    };

                    if admitted {
                        registry.register(
                            FrameHandle {
                                container_id,
                                sub_context_id,
                                service_key,
                            },
                            tx,
                        );
                        metrics.registered_surfaces = registry.len();
                        notify_dashboard(&self.dashboard_tx, &registry, sync_enabled);
                    } else {
                        metrics.registrations_rejected += 1;
                    }

                    let _ = reply.send(RegisterReply { admitted, sync_enabled });
                }

                CoordRequest::Unregister {
                    container_id,
                    sub_context_id,
                } => {
                    if registry.unregister(container_id, sub_context_id) {
                        metrics.registered_surfaces = registry.len();
                        let sync_enabled = read_sync(&self.store, &mut sync_cache);
                        notify_dashboard(&self.dashboard_tx, &registry, sync_enabled);
                    }
                }

                CoordRequest::ContainerClosed { container_id } => {
                    let removed = registry.unregister_container(container_id);

                    match identity.current(&self.store) {
                        Ok(Some(id)) if id == container_id => {
                            info!(container_id, "Dashboard container closed");
                            if let Err(e) = identity.clear(&self.store) {
                                warn!(error = %e, "Failed to clear dashboard identity");
                            }
                            // Abandon any pending idle refresh
                            refresh_generation += 1;
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Failed to read dashboard identity"),
                    }

                    if removed > 0 {
                        metrics.registered_surfaces = registry.len();
                        let sync_enabled = read_sync(&self.store, &mut sync_cache);
                        notify_dashboard(&self.dashboard_tx, &registry, sync_enabled);
                    }
                }

                CoordRequest::TextChanged {
                    container_id,
                    sub_context_id,
                    text,
                } => {
                    if !read_sync(&self.store, &mut sync_cache) {
                        metrics.broadcasts_suppressed += 1;
                        continue;
                    }
                    if registry.get(container_id, sub_context_id).is_none() {
                        debug!(container_id, sub_context_id, "Text event from unregistered surface, ignored");
                        continue;
                    }

                    let outcome = fan_out(
                        &registry,
                        Some((container_id, sub_context_id)),
                        &PeerMessage::SyncText { text },
                    )
                    .await;
                    apply_fan_out(
                        outcome,
                        &mut registry,
                        &mut metrics,
                        &self.dashboard_tx,
                        &self.store,
                        &mut sync_cache,
                    );
                }

                CoordRequest::SubmitTriggered {
                    container_id,
                    sub_context_id,
                } => {
                    if !read_sync(&self.store, &mut sync_cache) {
                        metrics.broadcasts_suppressed += 1;
                        continue;
                    }
                    if registry.get(container_id, sub_context_id).is_none() {
                        debug!(container_id, sub_context_id, "Submit event from unregistered surface, ignored");
                        continue;
                    }

                    let outcome = fan_out(&registry, Some((container_id, sub_context_id)), &PeerMessage::DoSubmit).await;
                    apply_fan_out(
                        outcome,
                        &mut registry,
                        &mut metrics,
                        &self.dashboard_tx,
                        &self.store,
                        &mut sync_cache,
                    );

                    // Single-shot cancel-and-replace: only the most recent
                    // submit's timer survives to fire
                    refresh_generation += 1;
                    let generation = refresh_generation;
                    let delay = self.config.idle_refresh();
                    let timer_tx = coord_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = timer_tx.send(CoordRequest::IdleRefresh { generation }).await;
                    });
                }

                CoordRequest::IdleRefresh { generation } => {
                    if generation == refresh_generation {
                        debug!("Idle refresh fired");
                        let sync_enabled = read_sync(&self.store, &mut sync_cache);
                        notify_dashboard(&self.dashboard_tx, &registry, sync_enabled);
                    }
                }

                CoordRequest::GetStatus { reply } => {
                    let sync_enabled = read_sync(&self.store, &mut sync_cache);
                    let _ = reply.send(build_status(&registry, sync_enabled));
                }

                CoordRequest::SetSyncEnabled { enabled, reply } => match self.store.set(KEY_SYNC_ENABLED, &enabled) {
                    Ok(()) => {
                        sync_cache = Some(enabled);
                        info!(enabled, "Sync state changed");

                        let outcome = fan_out(&registry, None, &PeerMessage::SyncStateChanged { enabled }).await;
                        apply_fan_out(
                            outcome,
                            &mut registry,
                            &mut metrics,
                            &self.dashboard_tx,
                            &self.store,
                            &mut sync_cache,
                        );

                        let _ = self.dashboard_tx.send(DashboardEvent::SyncStateChanged { enabled });
                        notify_dashboard(&self.dashboard_tx, &registry, enabled);
                        let _ = reply.send(Ok(enabled));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to persist sync flag");
                        let _ = reply.send(Err(CoordError::Store(e.to_string())));
                    }
                },

                CoordRequest::GetServices { reply } => {
                    let result = catalog::load(&self.store).map_err(|e| CoordError::Store(e.to_string()));
                    let _ = reply.send(result);
                }

                CoordRequest::SaveServices { services, reply } => {
                    let result = catalog::save(&self.store, &services).map_err(|e| CoordError::Store(e.to_string()));
                    let _ = reply.send(result);
                }

                CoordRequest::GetMetrics { reply } => {
                    let _ = reply.send(metrics.clone());
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        info!("Coordinator stopped");
    }
}

/// Read the sync flag through the cache, defaulting to enabled.
/// Store errors are not cached so a later read can recover.
fn read_sync(store: &Store, cache: &mut Option<bool>) -> bool {
    if let Some(v) = *cache {
        return v;
    }
    match store.get::<bool>(KEY_SYNC_ENABLED) {
        Ok(Some(v)) => {
            *cache = Some(v);
            v
        }
        Ok(None) => {
            *cache = Some(DEFAULT_SYNC_ENABLED);
            DEFAULT_SYNC_ENABLED
        }
        Err(e) => {
            warn!(error = %e, "Failed to read sync flag, assuming enabled");
            DEFAULT_SYNC_ENABLED
        }
    }
}

/// Record a fan-out in the metrics and unregister any stale handles
fn apply_fan_out(
    outcome: super::broadcast::FanOut,
    registry: &mut Registry,
    metrics: &mut CoordinatorMetrics,
    dashboard_tx: &broadcast::Sender<DashboardEvent>,
    store: &Store,
    sync_cache: &mut Option<bool>,
) {
    metrics.deliveries += outcome.delivered;
    metrics.delivery_failures += outcome.stale.len() as u64;

    if outcome.stale.is_empty() {
        return;
    }
    for handle in &outcome.stale {
        registry.unregister(handle.container_id, handle.sub_context_id);
    }
    metrics.registered_surfaces = registry.len();
    let sync_enabled = read_sync(store, sync_cache);
    notify_dashboard(dashboard_tx, registry, sync_enabled);
}

fn build_status(registry: &Registry, sync_enabled: bool) -> StatusReport {
    let mut report = StatusReport {
        status: Default::default(),
        sync_enabled,
    };
    for (service_key, handle) in registry.snapshot() {
        report.status.insert(
            service_key,
            ConnectionInfo {
                container_id: handle.container_id,
                sub_context_id: handle.sub_context_id,
                connected: true,
            },
        );
    }
    report
}

/// Best-effort connection-status push; no subscribers is fine
fn notify_dashboard(dashboard_tx: &broadcast::Sender<DashboardEvent>, registry: &Registry, sync_enabled: bool) {
    let _ = dashboard_tx.send(DashboardEvent::ConnectionStatus(build_status(registry, sync_enabled)));
}
