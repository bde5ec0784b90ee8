//! Broadcast engine - fan-out of events to registered surfaces

use futures::future::join_all;
use tracing::debug;

use super::messages::PeerMessage;
use super::registry::{ContainerId, FrameHandle, Registry, SubContextId};

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Target surface no longer reachable; the handle is stale
    Unreachable,
}

/// Outcome of a fan-out
#[derive(Debug, Default)]
pub struct FanOut {
    /// Successful deliveries
    pub delivered: u64,
    /// Handles whose delivery failed; the caller unregisters them
    pub stale: Vec<FrameHandle>,
}

/// Deliver `message` to every registered surface except the excluded origin.
///
/// Deliveries are attempted concurrently; a failure on one target never
/// aborts the others and is never surfaced to the origin. Stale handles are
/// returned for the caller to unregister - no retries, no backoff. A stale
/// surface is expected to re-register itself proactively.
pub async fn fan_out(
    registry: &Registry,
    exclude: Option<(ContainerId, SubContextId)>,
    message: &PeerMessage,
) -> FanOut {
    let attempts = registry
        .iter()
        .filter(|entry| {
            exclude.is_none_or(|(container_id, sub_context_id)| {
                !(entry.handle.container_id == container_id && entry.handle.sub_context_id == sub_context_id)
            })
        })
        .map(|entry| async move {
            match entry.tx.send(message.clone()).await {
                Ok(()) => (entry.handle.clone(), Delivery::Delivered),
                Err(_) => (entry.handle.clone(), Delivery::Unreachable),
            }
        });

    let mut outcome = FanOut::default();
    for (handle, delivery) in join_all(attempts).await {
        match delivery {
            Delivery::Delivered => outcome.delivered += 1,
            Delivery::Unreachable => {
                debug!(
                    container_id = handle.container_id,
                    sub_context_id = handle.sub_context_id,
                    service_key = %handle.service_key,
                    "Delivery failed, handle is stale"
                );
                outcome.stale.push(handle);
            }
        }
    }
    outcome
}
