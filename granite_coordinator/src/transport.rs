//! The transport seam the coordinator fans out through.

use async_trait::async_trait;
use bytes::Bytes;
use granite_id::ParticipantId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A delegate abstraction through which the coordinator sends one payload
/// to one participant.
///
/// Implementations own delivery reliability - retransmission, ordering and
/// multicast group maintenance. The coordinator issues each payload
/// exactly once per target per run and never retries a send itself.
#[async_trait]
pub trait CoordinationTransport: std::fmt::Debug + Send + Sync {
    /// Hand `payload` to the transport for delivery to `target`.
    ///
    /// Fire-and-forget: a send failure is the transport's to surface (the
    /// unresponsive target will simply be recorded as timed out), so this
    /// call returns nothing.
    async fn send(&self, target: ParticipantId, payload: Bytes);
}

#[async_trait]
impl CoordinationTransport for mpsc::Sender<(ParticipantId, Bytes)> {
    async fn send(&self, target: ParticipantId, payload: Bytes) {
        if let Err(e) = mpsc::Sender::send(self, (target, payload)).await {
            warn!(error=%e, %target, "error handing payload to transport channel");
        }
    }
}

/// A no-op [`CoordinationTransport`].
///
/// Every target of a dispatch through this transport times out.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopTransport;

#[async_trait]
impl CoordinationTransport for NopTransport {
    async fn send(&self, target: ParticipantId, payload: Bytes) {
        debug!(%target, n_bytes = payload.len(), "dropping payload on no-op transport");
    }
}
