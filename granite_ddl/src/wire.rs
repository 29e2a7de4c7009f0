//! Wire representations of dispatch payloads and node replies.
//!
//! Payloads are JSON-encoded. The transport beneath this layer owns
//! delivery; this module only defines what crosses it.

use bytes::Bytes;
use granite_id::{DdlRequestId, ParticipantId, SequenceNumber};
use serde::{Deserialize, Serialize};

use crate::{DdlError, DdlStatement, NodeReply, Result};

/// The payload fanned out identically to every target of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub request_id: DdlRequestId,
    pub sequence_number: SequenceNumber,
    pub statement: DdlStatement,
}

impl DispatchPayload {
    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|source| DdlError::PayloadSerialization { source })
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|source| DdlError::MalformedPayload { source })
    }
}

/// A node's verdict on one dispatched statement.
///
/// Only `Ack` and `Nack` exist on the wire; a timeout is a local
/// observation of the coordinator, not something a node can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireReplyStatus {
    Ack,
    Nack,
}

/// One node's response to a dispatch, as received from the transport.
///
/// The `sequence_number` echoes the envelope being answered, so the
/// coordinator can tell a straggling reply to the original dispatch from a
/// reply to the compensation fan-out that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireReply {
    pub request_id: DdlRequestId,
    pub participant_id: ParticipantId,
    pub sequence_number: SequenceNumber,
    pub status: WireReplyStatus,
    pub error_detail: Option<String>,
}

impl WireReply {
    pub fn ack(
        request_id: DdlRequestId,
        participant_id: ParticipantId,
        sequence_number: SequenceNumber,
    ) -> Self {
        Self {
            request_id,
            participant_id,
            sequence_number,
            status: WireReplyStatus::Ack,
            error_detail: None,
        }
    }

    pub fn nack(
        request_id: DdlRequestId,
        participant_id: ParticipantId,
        sequence_number: SequenceNumber,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            participant_id,
            sequence_number,
            status: WireReplyStatus::Nack,
            error_detail: Some(error_detail.into()),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|source| DdlError::PayloadSerialization { source })
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|source| DdlError::MalformedReply { source })
    }

    /// Collapse into the per-node reply recorded in the outcome.
    pub fn into_node_reply(self) -> NodeReply {
        match self.status {
            WireReplyStatus::Ack => NodeReply::ack(self.participant_id),
            WireReplyStatus::Nack => NodeReply {
                participant_id: self.participant_id,
                status: crate::ReplyStatus::Nack,
                error_detail: self.error_detail,
            },
        }
    }
}
