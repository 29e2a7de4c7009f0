//! Per-node replies and the final outcome record of a coordinator run.

use granite_id::{DdlRequestId, ParticipantId};
use serde::{Deserialize, Serialize};

/// How a target resolved during the collection window.
///
/// `Timeout` is synthesized locally when a target fails to reply before
/// the collection deadline; it never appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ack,
    Nack,
    Timeout,
}

/// One target's resolution for one fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReply {
    pub participant_id: ParticipantId,
    pub status: ReplyStatus,
    pub error_detail: Option<String>,
}

impl NodeReply {
    pub fn ack(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            status: ReplyStatus::Ack,
            error_detail: None,
        }
    }

    pub fn nack(participant_id: ParticipantId, error_detail: impl Into<String>) -> Self {
        Self {
            participant_id,
            status: ReplyStatus::Nack,
            error_detail: Some(error_detail.into()),
        }
    }

    pub fn timeout(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            status: ReplyStatus::Timeout,
            error_detail: None,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.status == ReplyStatus::Ack
    }
}

/// The all-or-nothing decision a run ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// Every target acknowledged; the change is applied cluster-wide.
    Committed,
    /// The change was rolled back and every applied target confirmed its
    /// compensation.
    RolledBack,
    /// The change was rolled back but at least one applied target could not
    /// confirm compensation. Cluster state may be inconsistent and needs
    /// operator attention.
    PartialFailure,
}

/// The record of one completed coordinator run.
///
/// Produced exactly once per run, handed to the outcome log, and returned
/// to the caller; this core does not retain outcomes for later query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlOutcome {
    pub request_id: DdlRequestId,
    pub final_status: FinalStatus,
    pub replies: Vec<NodeReply>,
}

impl DdlOutcome {
    pub fn new(
        request_id: DdlRequestId,
        final_status: FinalStatus,
        replies: Vec<NodeReply>,
    ) -> Self {
        Self {
            request_id,
            final_status,
            replies,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.final_status == FinalStatus::Committed
    }

    /// The reply recorded for `participant_id`, if it was a target.
    pub fn reply_for(&self, participant_id: ParticipantId) -> Option<&NodeReply> {
        self.replies
            .iter()
            .find(|r| r.participant_id == participant_id)
    }
}
