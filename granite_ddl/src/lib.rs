//! The DDL operation model and per-statement processors.
//!
//! A [`DdlOperation`] is the unit the coordinator distributes: a create,
//! alter or drop of a table, tagged with the request and session it
//! originated from. Each statement kind has a [`StatementProcessor`] that
//! knows how to validate the statement, build the payload fanned out to
//! every participant, interpret a node's response, and derive the
//! compensating statement used during rollback.

use thiserror::Error;

pub mod operation;
pub mod outcome;
pub mod processor;
pub mod wire;

pub use operation::{
    AlterOp, AlterSpec, ColumnSpec, ColumnType, DdlOperation, DdlStatement, DispatchEnvelope,
    TableSpec,
};
pub use outcome::{DdlOutcome, FinalStatus, NodeReply, ReplyStatus};
pub use processor::{ReplyEnvelope, StatementProcessor};
pub use wire::{DispatchPayload, WireReply, WireReplyStatus};

#[derive(Debug, Error)]
pub enum DdlError {
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    #[error("could not serialize dispatch payload: {source}")]
    PayloadSerialization { source: serde_json::Error },

    #[error("malformed dispatch payload: {source}")]
    MalformedPayload { source: serde_json::Error },

    #[error("malformed node reply: {source}")]
    MalformedReply { source: serde_json::Error },
}

impl DdlError {
    pub(crate) fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = DdlError> = std::result::Result<T, E>;
