//! The DDL coordination protocol engine.
//!
//! A [`DdlCoordinator`] owns one request's lifecycle: it freezes a
//! membership snapshot, fans the statement out through the transport,
//! collects one reply per target under a bounded deadline, decides
//! all-or-nothing, and on rollback dispatches compensating statements to
//! exactly the targets that already applied the change.
//!
//! # Collaborators
//!
//! The coordinator is deliberately thin at its edges. Delivery reliability
//! belongs to the [`CoordinationTransport`] implementation; durable audit
//! of outcomes belongs to the [`OutcomeLog`]. Membership ground truth is
//! the shared [`ParticipantRegistry`].
//!
//! [`ParticipantRegistry`]: granite_membership::ParticipantRegistry

use granite_ddl::DdlError;
use granite_id::DdlRequestId;
use thiserror::Error;

mod config;
mod coordinator;
mod outcome_log;
mod transport;

pub use config::{CoordinatorConfig, DEFAULT_COLLECTION_TIMEOUT};
pub use coordinator::DdlCoordinator;
pub use outcome_log::{MemoryOutcomeLog, OutcomeLog, OutcomeLogError, TracingOutcomeLog};
pub use transport::{CoordinationTransport, NopTransport};

#[derive(Debug, Error)]
pub enum CoordinationError {
    /// A run for this request id is already in flight.
    #[error("a coordinator run for request {request_id} is already active")]
    Busy { request_id: DdlRequestId },

    /// The membership snapshot was empty at dispatch time. A zero-target
    /// dispatch is an error, not a vacuous success.
    #[error("no participants are registered to receive dispatches")]
    NoParticipants,

    /// The operation failed structural validation, or its payload could
    /// not be built. No dispatch occurred.
    #[error(transparent)]
    Ddl(#[from] DdlError),
}

pub type Result<T, E = CoordinationError> = std::result::Result<T, E>;
