//! Typed identifiers for the granite coordination layer.

use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use uuid::Uuid;

/// Identifies a cluster node registered to receive coordination traffic.
///
/// Participant ids are assigned by the membership layer when a node joins
/// the cluster; this core only carries them around.
#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
pub struct ParticipantId(u32);

impl ParticipantId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ParticipantId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one inbound DDL request, and therefore one coordinator run.
#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
pub struct DdlRequestId(u64);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

impl DdlRequestId {
    /// Allocate the next process-locally-unique request id.
    pub fn new() -> Self {
        Self(
            NEXT_REQUEST_ID
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
                .expect("Overflowed with request IDs"),
        )
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for DdlRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for DdlRequestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for DdlRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The client session a DDL request originated from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The sequence number of a dispatch envelope.
///
/// Sequence numbers order the fan-outs issued by one coordinator process;
/// a rollback's compensation fan-out always carries a later sequence number
/// than the dispatch it undoes.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
