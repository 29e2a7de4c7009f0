//! The cluster membership registry consulted by the DDL coordinator.
//!
//! The registry is a bounded table of multicast participants - the set of
//! cluster nodes that must see a coordinated DDL change. Membership
//! mutations (join/leave) are serialized through a single write lock, while
//! [`snapshot`] may be called concurrently by any number of in-flight
//! coordinator runs. A snapshot is a value: it reflects every mutation that
//! completed before it was taken and is immune to every mutation after.
//!
//! [`snapshot`]: ParticipantRegistry::snapshot

use std::sync::Arc;

use chrono::{DateTime, Utc};
use granite_id::ParticipantId;
use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The default bound on concurrently-`Set` participants.
pub const DEFAULT_PARTICIPANT_CAPACITY: usize = 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MembershipError {
    #[error("participant table is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
}

pub type Result<T, E = MembershipError> = std::result::Result<T, E>;

/// Whether a participant's slot is occupied.
///
/// A slot flips to [`NotSet`](ParticipantState::NotSet) when the node
/// leaves; the slot itself is retained so a rejoining node keeps a stable
/// position in the fan-out order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Set,
    NotSet,
}

/// One row of the participant table, owned exclusively by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub id: ParticipantId,
    pub joined_at: DateTime<Utc>,
    pub state: ParticipantState,
}

/// A membership change notification from the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    Joined(ParticipantId),
    Left(ParticipantId),
}

#[derive(Debug)]
struct Inner {
    /// Participant records in join order.
    records: IndexMap<ParticipantId, ParticipantRecord>,
    /// The number of records currently in the `Set` state.
    ///
    /// Tracked separately so the capacity check on `join` does not scan the
    /// table.
    n_set: usize,
    capacity: usize,
}

/// The set of cluster members eligible to receive coordination traffic.
///
/// A single shared instance is consulted by every coordinator run; wrap it
/// in an [`Arc`] to share.
#[derive(Debug)]
pub struct ParticipantRegistry {
    inner: RwLock<Inner>,
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PARTICIPANT_CAPACITY)
    }
}

impl ParticipantRegistry {
    /// Initialise a registry bounded at `capacity` concurrently-`Set`
    /// participants.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: IndexMap::new(),
                n_set: 0,
                capacity,
            }),
        }
    }

    /// Mark `id` as a `Set` participant, adding a record for it if it has
    /// never been seen before.
    ///
    /// Joining is idempotent: a participant that is already `Set` is left
    /// untouched. Fails with [`MembershipError::CapacityExceeded`] when
    /// admitting `id` would push the number of `Set` participants past the
    /// configured capacity; existing membership is unaffected by the
    /// failure.
    pub fn join(&self, id: ParticipantId) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(record) = inner.records.get(&id) {
            if record.state == ParticipantState::Set {
                debug!(%id, "participant already joined");
                return Ok(());
            }
        }

        if inner.n_set >= inner.capacity {
            let capacity = inner.capacity;
            warn!(%id, capacity, "participant table is full, rejecting join");
            return Err(MembershipError::CapacityExceeded { capacity });
        }

        let joined_at = Utc::now();
        match inner.records.entry(id) {
            Entry::Occupied(entry) => {
                // A rejoin reoccupies the participant's original slot.
                let record = entry.into_mut();
                record.state = ParticipantState::Set;
                record.joined_at = joined_at;
                info!(%id, "participant rejoined");
            }
            Entry::Vacant(entry) => {
                entry.insert(ParticipantRecord {
                    id,
                    joined_at,
                    state: ParticipantState::Set,
                });
                info!(%id, "participant joined");
            }
        }
        inner.n_set += 1;

        Ok(())
    }

    /// Mark `id` as `NotSet`, excluding it from future snapshots.
    ///
    /// Idempotent: leaving twice, or leaving without ever joining, is a
    /// no-op. Runs already holding a snapshot containing `id` are
    /// unaffected - their target set was frozen at dispatch time.
    pub fn leave(&self, id: ParticipantId) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        match inner.records.get_mut(&id) {
            Some(record) if record.state == ParticipantState::Set => {
                record.state = ParticipantState::NotSet;
                inner.n_set -= 1;
                info!(%id, "participant left");
            }
            _ => debug!(%id, "leave for unknown or already-left participant"),
        }
    }

    /// Apply a membership change notification from the transport layer.
    pub fn apply(&self, event: MembershipEvent) -> Result<()> {
        match event {
            MembershipEvent::Joined(id) => self.join(id),
            MembershipEvent::Left(id) => {
                self.leave(id);
                Ok(())
            }
        }
    }

    /// Return the `Set` participants in join order.
    ///
    /// The returned set is a value: later joins and leaves do not affect
    /// it. Many coordinator runs may snapshot concurrently.
    pub fn snapshot(&self) -> Arc<[ParticipantId]> {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| r.state == ParticipantState::Set)
            .map(|r| r.id)
            .collect()
    }

    /// The number of `Set` participants.
    pub fn len(&self) -> usize {
        self.inner.read().n_set
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `id` is currently a `Set` participant.
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.inner
            .read()
            .records
            .get(&id)
            .is_some_and(|r| r.state == ParticipantState::Set)
    }
}
