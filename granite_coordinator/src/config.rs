//! Coordinator configuration, read once at construction.

use std::time::Duration;

use granite_membership::DEFAULT_PARTICIPANT_CAPACITY;

/// How long a run waits for reply coverage before recording timeouts.
pub const DEFAULT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for the coordination layer.
///
/// Values are fixed for the lifetime of the coordinator and the registry
/// built from them; nothing re-reads configuration mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// The per-request collection deadline, applied independently to the
    /// dispatch and compensation reply windows.
    pub collection_timeout: Duration,

    /// The bound on concurrently-`Set` members in the participant
    /// registry.
    pub participant_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            collection_timeout: DEFAULT_COLLECTION_TIMEOUT,
            participant_capacity: DEFAULT_PARTICIPANT_CAPACITY,
        }
    }
}
