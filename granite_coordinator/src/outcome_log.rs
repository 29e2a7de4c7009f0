//! The append-only sink completed runs are recorded to.

use granite_ddl::DdlOutcome;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

/// An error indicating the log sink could not accept a record.
///
/// Surfaced to operational monitoring by the coordinator; it never blocks
/// the caller from receiving the outcome.
#[derive(Debug, Error)]
#[error("outcome log rejected the record: {reason}")]
pub struct OutcomeLogError {
    pub reason: String,
}

impl OutcomeLogError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An append-only record of coordinator outcomes.
///
/// Implementations must be safe under concurrent writers; every completed
/// run records exactly one outcome.
pub trait OutcomeLog: std::fmt::Debug + Send + Sync {
    fn record(&self, outcome: &DdlOutcome) -> Result<(), OutcomeLogError>;
}

/// An [`OutcomeLog`] that emits each outcome as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutcomeLog;

impl OutcomeLog for TracingOutcomeLog {
    fn record(&self, outcome: &DdlOutcome) -> Result<(), OutcomeLogError> {
        info!(
            request_id = %outcome.request_id,
            final_status = ?outcome.final_status,
            n_replies = outcome.replies.len(),
            "ddl outcome",
        );
        Ok(())
    }
}

/// An [`OutcomeLog`] retaining records in memory, for tests and embedded
/// use.
#[derive(Debug, Default)]
pub struct MemoryOutcomeLog {
    outcomes: Mutex<Vec<DdlOutcome>>,
}

impl MemoryOutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every outcome recorded so far, in record order.
    pub fn outcomes(&self) -> Vec<DdlOutcome> {
        self.outcomes.lock().clone()
    }
}

impl OutcomeLog for MemoryOutcomeLog {
    fn record(&self, outcome: &DdlOutcome) -> Result<(), OutcomeLogError> {
        self.outcomes.lock().push(outcome.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use granite_ddl::FinalStatus;
    use granite_id::DdlRequestId;

    #[test]
    fn test_memory_log_retains_record_order() {
        let log = MemoryOutcomeLog::new();
        for id in [3_u64, 1, 2] {
            log.record(&DdlOutcome::new(
                DdlRequestId::from(id),
                FinalStatus::Committed,
                vec![],
            ))
            .unwrap();
        }

        let ids: Vec<u64> = log
            .outcomes()
            .iter()
            .map(|o| o.request_id.as_u64())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
