//! The protocol engine driving one DDL request from membership snapshot to
//! logged outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use granite_ddl::{
    DdlOperation, DdlOutcome, DispatchEnvelope, FinalStatus, NodeReply, StatementProcessor,
};
use granite_id::{DdlRequestId, ParticipantId, SequenceNumber};
use granite_membership::ParticipantRegistry;
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    CoordinationError, CoordinationTransport, CoordinatorConfig, OutcomeLog, Result,
};

/// Replies buffered per run between transport delivery and the collection
/// loop.
const REPLY_BUFFER_SIZE: usize = 1024;

/// Just enough of a reply frame to route it to its owning run.
#[derive(Debug, Deserialize)]
struct ReplyKey {
    request_id: DdlRequestId,
}

/// The runs currently in flight, keyed by request id.
///
/// Doubles as the reply-routing table: the sender half of each run's reply
/// channel lives here until the run's guard is dropped.
#[derive(Debug, Default)]
struct ActiveRuns {
    runs: Mutex<HashMap<DdlRequestId, mpsc::Sender<Bytes>>>,
}

impl ActiveRuns {
    /// Register a run for `request_id`, returning `None` when one is
    /// already active.
    fn admit(&self, request_id: DdlRequestId) -> Option<(RunGuard<'_>, mpsc::Receiver<Bytes>)> {
        let mut runs = self.runs.lock();
        if runs.contains_key(&request_id) {
            return None;
        }

        let (tx, rx) = mpsc::channel(REPLY_BUFFER_SIZE);
        runs.insert(request_id, tx);
        Some((
            RunGuard {
                active: self,
                request_id,
            },
            rx,
        ))
    }

    fn route(&self, request_id: DdlRequestId, raw: Bytes) {
        match self.runs.lock().get(&request_id) {
            Some(tx) => {
                if let Err(e) = tx.try_send(raw) {
                    warn!(%request_id, error=%e, "dropping reply for run that cannot accept it");
                }
            }
            None => warn!(%request_id, "reply for unknown or completed run"),
        }
    }
}

/// Releases a run's active-table entry on every exit path.
#[derive(Debug)]
struct RunGuard<'a> {
    active: &'a ActiveRuns,
    request_id: DdlRequestId,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.active.runs.lock().remove(&self.request_id);
    }
}

/// Coordinates all-or-nothing application of DDL statements across the
/// cluster.
///
/// One shared instance serves every inbound request; each call to
/// [`execute_ddl`](Self::execute_ddl) is an isolated run with its own
/// frozen target set, reply channel and deadline.
#[derive(Debug)]
pub struct DdlCoordinator {
    config: CoordinatorConfig,
    registry: Arc<ParticipantRegistry>,
    transport: Arc<dyn CoordinationTransport>,
    outcome_log: Arc<dyn OutcomeLog>,
    active: ActiveRuns,
    next_sequence: AtomicU64,
}

impl DdlCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        registry: Arc<ParticipantRegistry>,
        transport: Arc<dyn CoordinationTransport>,
        outcome_log: Arc<dyn OutcomeLog>,
    ) -> Self {
        Self {
            config,
            registry,
            transport,
            outcome_log,
            active: ActiveRuns::default(),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Hand a raw reply frame from the transport to the run that is
    /// waiting for it.
    ///
    /// Frames that cannot be attributed to an active run - undecodable,
    /// unknown request id, or arriving after the run completed - are
    /// logged and dropped; the unresponsive target will be recorded as
    /// timed out by its run.
    pub fn deliver_reply(&self, raw: Bytes) {
        let key: ReplyKey = match serde_json::from_slice(&raw) {
            Ok(key) => key,
            Err(e) => {
                warn!(error=%e, n_bytes = raw.len(), "undecodable reply frame");
                return;
            }
        };
        self.active.route(key.request_id, raw);
    }

    /// Apply `op` across the cluster, returning once a final outcome is
    /// reached and logged.
    ///
    /// Admission failures ([`Busy`], [`InvalidOperation`] and
    /// [`NoParticipants`]) return an error before any network traffic.
    /// Once dispatch begins the run always reaches a decision: per-node
    /// failures become data in the returned [`DdlOutcome`], never errors.
    ///
    /// [`Busy`]: CoordinationError::Busy
    /// [`InvalidOperation`]: granite_ddl::DdlError::InvalidOperation
    /// [`NoParticipants`]: CoordinationError::NoParticipants
    pub async fn execute_ddl(&self, op: DdlOperation) -> Result<DdlOutcome> {
        let request_id = op.request_id;
        let processor = StatementProcessor::for_statement(&op.statement);

        let (guard, mut rx) = self
            .active
            .admit(request_id)
            .ok_or(CoordinationError::Busy { request_id })?;
        processor.validate(&op)?;

        let targets = self.registry.snapshot();
        if targets.is_empty() {
            return Err(CoordinationError::NoParticipants);
        }

        let sequence_number = self.next_sequence_number();
        let payload = processor.build_dispatch_payload(&op, sequence_number)?;
        let envelope = DispatchEnvelope::new(op, targets, sequence_number);

        debug!(
            %request_id,
            statement = envelope.operation().statement.kind(),
            n_targets = envelope.targets().len(),
            sequence = %sequence_number,
            "dispatching",
        );
        for target in envelope.targets().iter() {
            self.transport.send(*target, payload.clone()).await;
        }

        let mut resolved = self.collect(&mut rx, processor, &envelope).await;

        let final_status = if resolved.values().all(NodeReply::is_ack) {
            debug!(%request_id, "all targets acknowledged, committing");
            FinalStatus::Committed
        } else {
            self.roll_back(&mut rx, processor, &envelope, &resolved).await
        };

        let replies = envelope
            .targets()
            .iter()
            .map(|target| {
                resolved
                    .remove(target)
                    .expect("collection resolves every target")
            })
            .collect();
        let outcome = DdlOutcome::new(request_id, final_status, replies);

        if let Err(e) = self.outcome_log.record(&outcome) {
            error!(%request_id, error=%e, "failed to record ddl outcome");
        }

        drop(guard);
        Ok(outcome)
    }

    fn next_sequence_number(&self) -> SequenceNumber {
        SequenceNumber::new(self.next_sequence.fetch_add(1, Ordering::SeqCst))
    }

    /// Wait until every target of `envelope` has replied or the
    /// collection deadline passes, then record the remainder as timed
    /// out.
    ///
    /// The decision step never runs on a partial reply set: this method
    /// only returns once every target is resolved one way or the other.
    async fn collect(
        &self,
        rx: &mut mpsc::Receiver<Bytes>,
        processor: StatementProcessor,
        envelope: &DispatchEnvelope,
    ) -> HashMap<ParticipantId, NodeReply> {
        let deadline = Instant::now() + self.config.collection_timeout;
        let mut resolved = HashMap::with_capacity(envelope.targets().len());

        self.collect_until(
            rx,
            processor,
            envelope.targets(),
            envelope.sequence_number(),
            deadline,
            &mut resolved,
        )
        .await;

        for target in envelope.targets().iter() {
            resolved
                .entry(*target)
                .or_insert_with(|| NodeReply::timeout(*target));
        }
        resolved
    }

    async fn collect_until(
        &self,
        rx: &mut mpsc::Receiver<Bytes>,
        processor: StatementProcessor,
        targets: &[ParticipantId],
        sequence_number: SequenceNumber,
        deadline: Instant,
        resolved: &mut HashMap<ParticipantId, NodeReply>,
    ) {
        while resolved.len() < targets.len() {
            let raw = match time::timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    debug!(
                        n_resolved = resolved.len(),
                        n_targets = targets.len(),
                        "collection deadline reached",
                    );
                    break;
                }
                // The sender half lives in the active-run table until this
                // run's guard drops.
                Ok(None) => break,
                Ok(Some(raw)) => raw,
            };

            let reply = match processor.interpret_reply(&raw) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(error=%e, "ignoring malformed reply");
                    continue;
                }
            };
            if reply.sequence_number != sequence_number {
                warn!(
                    participant = %reply.reply.participant_id,
                    got = %reply.sequence_number,
                    expected = %sequence_number,
                    "ignoring reply to an earlier fan-out",
                );
                continue;
            }

            let participant_id = reply.reply.participant_id;
            if !targets.contains(&participant_id) {
                warn!(%participant_id, "ignoring reply from non-target");
                continue;
            }
            if resolved.contains_key(&participant_id) {
                warn!(%participant_id, "ignoring duplicate reply");
                continue;
            }

            resolved.insert(participant_id, reply.reply);
        }
    }

    /// Undo the change on exactly the targets that applied it.
    ///
    /// Compensation is dispatched individually, never broadcast, and its
    /// confirmations are collected best-effort under a fresh deadline
    /// without retry.
    async fn roll_back(
        &self,
        rx: &mut mpsc::Receiver<Bytes>,
        processor: StatementProcessor,
        envelope: &DispatchEnvelope,
        resolved: &HashMap<ParticipantId, NodeReply>,
    ) -> FinalStatus {
        let request_id = envelope.operation().request_id;
        let acked: Vec<ParticipantId> = envelope
            .targets()
            .iter()
            .copied()
            .filter(|target| resolved.get(target).is_some_and(NodeReply::is_ack))
            .collect();

        info!(%request_id, n_acked = acked.len(), "rolling back");
        if acked.is_empty() {
            // Nothing was applied anywhere; the rollback is vacuous.
            return FinalStatus::RolledBack;
        }

        let Some(statement) = processor.compensate(envelope.operation()) else {
            warn!(
                %request_id,
                statement = envelope.operation().statement.kind(),
                n_applied = acked.len(),
                "no compensating action exists; cluster state needs operator attention",
            );
            return FinalStatus::PartialFailure;
        };

        let compensation = DdlOperation::with_request_id(
            request_id,
            envelope.operation().session_id,
            statement,
        );
        let comp_processor = StatementProcessor::for_statement(&compensation.statement);
        let sequence_number = self.next_sequence_number();
        let payload = match comp_processor.build_dispatch_payload(&compensation, sequence_number) {
            Ok(payload) => payload,
            Err(e) => {
                error!(%request_id, error=%e, "could not build compensation payload");
                return FinalStatus::PartialFailure;
            }
        };

        debug!(
            %request_id,
            statement = compensation.statement.kind(),
            n_targets = acked.len(),
            sequence = %sequence_number,
            "dispatching compensation",
        );
        for target in &acked {
            self.transport.send(*target, payload.clone()).await;
        }

        let deadline = Instant::now() + self.config.collection_timeout;
        let mut confirmations = HashMap::with_capacity(acked.len());
        self.collect_until(
            rx,
            comp_processor,
            &acked,
            sequence_number,
            deadline,
            &mut confirmations,
        )
        .await;

        let unconfirmed = acked
            .iter()
            .filter(|target| !confirmations.get(*target).is_some_and(NodeReply::is_ack))
            .count();
        if unconfirmed == 0 {
            FinalStatus::RolledBack
        } else {
            warn!(%request_id, unconfirmed, "compensation unconfirmed on some targets");
            FinalStatus::PartialFailure
        }
    }
}
