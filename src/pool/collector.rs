//! Collector actor. Gathers results from whichever worker finishes them and
//! reports freed workers back to the dispatcher.
//!
//! Two sources feed the collector: claim notices from the dispatcher and
//! submissions from any worker. Claims are always preferred when both are
//! ready, so a worker's claim is recorded before its result. Results land in
//! the slot for their job id, so completion order never affects the output.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::availability::{Availability, AvailabilityTable};
use crate::error::{Error, ProtocolError};
use crate::protocol::{
    AvailabilityClaim, AvailabilityFree, CollectorEvent, CollectorLinks, MatchResult, Submission,
    WorkerId,
};

/// Counters reported once the batch has been forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    pub claims_seen: usize,
    pub results_received: usize,
    /// Results received per worker.
    pub per_worker: BTreeMap<WorkerId, usize>,
}

/// Collector for a run of `job_count` jobs.
pub struct Collector {
    claims: mpsc::UnboundedReceiver<AvailabilityClaim>,
    submissions: mpsc::Receiver<Submission>,
    events: mpsc::UnboundedSender<CollectorEvent>,
    ledger: Ledger,
}

/// Everything the collector mutates while messages arrive.
struct Ledger {
    table: AvailabilityTable,
    slots: Vec<Option<MatchResult>>,
    stats: CollectorStats,
}

impl Collector {
    pub fn new(links: CollectorLinks, job_count: usize) -> Self {
        Self {
            claims: links.claims,
            submissions: links.submissions,
            events: links.events,
            ledger: Ledger {
                table: AvailabilityTable::all_idle(links.workers),
                slots: vec![None; job_count],
                stats: CollectorStats::default(),
            },
        }
    }

    /// Receive until every job has a result, then forward the batch in job-id order.
    pub async fn run(self) -> Result<CollectorStats, Error> {
        let Self {
            mut claims,
            mut submissions,
            events,
            mut ledger,
        } = self;
        let job_count = ledger.slots.len();
        info!(jobs = job_count, workers = ledger.table.len(), "Collector started");

        let mut claims_open = true;
        while ledger.stats.results_received < job_count {
            tokio::select! {
                biased;
                claim = claims.recv(), if claims_open => match claim {
                    Some(claim) => ledger.record_claim(claim)?,
                    None => claims_open = false,
                },
                submission = submissions.recv() => {
                    let submission = submission.ok_or_else(|| ProtocolError::ChannelClosed {
                        peer: "workers".to_string(),
                    })?;
                    let worker = ledger.accept_submission(submission, &mut claims)?;
                    events
                        .send(CollectorEvent::Freed(AvailabilityFree { worker }))
                        .map_err(|_| ProtocolError::ChannelClosed {
                            peer: "dispatcher".to_string(),
                        })?;
                }
            }
        }

        let results = ledger
            .slots
            .into_iter()
            .flatten()
            .collect::<Vec<MatchResult>>();
        if results.len() != job_count {
            return Err(ProtocolError::IncompleteBatch {
                expected: job_count,
                got: results.len(),
            }
            .into());
        }

        events
            .send(CollectorEvent::Results { results })
            .map_err(|_| ProtocolError::ChannelClosed {
                peer: "dispatcher".to_string(),
            })?;

        info!(
            results = ledger.stats.results_received,
            claims = ledger.stats.claims_seen,
            "Collector forwarded result batch"
        );
        Ok(ledger.stats)
    }
}

impl Ledger {
    fn record_claim(&mut self, claim: AvailabilityClaim) -> Result<(), ProtocolError> {
        let worker = claim.worker;
        match self.table.mark_busy(worker) {
            Some(Availability::Idle) => {
                self.stats.claims_seen += 1;
                debug!(worker = %worker, "Claim recorded");
                Ok(())
            }
            Some(Availability::Busy) => Err(ProtocolError::AssignBusyWorker { worker }),
            None => Err(ProtocolError::UnexpectedMessage {
                role: "collector".to_string(),
                expected: "claim for a pool worker".to_string(),
                got: format!("claim for unknown {worker}"),
            }),
        }
    }

    /// A submission can be polled before a claim sent ahead of it, so claims
    /// already queued are recorded before a worker counts as unclaimed.
    fn accept_submission(
        &mut self,
        submission: Submission,
        claims: &mut mpsc::UnboundedReceiver<AvailabilityClaim>,
    ) -> Result<WorkerId, ProtocolError> {
        if self.table.get(submission.worker) != Some(Availability::Busy) {
            while let Ok(claim) = claims.try_recv() {
                self.record_claim(claim)?;
            }
        }
        self.record_submission(submission)
    }

    /// Store a result in its slot and free the submitting worker.
    fn record_submission(&mut self, submission: Submission) -> Result<WorkerId, ProtocolError> {
        let Submission { worker, result } = submission;
        if self.table.get(worker) != Some(Availability::Busy) {
            return Err(ProtocolError::UnclaimedWorker { worker });
        }

        let job_id = result.job_id;
        let job_count = self.slots.len();
        let slot = self
            .slots
            .get_mut(job_id)
            .ok_or(ProtocolError::UnknownJob { job_id, job_count })?;
        if slot.is_some() {
            return Err(ProtocolError::DuplicateResult { job_id });
        }
        *slot = Some(result);

        self.table.mark_idle(worker);
        self.stats.results_received += 1;
        *self.stats.per_worker.entry(worker).or_default() += 1;
        debug!(
            worker = %worker,
            job_id,
            received = self.stats.results_received,
            "Result stored"
        );
        Ok(worker)
    }
}
