//! Dispatcher actor.
//!
//! Owns the job queue and the authoritative availability view. A job only
//! goes to a worker this table believes idle, and an entry only returns to
//! idle when the collector reports the worker's result. Every claim is
//! announced to the collector before the assignment leaves, so the
//! collector always knows a worker is busy before that worker can submit.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use crate::availability::{Availability, AvailabilityTable};
use crate::error::{ConfigError, Error, ProtocolError};
use crate::protocol::{
    AvailabilityClaim, AvailabilityFree, CollectorEvent, DispatcherLinks, Job, MatchResult,
    WorkerCommand, WorkerId,
};

pub struct Dispatcher {
    workers: BTreeMap<WorkerId, mpsc::Sender<WorkerCommand>>,
    claims: mpsc::UnboundedSender<AvailabilityClaim>,
    events: mpsc::UnboundedReceiver<CollectorEvent>,
    table: AvailabilityTable,
}

impl Dispatcher {
    pub fn new(links: DispatcherLinks) -> Self {
        let table = AvailabilityTable::all_idle(links.workers.keys().copied());
        Self {
            workers: links.workers,
            claims: links.claims,
            events: links.events,
            table,
        }
    }

    /// Assign every job, terminate the pool and return the collector's batch.
    ///
    /// The returned results are indexed by job id.
    pub async fn run(mut self, jobs: Vec<Job>) -> Result<Vec<MatchResult>, Error> {
        let job_count = jobs.len();
        info!(jobs = job_count, workers = self.table.len(), "Dispatch started");

        for job in jobs {
            let worker = self.next_idle_worker().await?;
            self.assign(worker, job).await?;
        }

        for (worker, inbox) in &self.workers {
            inbox
                .send(WorkerCommand::Terminate)
                .await
                .map_err(|_| ProtocolError::ChannelClosed {
                    peer: worker.to_string(),
                })?;
        }
        debug!(workers = self.workers.len(), "Termination sent to all workers");

        while !self.table.is_all_idle() {
            match self.recv_event().await? {
                CollectorEvent::Freed(free) => self.apply_free(free)?,
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        role: "dispatcher".to_string(),
                        expected: "worker freed".to_string(),
                        got: format!(
                            "{} with {} workers still busy",
                            other.kind(),
                            self.table.busy_count()
                        ),
                    }
                    .into());
                }
            }
        }

        let results = match self.recv_event().await? {
            CollectorEvent::Results { results } => results,
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    role: "dispatcher".to_string(),
                    expected: "results".to_string(),
                    got: other.kind().to_string(),
                }
                .into());
            }
        };
        check_batch(&results, job_count)?;

        info!(results = results.len(), "Dispatch complete");
        Ok(results)
    }

    /// Lowest-id idle worker, waiting for a free notice when none is idle.
    async fn next_idle_worker(&mut self) -> Result<WorkerId, Error> {
        if self.table.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "participants".to_string(),
                message: "no workers available to assign jobs to".to_string(),
            }
            .into());
        }

        loop {
            self.drain_frees()?;
            if let Some(worker) = self.table.first_idle() {
                return Ok(worker);
            }
            match self.recv_event().await? {
                CollectorEvent::Freed(free) => self.apply_free(free)?,
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        role: "dispatcher".to_string(),
                        expected: "worker freed".to_string(),
                        got: format!("{} before all jobs were assigned", other.kind()),
                    }
                    .into());
                }
            }
        }
    }

    /// Apply every free notice already queued without waiting for more.
    fn drain_frees(&mut self) -> Result<(), Error> {
        loop {
            match self.events.try_recv() {
                Ok(CollectorEvent::Freed(free)) => self.apply_free(free)?,
                Ok(other) => {
                    return Err(ProtocolError::UnexpectedMessage {
                        role: "dispatcher".to_string(),
                        expected: "worker freed".to_string(),
                        got: format!("{} before all jobs were assigned", other.kind()),
                    }
                    .into());
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return Err(ProtocolError::ChannelClosed {
                        peer: "collector".to_string(),
                    }
                    .into());
                }
            }
        }
    }

    async fn recv_event(&mut self) -> Result<CollectorEvent, ProtocolError> {
        self.events
            .recv()
            .await
            .ok_or_else(|| ProtocolError::ChannelClosed {
                peer: "collector".to_string(),
            })
    }

    fn apply_free(&mut self, free: AvailabilityFree) -> Result<(), ProtocolError> {
        let worker = free.worker;
        match self.table.mark_idle(worker) {
            Some(Availability::Busy) => {
                debug!(worker = %worker, "Worker freed");
                Ok(())
            }
            Some(Availability::Idle) => Err(ProtocolError::UnexpectedMessage {
                role: "dispatcher".to_string(),
                expected: "free for a busy worker".to_string(),
                got: format!("free for idle {worker}"),
            }),
            None => Err(ProtocolError::UnexpectedMessage {
                role: "dispatcher".to_string(),
                expected: "free for a pool worker".to_string(),
                got: format!("free for unknown {worker}"),
            }),
        }
    }

    async fn assign(&mut self, worker: WorkerId, job: Job) -> Result<(), Error> {
        if self.table.get(worker) != Some(Availability::Idle) {
            return Err(ProtocolError::AssignBusyWorker { worker }.into());
        }
        let inbox = self
            .workers
            .get(&worker)
            .ok_or_else(|| ProtocolError::ChannelClosed {
                peer: worker.to_string(),
            })?;

        self.table.mark_busy(worker);
        self.claims
            .send(AvailabilityClaim { worker })
            .map_err(|_| ProtocolError::ChannelClosed {
                peer: "collector".to_string(),
            })?;

        let job_id = job.id;
        inbox
            .send(WorkerCommand::Assign(job.into()))
            .await
            .map_err(|_| ProtocolError::ChannelClosed {
                peer: worker.to_string(),
            })?;
        debug!(worker = %worker, job_id, busy = self.table.busy_count(), "Job assigned");
        Ok(())
    }
}

/// The batch must hold one result per job, ordered by job id.
fn check_batch(results: &[MatchResult], job_count: usize) -> Result<(), ProtocolError> {
    if results.len() != job_count {
        return Err(ProtocolError::IncompleteBatch {
            expected: job_count,
            got: results.len(),
        });
    }
    if let Some((index, result)) = results
        .iter()
        .enumerate()
        .find(|(index, result)| result.job_id != *index)
    {
        return Err(ProtocolError::UnexpectedMessage {
            role: "dispatcher".to_string(),
            expected: format!("result for job {index}"),
            got: format!("result for job {}", result.job_id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::protocol::{Mesh, WorkAssignment};

    fn jobs(texts: &[&str]) -> Vec<Job> {
        texts
            .iter()
            .enumerate()
            .map(|(id, text)| Job::new(id, text.as_bytes(), vec!["a".to_string()]))
            .collect()
    }

    fn empty_result(job_id: usize) -> MatchResult {
        MatchResult {
            job_id,
            matches: vec![],
        }
    }

    fn freed(worker: u32) -> CollectorEvent {
        CollectorEvent::Freed(AvailabilityFree {
            worker: WorkerId(worker),
        })
    }

    fn assigned_job(command: Option<WorkerCommand>) -> usize {
        match command {
            Some(WorkerCommand::Assign(WorkAssignment { job_id, .. })) => job_id,
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_jobs_still_terminates_every_worker() {
        let Mesh {
            dispatcher,
            collector,
            mut workers,
        } = Mesh::new(3, 3);
        collector
            .events
            .send(CollectorEvent::Results { results: vec![] })
            .unwrap();

        let results = Dispatcher::new(dispatcher).run(vec![]).await.unwrap();
        assert!(results.is_empty());
        for links in &mut workers {
            assert_eq!(links.inbox.recv().await, Some(WorkerCommand::Terminate));
        }
    }

    #[tokio::test]
    async fn assigns_lowest_idle_worker_one_job_at_a_time() {
        let Mesh {
            dispatcher,
            mut collector,
            mut workers,
        } = Mesh::new(2, 2);
        let handle = tokio::spawn(Dispatcher::new(dispatcher).run(jobs(&["a", "b", "c"])));

        assert_eq!(assigned_job(workers[0].inbox.recv().await), 0);
        assert_eq!(collector.claims.try_recv().unwrap().worker, WorkerId(0));
        assert_eq!(assigned_job(workers[1].inbox.recv().await), 1);
        assert_eq!(collector.claims.try_recv().unwrap().worker, WorkerId(1));

        // Both workers busy: nothing more goes out until one is freed.
        let pending = tokio::time::timeout(Duration::from_millis(50), collector.claims.recv()).await;
        assert!(pending.is_err());
        assert!(workers[0].inbox.try_recv().is_err());
        assert!(workers[1].inbox.try_recv().is_err());

        collector.events.send(freed(1)).unwrap();
        assert_eq!(assigned_job(workers[1].inbox.recv().await), 2);
        assert_eq!(collector.claims.try_recv().unwrap().worker, WorkerId(1));

        assert_eq!(workers[0].inbox.recv().await, Some(WorkerCommand::Terminate));
        assert_eq!(workers[1].inbox.recv().await, Some(WorkerCommand::Terminate));

        collector.events.send(freed(0)).unwrap();
        collector.events.send(freed(1)).unwrap();
        collector
            .events
            .send(CollectorEvent::Results {
                results: (0..3).map(empty_result).collect(),
            })
            .unwrap();

        let results = handle.await.unwrap().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].job_id, 2);
    }

    #[tokio::test]
    async fn stray_free_is_rejected() {
        let Mesh {
            dispatcher,
            collector,
            workers: _workers,
        } = Mesh::new(1, 1);
        collector.events.send(freed(7)).unwrap();

        let err = Dispatcher::new(dispatcher)
            .run(jobs(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnexpectedMessage { .. })
        ));
    }

    #[tokio::test]
    async fn incomplete_batch_is_rejected() {
        let Mesh {
            dispatcher,
            collector,
            mut workers,
        } = Mesh::new(1, 1);
        let handle = tokio::spawn(Dispatcher::new(dispatcher).run(jobs(&["a"])));

        assert_eq!(assigned_job(workers[0].inbox.recv().await), 0);
        collector.events.send(freed(0)).unwrap();
        collector
            .events
            .send(CollectorEvent::Results { results: vec![] })
            .unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::IncompleteBatch {
                expected: 1,
                got: 0
            })
        ));
    }

    #[tokio::test]
    async fn collector_hangup_is_reported() {
        let Mesh {
            dispatcher,
            collector,
            workers: _workers,
        } = Mesh::new(1, 1);
        drop(collector);

        let err = Dispatcher::new(dispatcher)
            .run(jobs(&["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::ChannelClosed { .. })
        ));
    }

    #[test]
    fn out_of_order_batch_is_rejected() {
        let results = vec![empty_result(1), empty_result(0)];
        assert!(matches!(
            check_batch(&results, 2),
            Err(ProtocolError::UnexpectedMessage { .. })
        ));
        assert!(check_batch(&[empty_result(0)], 1).is_ok());
    }
}
