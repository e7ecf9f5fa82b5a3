//! Worker pool: one dispatcher, one collector and the workers between them.
//!
//! - `state`: worker state machine (WaitingForAssignment → Executing → … → Terminated)
//! - `worker`: executes one assignment at a time with a [`MatchKernel`]
//! - `collector`: gathers results and reports freed workers
//! - `dispatcher`: assigns jobs to idle workers and drives termination
//!
//! [`run_pool`] wires the three roles together and supervises them. Any actor
//! failing ends the whole run; there is no partial result.

pub mod collector;
pub mod dispatcher;
pub mod state;
pub mod worker;

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::PoolConfig;
use crate::error::{ConfigError, Error, Result};
use crate::kernel::MatchKernel;
use crate::protocol::{Job, MatchResult, Mesh};

pub use collector::{Collector, CollectorStats};
pub use dispatcher::Dispatcher;
pub use state::{WorkerLifecycle, WorkerReport, WorkerState};
pub use worker::Worker;

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// One result per job, indexed by job id.
    pub results: Vec<MatchResult>,
    /// Worker reports, ordered by worker id.
    pub workers: Vec<WorkerReport>,
    pub collector: CollectorStats,
}

/// How a supervised actor finished.
enum ActorExit {
    Worker(WorkerReport),
    Collector(CollectorStats),
}

/// Run `jobs` through a pool sized by `config`, using the configured kernel.
pub async fn run_pool(jobs: Vec<Job>, config: &PoolConfig) -> Result<RunSummary> {
    run_pool_with_kernel(jobs, config, config.kernel.build()).await
}

/// Run `jobs` through a pool whose workers all share `kernel`.
///
/// Configuration is checked before any actor is spawned. Job ids must be
/// `0..jobs.len()` in order.
pub async fn run_pool_with_kernel(
    jobs: Vec<Job>,
    config: &PoolConfig,
    kernel: Arc<dyn MatchKernel>,
) -> Result<RunSummary> {
    config.validate()?;
    check_job_ids(&jobs)?;

    let worker_count = config.worker_count();
    let job_count = jobs.len();
    let Mesh {
        dispatcher,
        collector,
        workers,
    } = Mesh::new(worker_count, config.submission_capacity());
    info!(
        jobs = job_count,
        workers = worker_count,
        kernel = kernel.name(),
        "Starting pool"
    );

    let mut actors = JoinSet::new();
    actors.spawn(async move {
        Collector::new(collector, job_count)
            .run()
            .await
            .map(ActorExit::Collector)
    });
    for links in workers {
        let worker = Worker::new(links, Arc::clone(&kernel));
        actors.spawn(async move { worker.run().await.map(ActorExit::Worker) });
    }

    let dispatch = Dispatcher::new(dispatcher).run(jobs);
    tokio::pin!(dispatch);

    let mut results = None;
    let mut reports = Vec::with_capacity(worker_count);
    let mut stats = None;

    while results.is_none() || !actors.is_empty() {
        tokio::select! {
            biased;
            Some(joined) = actors.join_next(), if !actors.is_empty() => {
                let exit = joined
                    .map_err(|e| Error::Actor {
                        role: "pool actor".to_string(),
                        reason: e.to_string(),
                    })
                    .and_then(|outcome| outcome);
                match exit {
                    Ok(ActorExit::Worker(report)) => reports.push(report),
                    Ok(ActorExit::Collector(collected)) => stats = Some(collected),
                    Err(e) => {
                        error!(error = %e, "Actor failed, aborting run");
                        actors.abort_all();
                        return Err(e);
                    }
                }
            }
            outcome = &mut dispatch, if results.is_none() => match outcome {
                Ok(batch) => results = Some(batch),
                Err(e) => {
                    error!(error = %e, "Dispatcher failed, aborting run");
                    actors.abort_all();
                    return Err(e);
                }
            },
        }
    }

    let results = results.unwrap_or_default();
    let collector = stats.ok_or_else(|| Error::Actor {
        role: "collector".to_string(),
        reason: "finished without reporting".to_string(),
    })?;
    reports.sort_by_key(|report| report.worker);

    info!(
        results = results.len(),
        workers = reports.len(),
        "Pool finished"
    );
    Ok(RunSummary {
        results,
        workers: reports,
        collector,
    })
}

fn check_job_ids(jobs: &[Job]) -> std::result::Result<(), ConfigError> {
    match jobs.iter().enumerate().find(|(index, job)| job.id != *index) {
        Some((index, job)) => Err(ConfigError::InvalidValue {
            key: "jobs".to_string(),
            message: format!("job at position {index} has id {}", job.id),
        }),
        None => Ok(()),
    }
}
