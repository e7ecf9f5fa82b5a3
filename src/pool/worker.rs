//! Worker actor. Executes one job at a time, end to end.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Error, KernelError, ProtocolError};
use crate::kernel::{self, MatchKernel};
use crate::pool::state::{WorkerLifecycle, WorkerReport};
use crate::protocol::{MatchResult, Submission, WorkAssignment, WorkerCommand, WorkerId, WorkerLinks};

/// A worker bound to its inbox and the shared submission channel.
pub struct Worker {
    id: WorkerId,
    inbox: mpsc::Receiver<WorkerCommand>,
    submissions: mpsc::Sender<Submission>,
    kernel: Arc<dyn MatchKernel>,
}

impl Worker {
    pub fn new(links: WorkerLinks, kernel: Arc<dyn MatchKernel>) -> Self {
        Self {
            id: links.id,
            inbox: links.inbox,
            submissions: links.submissions,
            kernel,
        }
    }

    /// Serve assignments until the termination sentinel arrives.
    ///
    /// A kernel failure ends the worker with an error; the pool treats that
    /// as fatal for the whole run.
    pub async fn run(mut self) -> Result<WorkerReport, Error> {
        let id = self.id;
        let mut lifecycle = WorkerLifecycle::new(id);
        debug!(worker = %id, kernel = self.kernel.name(), "Worker started");

        loop {
            let command = self.inbox.recv().await.ok_or_else(|| ProtocolError::ChannelClosed {
                peer: "dispatcher".to_string(),
            })?;

            match command {
                WorkerCommand::Terminate => {
                    lifecycle
                        .terminate()
                        .map_err(|reason| ProtocolError::InvalidTransition { worker: id, reason })?;
                    break;
                }
                WorkerCommand::Assign(assignment) => {
                    let job_id = assignment.job_id;
                    lifecycle
                        .begin(job_id)
                        .map_err(|reason| ProtocolError::InvalidTransition { worker: id, reason })?;
                    debug!(
                        worker = %id,
                        job_id,
                        patterns = assignment.patterns.len(),
                        text_len = assignment.text.len(),
                        "Executing job"
                    );

                    let result = run_kernel(Arc::clone(&self.kernel), assignment).await?;

                    self.submissions
                        .send(Submission { worker: id, result })
                        .await
                        .map_err(|_| ProtocolError::ChannelClosed {
                            peer: "collector".to_string(),
                        })?;
                    lifecycle
                        .complete()
                        .map_err(|reason| ProtocolError::InvalidTransition { worker: id, reason })?;
                    debug!(worker = %id, job_id, "Submitted result");
                }
            }
        }

        let report = lifecycle.report();
        info!(worker = %id, jobs = report.jobs_completed, "Worker terminated");
        Ok(report)
    }
}

/// Run the kernel off the async executor; matching is CPU-bound.
async fn run_kernel(
    kernel: Arc<dyn MatchKernel>,
    assignment: WorkAssignment,
) -> Result<MatchResult, KernelError> {
    tokio::task::spawn_blocking(move || kernel::execute(kernel.as_ref(), &assignment))
        .await
        .map_err(|e| KernelError::Panicked(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::RabinKarp;
    use crate::protocol::Mesh;

    struct ExhaustedKernel;

    impl MatchKernel for ExhaustedKernel {
        fn name(&self) -> &'static str {
            "exhausted"
        }

        fn find_all(&self, _text: &[u8], _pattern: &[u8]) -> Result<Vec<usize>, KernelError> {
            Err(KernelError::Exhausted { requested: 1 })
        }
    }

    fn assign(job_id: usize, text: &str, patterns: &[&str]) -> WorkerCommand {
        WorkerCommand::Assign(WorkAssignment {
            job_id,
            text: text.as_bytes().to_vec(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn executes_assignments_then_terminates() {
        let mut mesh = Mesh::new(1, 4);
        let links = mesh.workers.pop().unwrap();
        let tx = mesh.dispatcher.workers.get(&WorkerId(0)).unwrap().clone();
        let worker = Worker::new(links, Arc::new(RabinKarp));
        let handle = tokio::spawn(worker.run());

        tx.send(assign(0, "abcabcabc", &["abc"])).await.unwrap();
        let first = mesh.collector.submissions.recv().await.unwrap();
        assert_eq!(first.worker, WorkerId(0));
        assert_eq!(first.result.job_id, 0);
        assert_eq!(first.result.offsets_for("abc"), Some(&[0, 3, 6][..]));

        tx.send(assign(3, "xyz", &["y", "q"])).await.unwrap();
        let second = mesh.collector.submissions.recv().await.unwrap();
        assert_eq!(second.result.job_id, 3);
        assert_eq!(second.result.offsets_for("y"), Some(&[1][..]));

        tx.send(WorkerCommand::Terminate).await.unwrap();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.worker, WorkerId(0));
        assert_eq!(report.jobs_completed, 2);
    }

    #[tokio::test]
    async fn terminates_without_work() {
        let mut mesh = Mesh::new(1, 1);
        let links = mesh.workers.pop().unwrap();
        let tx = mesh.dispatcher.workers.get(&WorkerId(0)).unwrap().clone();
        tx.send(WorkerCommand::Terminate).await.unwrap();

        let report = Worker::new(links, Arc::new(RabinKarp)).run().await.unwrap();
        assert_eq!(report.jobs_completed, 0);
    }

    #[tokio::test]
    async fn kernel_failure_is_fatal() {
        let mut mesh = Mesh::new(1, 1);
        let links = mesh.workers.pop().unwrap();
        let tx = mesh.dispatcher.workers.get(&WorkerId(0)).unwrap().clone();
        tx.send(assign(0, "aaa", &["a"])).await.unwrap();

        let err = Worker::new(links, Arc::new(ExhaustedKernel))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Kernel(KernelError::Exhausted { .. })));
        assert!(mesh.collector.submissions.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatcher_hangup_is_reported() {
        let mut mesh = Mesh::new(1, 1);
        let links = mesh.workers.pop().unwrap();
        drop(mesh.dispatcher);

        let err = Worker::new(links, Arc::new(RabinKarp)).run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::ChannelClosed { .. })
        ));
    }
}
