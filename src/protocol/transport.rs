//! Channel mesh connecting the three roles.
//!
//! Each receiving role owns one receiver per logical source, so delivery is
//! FIFO per sender/receiver pair. Control-plane links are unbounded; the
//! shared worker → collector link is bounded by the configured capacity.

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use super::messages::{AvailabilityClaim, CollectorEvent, Submission, WorkerCommand, WorkerId};

/// Capacity of a worker inbox: one assignment plus the sentinel queued behind it.
pub const WORKER_INBOX_CAPACITY: usize = 2;

/// Endpoints owned by the dispatcher.
pub struct DispatcherLinks {
    pub workers: BTreeMap<WorkerId, mpsc::Sender<WorkerCommand>>,
    pub claims: mpsc::UnboundedSender<AvailabilityClaim>,
    pub events: mpsc::UnboundedReceiver<CollectorEvent>,
}

/// Endpoints owned by the collector.
pub struct CollectorLinks {
    pub workers: Vec<WorkerId>,
    pub claims: mpsc::UnboundedReceiver<AvailabilityClaim>,
    pub submissions: mpsc::Receiver<Submission>,
    pub events: mpsc::UnboundedSender<CollectorEvent>,
}

/// Endpoints owned by one worker.
pub struct WorkerLinks {
    pub id: WorkerId,
    pub inbox: mpsc::Receiver<WorkerCommand>,
    pub submissions: mpsc::Sender<Submission>,
}

/// A fully wired set of endpoints for one run.
pub struct Mesh {
    pub dispatcher: DispatcherLinks,
    pub collector: CollectorLinks,
    pub workers: Vec<WorkerLinks>,
}

impl Mesh {
    /// Wire one dispatcher, one collector and `worker_count` workers.
    pub fn new(worker_count: usize, submission_capacity: usize) -> Self {
        let (claims_tx, claims_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (submissions_tx, submissions_rx) = mpsc::channel(submission_capacity.max(1));

        let mut worker_senders = BTreeMap::new();
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let id = WorkerId(index as u32);
            let (tx, rx) = mpsc::channel(WORKER_INBOX_CAPACITY);
            worker_senders.insert(id, tx);
            workers.push(WorkerLinks {
                id,
                inbox: rx,
                submissions: submissions_tx.clone(),
            });
        }

        Self {
            dispatcher: DispatcherLinks {
                workers: worker_senders,
                claims: claims_tx,
                events: events_rx,
            },
            collector: CollectorLinks {
                workers: workers.iter().map(|w| w.id).collect(),
                claims: claims_rx,
                submissions: submissions_rx,
                events: events_tx,
            },
            workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_wires_every_worker() {
        let mesh = Mesh::new(3, 3);
        assert_eq!(mesh.workers.len(), 3);
        assert_eq!(mesh.dispatcher.workers.len(), 3);
        assert_eq!(
            mesh.collector.workers,
            vec![WorkerId(0), WorkerId(1), WorkerId(2)]
        );
    }

    #[tokio::test]
    async fn worker_inbox_is_point_to_point() {
        let mut mesh = Mesh::new(2, 2);
        let tx = mesh.dispatcher.workers.get(&WorkerId(1)).unwrap().clone();
        tx.send(WorkerCommand::Terminate).await.unwrap();

        assert!(mesh.workers[0].inbox.try_recv().is_err());
        assert_eq!(
            mesh.workers[1].inbox.recv().await,
            Some(WorkerCommand::Terminate)
        );
    }
}
