//! Worker state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{JobId, WorkerId};

/// State of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Blocked on the dispatcher for the next message.
    WaitingForAssignment,
    /// Running the kernel for one job.
    Executing,
    /// Received the sentinel; no further messages are read.
    Terminated,
}

impl WorkerState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, target),
            (WaitingForAssignment, Executing)
                | (WaitingForAssignment, Terminated)
                | (Executing, WaitingForAssignment)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WaitingForAssignment => "waiting_for_assignment",
            Self::Executing => "executing",
            Self::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle bookkeeping for one worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerLifecycle {
    pub worker: WorkerId,
    pub state: WorkerState,
    /// Job currently executing, if any.
    pub current_job: Option<JobId>,
    pub jobs_completed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkerLifecycle {
    pub fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            state: WorkerState::WaitingForAssignment,
            current_job: None,
            jobs_completed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn transition_to(&mut self, target: WorkerState) -> Result<(), String> {
        if !self.state.can_transition_to(target) {
            return Err(format!(
                "{} cannot transition from {} to {}",
                self.worker, self.state, target
            ));
        }
        self.state = target;
        Ok(())
    }

    pub fn begin(&mut self, job_id: JobId) -> Result<(), String> {
        self.transition_to(WorkerState::Executing)?;
        self.current_job = Some(job_id);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), String> {
        self.transition_to(WorkerState::WaitingForAssignment)?;
        self.current_job = None;
        self.jobs_completed += 1;
        Ok(())
    }

    pub fn terminate(&mut self) -> Result<(), String> {
        self.transition_to(WorkerState::Terminated)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn report(&self) -> WorkerReport {
        WorkerReport {
            worker: self.worker,
            jobs_completed: self.jobs_completed,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Summary returned by a worker once it has terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub jobs_completed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use WorkerState::*;
        assert!(WaitingForAssignment.can_transition_to(Executing));
        assert!(Executing.can_transition_to(WaitingForAssignment));
        assert!(WaitingForAssignment.can_transition_to(Terminated));
    }

    #[test]
    fn invalid_transitions() {
        use WorkerState::*;
        assert!(!Executing.can_transition_to(Executing));
        assert!(!Executing.can_transition_to(Terminated));
        assert!(!Terminated.can_transition_to(WaitingForAssignment));
        assert!(!Terminated.can_transition_to(Executing));
    }

    #[test]
    fn lifecycle_counts_jobs() {
        let mut lifecycle = WorkerLifecycle::new(WorkerId(1));
        lifecycle.begin(0).unwrap();
        assert_eq!(lifecycle.current_job, Some(0));
        lifecycle.complete().unwrap();
        lifecycle.begin(4).unwrap();
        lifecycle.complete().unwrap();
        lifecycle.terminate().unwrap();

        assert!(lifecycle.state.is_terminal());
        let report = lifecycle.report();
        assert_eq!(report.jobs_completed, 2);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn second_assignment_while_executing_is_rejected() {
        let mut lifecycle = WorkerLifecycle::new(WorkerId(0));
        lifecycle.begin(0).unwrap();
        let err = lifecycle.begin(1).unwrap_err();
        assert!(err.contains("executing"));
        assert_eq!(lifecycle.current_job, Some(0));
    }

    #[test]
    fn report_json_round_trip() {
        let mut lifecycle = WorkerLifecycle::new(WorkerId(3));
        lifecycle.begin(0).unwrap();
        lifecycle.complete().unwrap();
        lifecycle.terminate().unwrap();
        let report = lifecycle.report();

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"worker\":3"));
        let back: WorkerReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn state_display() {
        assert_eq!(
            WorkerState::WaitingForAssignment.to_string(),
            "waiting_for_assignment"
        );
        assert_eq!(WorkerState::Terminated.to_string(), "terminated");
    }
}
