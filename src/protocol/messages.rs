//! Message types for the dispatch/collect/assign protocol.
//!
//! Wire-level message kinds map onto these types as follows:
//!
//! | Kind               | Type                                   | Direction              |
//! |--------------------|----------------------------------------|------------------------|
//! | `WorkAssignment`   | [`WorkerCommand::Assign`]              | Dispatcher → Worker    |
//! | `Terminate`        | [`WorkerCommand::Terminate`]           | Dispatcher → Worker    |
//! | `MatchResult`      | [`Submission`]                         | Worker → Collector     |
//! | `AvailabilityClaim`| [`AvailabilityClaim`]                  | Dispatcher → Collector |
//! | `AvailabilityFree` | [`CollectorEvent::Freed`]              | Collector → Dispatcher |
//!
//! The final batch travels as [`CollectorEvent::Results`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable job identifier, `0..N` in load order.
pub type JobId = usize;

/// Identity of an assignable worker. Control roles never get one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// One independent unit of work: a text plus the patterns to locate in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub text: Vec<u8>,
    pub patterns: Vec<String>,
}

impl Job {
    pub fn new(id: JobId, text: impl Into<Vec<u8>>, patterns: Vec<String>) -> Self {
        Self {
            id,
            text: text.into(),
            patterns,
        }
    }
}

/// A job handed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAssignment {
    pub job_id: JobId,
    pub text: Vec<u8>,
    pub patterns: Vec<String>,
}

impl From<Job> for WorkAssignment {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            text: job.text,
            patterns: job.patterns,
        }
    }
}

/// All occurrences of one pattern, ascending and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatches {
    pub pattern: String,
    pub offsets: Vec<usize>,
}

/// Outcome of one job. `matches` follows the assignment's pattern order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub job_id: JobId,
    pub matches: Vec<PatternMatches>,
}

impl MatchResult {
    /// Offsets recorded for `pattern`, if the job searched for it.
    pub fn offsets_for(&self, pattern: &str) -> Option<&[usize]> {
        self.matches
            .iter()
            .find(|m| m.pattern == pattern)
            .map(|m| m.offsets.as_slice())
    }
}

/// Dispatcher → Worker traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    Assign(WorkAssignment),
    /// Sent exactly once per worker, after every job has been assigned.
    Terminate,
}

impl WorkerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Assign(_) => "assign",
            Self::Terminate => "terminate",
        }
    }
}

/// Worker → Collector: a finished job, tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub worker: WorkerId,
    pub result: MatchResult,
}

/// Dispatcher → Collector: `worker` was just handed a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityClaim {
    pub worker: WorkerId,
}

/// Collector → Dispatcher: `worker`'s result was fully received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityFree {
    pub worker: WorkerId,
}

/// Collector → Dispatcher traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectorEvent {
    Freed(AvailabilityFree),
    /// Every result of the run, ordered by ascending job id.
    Results { results: Vec<MatchResult> },
}

impl CollectorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Freed(_) => "freed",
            Self::Results { .. } => "results",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_display() {
        assert_eq!(WorkerId(4).to_string(), "worker-4");
    }

    #[test]
    fn assignment_takes_job_fields() {
        let job = Job::new(7, "hello", vec!["l".into()]);
        let assignment = WorkAssignment::from(job);
        assert_eq!(assignment.job_id, 7);
        assert_eq!(assignment.text, b"hello");
        assert_eq!(assignment.patterns, vec!["l".to_string()]);
    }

    #[test]
    fn terminate_is_tagged_variant() {
        let json = serde_json::to_string(&WorkerCommand::Terminate).unwrap();
        assert_eq!(json, r#"{"type":"terminate"}"#);
        let parsed: WorkerCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, WorkerCommand::Terminate);
    }

    #[test]
    fn freed_event_serialization() {
        let event = CollectorEvent::Freed(AvailabilityFree {
            worker: WorkerId(2),
        });
        let json = serde_json::to_string(&event).unwrap();
        let parsed: CollectorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.kind(), "freed");
    }

    #[test]
    fn offsets_for_looks_up_pattern() {
        let result = MatchResult {
            job_id: 0,
            matches: vec![
                PatternMatches {
                    pattern: "ab".into(),
                    offsets: vec![0, 4],
                },
                PatternMatches {
                    pattern: "zz".into(),
                    offsets: vec![],
                },
            ],
        };
        assert_eq!(result.offsets_for("ab"), Some(&[0, 4][..]));
        assert_eq!(result.offsets_for("zz"), Some(&[][..]));
        assert_eq!(result.offsets_for("q"), None);
    }
}
