//! Error types for pattern-dispatch.

use std::path::PathBuf;

use crate::protocol::{JobId, WorkerId};

/// Top-level error type for a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("{role} task aborted: {reason}")]
    Actor { role: String, reason: String },
}

/// Configuration-related errors. Always reported before any protocol traffic.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "At least 3 participants are required (dispatcher, collector and one worker), got {participants}"
    )]
    InsufficientParticipants { participants: usize },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("{0}")]
    Usage(String),
}

/// Errors raised while reading job or reference files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    Missing { path: PathBuf },

    #[error("Malformed file {path} at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Violations of the dispatch/collect/assign protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Channel to {peer} closed unexpectedly")]
    ChannelClosed { peer: String },

    #[error("{role} expected {expected}, received {got}")]
    UnexpectedMessage {
        role: String,
        expected: String,
        got: String,
    },

    #[error("Result for unknown job {job_id} (run has {job_count} jobs)")]
    UnknownJob { job_id: JobId, job_count: usize },

    #[error("Duplicate result for job {job_id}")]
    DuplicateResult { job_id: JobId },

    #[error("Submission from {worker}, which holds no claimed job")]
    UnclaimedWorker { worker: WorkerId },

    #[error("Attempted to assign a job to busy {worker}")]
    AssignBusyWorker { worker: WorkerId },

    #[error("{worker} rejected state change: {reason}")]
    InvalidTransition { worker: WorkerId, reason: String },

    #[error("Result batch incomplete: expected {expected} results, got {got}")]
    IncompleteBatch { expected: usize, got: usize },
}

/// Matching kernel failures. Fatal for the whole run.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("Out of memory growing offset list to {requested} entries")]
    Exhausted { requested: usize },

    #[error("Kernel panicked: {0}")]
    Panicked(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
