//! Protocol schema and transport for dispatcher, collector and workers.

pub mod messages;
pub mod transport;

pub use messages::{
    AvailabilityClaim, AvailabilityFree, CollectorEvent, Job, JobId, MatchResult, PatternMatches,
    Submission, WorkAssignment, WorkerCommand, WorkerId,
};
pub use transport::{CollectorLinks, DispatcherLinks, Mesh, WorkerLinks};
