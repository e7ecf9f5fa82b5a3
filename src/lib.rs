//! Pattern dispatch: distributed exact pattern search over a pool of workers.
//!
//! A dispatcher hands jobs to idle workers, workers run a matching kernel,
//! and a collector gathers results and reports freed workers back.

pub mod availability;
pub mod config;
pub mod error;
pub mod jobs;
pub mod kernel;
pub mod pool;
pub mod protocol;
