//! Matching kernels: exact pattern search executed inside a worker.
//!
//! A kernel returns every starting offset at which a pattern occurs in a text,
//! in ascending order. Implementations must agree exactly with each other for
//! the same input.
//!
//! - `rabin_karp`: rolling fingerprint pre-filter with mandatory verification
//! - `naive`: direct window comparison, used for cross-checking

pub mod naive;
pub mod rabin_karp;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConfigError, KernelError};
use crate::protocol::{MatchResult, PatternMatches, WorkAssignment};

pub use naive::NaiveScan;
pub use rabin_karp::RabinKarp;

/// Exact single-pattern matcher.
pub trait MatchKernel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// All offsets `o` in `[0, text.len() - pattern.len()]` where `pattern`
    /// occurs, ascending. An empty pattern, or one longer than the text,
    /// matches nowhere.
    fn find_all(&self, text: &[u8], pattern: &[u8]) -> Result<Vec<usize>, KernelError>;
}

/// Run `kernel` once per pattern of `assignment`.
pub fn execute(
    kernel: &dyn MatchKernel,
    assignment: &WorkAssignment,
) -> Result<MatchResult, KernelError> {
    let mut matches = Vec::with_capacity(assignment.patterns.len());
    for pattern in &assignment.patterns {
        let offsets = kernel.find_all(&assignment.text, pattern.as_bytes())?;
        matches.push(PatternMatches {
            pattern: pattern.clone(),
            offsets,
        });
    }
    Ok(MatchResult {
        job_id: assignment.job_id,
        matches,
    })
}

/// Append `offset`, surfacing allocation failure instead of aborting the process.
pub(crate) fn push_offset(offsets: &mut Vec<usize>, offset: usize) -> Result<(), KernelError> {
    offsets
        .try_reserve(1)
        .map_err(|_| KernelError::Exhausted {
            requested: offsets.len() + 1,
        })?;
    offsets.push(offset);
    Ok(())
}

/// Selectable kernel implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelKind {
    #[default]
    RabinKarp,
    Naive,
}

impl KernelKind {
    pub fn build(self) -> Arc<dyn MatchKernel> {
        match self {
            Self::RabinKarp => Arc::new(RabinKarp),
            Self::Naive => Arc::new(NaiveScan),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RabinKarp => "rabin-karp",
            Self::Naive => "naive",
        };
        write!(f, "{s}")
    }
}

impl FromStr for KernelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rabin-karp" | "rabin_karp" | "rk" => Ok(Self::RabinKarp),
            "naive" => Ok(Self::Naive),
            other => Err(ConfigError::InvalidValue {
                key: "kernel".to_string(),
                message: format!("unknown kernel '{other}' (expected rabin-karp or naive)"),
            }),
        }
    }
}
