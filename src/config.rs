//! Configuration types.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::kernel::KernelKind;

/// Dispatcher and collector, which never take jobs.
pub const CONTROL_ROLES: usize = 2;

/// Smallest pool that can make progress: both control roles plus one worker.
pub const MIN_PARTICIPANTS: usize = CONTROL_ROLES + 1;

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Total participants, control roles included.
    pub participants: usize,
    /// Kernel every worker runs.
    pub kernel: KernelKind,
    /// Bound of the shared worker → collector channel. `None` means one slot per worker.
    pub submission_capacity: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            participants: cores + CONTROL_ROLES,
            kernel: KernelKind::default(),
            submission_capacity: None,
        }
    }
}

impl PoolConfig {
    /// Build from `PATTERN_DISPATCH_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("PATTERN_DISPATCH_PARTICIPANTS") {
            config.participants = parse_count("PATTERN_DISPATCH_PARTICIPANTS", &raw)?;
        }
        if let Some(raw) = lookup("PATTERN_DISPATCH_KERNEL") {
            config.kernel = raw.parse()?;
        }
        if let Some(raw) = lookup("PATTERN_DISPATCH_SUBMISSION_CAPACITY") {
            config.submission_capacity =
                Some(parse_count("PATTERN_DISPATCH_SUBMISSION_CAPACITY", &raw)?);
        }

        Ok(config)
    }

    pub fn with_participants(mut self, participants: usize) -> Self {
        self.participants = participants;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelKind) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_submission_capacity(mut self, capacity: usize) -> Self {
        self.submission_capacity = Some(capacity);
        self
    }

    /// Reject configurations that cannot run, before any actor exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participants < MIN_PARTICIPANTS {
            return Err(ConfigError::InsufficientParticipants {
                participants: self.participants,
            });
        }
        if self.submission_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "submission_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.participants.saturating_sub(CONTROL_ROLES)
    }

    pub fn submission_capacity(&self) -> usize {
        self.submission_capacity
            .unwrap_or_else(|| self.worker_count())
            .max(1)
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a count: {e}"),
        })
}

/// Positional command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub tests_dir: PathBuf,
    pub test_count: usize,
}

impl CliArgs {
    /// Parse `<program> <tests_directory_path> <number_of_tests>`.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self, ConfigError> {
        let mut args = args.into_iter();
        let program = args
            .next()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let rest: Vec<String> = args.collect();

        let [tests_dir, count] = rest.as_slice() else {
            return Err(ConfigError::Usage(format!(
                "Usage: {program} <tests_directory_path> <number_of_tests>"
            )));
        };

        Ok(Self {
            tests_dir: PathBuf::from(tests_dir),
            test_count: parse_count("number_of_tests", count)?,
        })
    }
}
