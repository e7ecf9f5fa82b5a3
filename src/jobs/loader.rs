//! Job loading.
//!
//! A job file is a pattern count, that many pattern lines, then one text line:
//!
//! ```text
//! 2
//! abc
//! b
//! abcabcabc
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::protocol::{Job, JobId};

use super::{lines, read_file};

/// Anything that can produce the jobs of a run, ids `0..N` in order.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Job>, LoadError>;
}

/// Reads `test0.in` .. `test<count-1>.in` from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryJobSource {
    dir: PathBuf,
    count: usize,
}

impl DirectoryJobSource {
    pub fn new(dir: impl Into<PathBuf>, count: usize) -> Self {
        Self {
            dir: dir.into(),
            count,
        }
    }
}

#[async_trait]
impl JobSource for DirectoryJobSource {
    async fn load(&self) -> Result<Vec<Job>, LoadError> {
        let mut jobs = Vec::new();
        for id in 0..self.count {
            let path = input_path(&self.dir, id);
            let bytes = read_file(&path).await?;
            let job = parse_job(&path, id, &bytes)?;
            debug!(
                job_id = id,
                patterns = job.patterns.len(),
                text_len = job.text.len(),
                "Loaded job"
            );
            jobs.push(job);
        }
        info!(dir = %self.dir.display(), jobs = jobs.len(), "Jobs loaded");
        Ok(jobs)
    }
}

/// `<dir>/test<id>.in`
pub fn input_path(dir: &Path, id: JobId) -> PathBuf {
    dir.join(format!("test{id}.in"))
}

/// Parse the contents of one job file. `path` is only used in errors.
pub fn parse_job(path: &Path, id: JobId, bytes: &[u8]) -> Result<Job, LoadError> {
    let malformed = |line: usize, reason: String| LoadError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let mut rows = lines(bytes);

    let header = rows
        .next()
        .ok_or_else(|| malformed(1, "empty file".to_string()))?;
    let header = String::from_utf8_lossy(header);
    let count: usize = header
        .trim()
        .parse()
        .map_err(|_| malformed(1, format!("expected a pattern count, found '{header}'")))?;

    let mut patterns = Vec::new();
    for index in 0..count {
        let line_no = index + 2;
        let line = rows.next().ok_or_else(|| {
            malformed(line_no, format!("expected {count} patterns, found {index}"))
        })?;
        let pattern = std::str::from_utf8(line)
            .map_err(|e| malformed(line_no, format!("pattern is not UTF-8: {e}")))?;
        patterns.push(pattern.to_string());
    }

    let text = rows
        .next()
        .ok_or_else(|| malformed(count + 2, "missing text line".to_string()))?;

    Ok(Job::new(id, text, patterns))
}
