//! Expected results and order-insensitive comparison.
//!
//! A reference file has one line per pattern: `pattern: idx1 idx2 ...`.
//! The pattern is everything before the last `:`, so patterns may contain
//! colons themselves. Offsets may be separated by spaces or commas.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::LoadError;
use crate::protocol::{JobId, MatchResult, PatternMatches};

use super::{lines, read_file};

/// Expected matches for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub job_id: JobId,
    pub entries: Vec<PatternMatches>,
}

/// References for every job of a run, indexed by job id.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    references: Vec<Reference>,
}

impl ReferenceSet {
    /// Read `test0.ref` .. `test<count-1>.ref` from `dir`.
    pub async fn load(dir: &Path, count: usize) -> Result<Self, LoadError> {
        let mut references = Vec::new();
        for id in 0..count {
            let path = reference_path(dir, id);
            let bytes = read_file(&path).await?;
            references.push(parse_reference(&path, id, &bytes)?);
        }
        info!(dir = %dir.display(), references = references.len(), "References loaded");
        Ok(Self { references })
    }

    pub fn get(&self, job_id: JobId) -> Option<&Reference> {
        self.references.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// `<dir>/test<id>.ref`
pub fn reference_path(dir: &Path, id: JobId) -> PathBuf {
    dir.join(format!("test{id}.ref"))
}

/// Parse the contents of one reference file. Blank lines are skipped.
pub fn parse_reference(path: &Path, job_id: JobId, bytes: &[u8]) -> Result<Reference, LoadError> {
    let mut entries = Vec::new();
    for (index, raw) in lines(bytes).enumerate() {
        let line_no = index + 1;
        let malformed = |reason: String| LoadError::Malformed {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        };
        let line = std::str::from_utf8(raw).map_err(|e| malformed(format!("not UTF-8: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }

        let (pattern, offsets) = line
            .rsplit_once(':')
            .ok_or_else(|| malformed("expected 'pattern: offsets'".to_string()))?;
        let offsets = offsets
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| {
                token
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("invalid offset '{token}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        entries.push(PatternMatches {
            pattern: pattern.to_string(),
            offsets,
        });
    }
    Ok(Reference { job_id, entries })
}

/// Outcome of checking one job against its reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(Mismatch),
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed(_) => "FAILED",
        }
    }
}

/// First difference found between a result and its reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    PatternCount {
        output: usize,
        expected: usize,
    },
    /// Pattern names differ at `index` after sorting both sides by name.
    Pattern {
        index: usize,
        output: String,
        expected: String,
    },
    OccurrenceCount {
        pattern: String,
        output: usize,
        expected: usize,
    },
    /// Offsets differ at `position` after sorting.
    Offset {
        pattern: String,
        position: usize,
        output: usize,
        expected: usize,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatternCount { output, expected } => write!(
                f,
                "different number of patterns: {output} (output) vs {expected} (expected)"
            ),
            Self::Pattern {
                index,
                output,
                expected,
            } => write!(
                f,
                "different pattern at sorted index {index}: '{output}' (output) vs '{expected}' (expected)"
            ),
            Self::OccurrenceCount {
                pattern,
                output,
                expected,
            } => write!(
                f,
                "different occurrence count for '{pattern}': {output} (output) vs {expected} (expected)"
            ),
            Self::Offset {
                pattern,
                position,
                output,
                expected,
            } => write!(
                f,
                "offsets for '{pattern}' differ at position {position}: {output} (output) vs {expected} (expected)"
            ),
        }
    }
}

/// Compare `result` with `reference`, ignoring pattern order and offset order.
pub fn verify(result: &MatchResult, reference: &Reference) -> Verdict {
    match first_mismatch(&result.matches, &reference.entries) {
        Some(mismatch) => Verdict::Failed(mismatch),
        None => Verdict::Passed,
    }
}

fn first_mismatch(output: &[PatternMatches], expected: &[PatternMatches]) -> Option<Mismatch> {
    if output.len() != expected.len() {
        return Some(Mismatch::PatternCount {
            output: output.len(),
            expected: expected.len(),
        });
    }

    let output = sorted(output);
    let expected = sorted(expected);

    for (index, (out, exp)) in output.iter().zip(&expected).enumerate() {
        if out.pattern != exp.pattern {
            return Some(Mismatch::Pattern {
                index,
                output: out.pattern.clone(),
                expected: exp.pattern.clone(),
            });
        }
        if out.offsets.len() != exp.offsets.len() {
            return Some(Mismatch::OccurrenceCount {
                pattern: exp.pattern.clone(),
                output: out.offsets.len(),
                expected: exp.offsets.len(),
            });
        }
        if let Some((position, (o, e))) = out
            .offsets
            .iter()
            .zip(&exp.offsets)
            .enumerate()
            .find(|(_, (o, e))| o != e)
        {
            return Some(Mismatch::Offset {
                pattern: exp.pattern.clone(),
                position,
                output: *o,
                expected: *e,
            });
        }
    }
    None
}

fn sorted(entries: &[PatternMatches]) -> Vec<PatternMatches> {
    let mut entries = entries.to_vec();
    entries.sort_by(|a, b| a.pattern.cmp(&b.pattern));
    for entry in &mut entries {
        entry.offsets.sort_unstable();
    }
    entries
}
