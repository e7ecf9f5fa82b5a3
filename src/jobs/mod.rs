//! Job and reference files on disk.
//!
//! A test directory holds `test<N>.in` job files and `test<N>.ref` expected
//! results, numbered from 0.

pub mod loader;
pub mod reference;

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use crate::error::LoadError;

pub use loader::{DirectoryJobSource, JobSource, input_path, parse_job};
pub use reference::{
    Mismatch, Reference, ReferenceSet, Verdict, parse_reference, reference_path, verify,
};

/// Read a whole file, reporting a missing file separately from other I/O failures.
async fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).await.map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::Missing {
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Split on `\n`, dropping a trailing `\r` from each line.
fn lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    bytes
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}
