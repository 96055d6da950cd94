use std::path::PathBuf;

use serde::Serialize;

use crate::engine::FileOutcome;

/// A file that failed; the run went on without it.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of one encrypt or decrypt run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Containers written (encrypt) or files restored (decrypt)
    pub processed: usize,
    /// Not candidates, plain images, non-containers
    pub skipped: usize,
    /// Plaintext bytes handled
    pub bytes: u64,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Written { bytes, .. } => {
                self.processed += 1;
                self.bytes += bytes;
            }
            FileOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn fail(&mut self, path: PathBuf, error: impl std::fmt::Display) {
        self.failures.push(FileFailure {
            path,
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failures.len()
    }
}
