//! Job Journal
//!
//! Snapshots the queue to a JSON file so enqueued work survives a restart.
//! Every snapshot goes to a temporary file in the journal's directory and is
//! persisted over the journal, so a crash mid-write leaves the previous
//! snapshot intact.
//!
//! The journal does not order its writers; `JobQueue` serializes them.

use super::types::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    job_id: JobId,
    entry: JobEntry,
}

pub struct JobJournal {
    path: PathBuf,
}

impl JobJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the last snapshot. A missing journal is an empty queue.
    ///
    /// Jobs that were `Running` when the snapshot was taken were interrupted,
    /// so they come back as `Pending` and run again (at-least-once).
    pub fn load(&self) -> Result<Vec<(JobId, JobEntry)>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading journal {}", self.path.display()));
            }
        };

        let records: Vec<JournalRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing journal {}", self.path.display()))?;

        Ok(records
            .into_iter()
            .map(|record| {
                let mut entry = record.entry;
                if entry.status == JobStatus::Running {
                    entry.status = JobStatus::Pending;
                    entry.started_at = None;
                }
                (record.job_id, entry)
            })
            .collect())
    }

    pub fn save(&self, entries: Vec<(JobId, JobEntry)>) -> Result<()> {
        let records: Vec<JournalRecord> = entries
            .into_iter()
            .map(|(job_id, entry)| JournalRecord { job_id, entry })
            .collect();
        let body = serde_json::to_vec(&records)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating journal snapshot in {}", dir.display()))?;
        tmp.write_all(&body)?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("replacing journal {}", self.path.display()))?;

        tracing::trace!("Journal snapshot written ({} jobs)", records.len());
        Ok(())
    }
}
