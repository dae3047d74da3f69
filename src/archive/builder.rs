//! Zip build pipeline.
//!
//! ## States
//! - **Requested**: a `build_zip` job is queued and its filename reserved.
//! - **Building**: entries are written to a temporary file in the storage root.
//! - **Ready**: the temporary file was persisted as `{filename}`.
//!
//! Readers only ever look at the final name, so a half-written archive is never
//! observable. A build that fails or is aborted by its timeout drops its
//! temporary file and its reservation on the way out.

use super::fetcher::InputFetcher;
use super::importer::{InputImporter, importer_for};
use crate::analysis::jobs::{decode_payload, not_found_is_nothing_to_do};
use crate::client::RemoteDataClient;
use crate::client::types::{ApiCredentials, Project};
use crate::error::AnalystError;
use crate::executor::registry::JobHandlerRegistry;
use crate::executor::types::{Job, JobOutcome, now_secs};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tempfile::NamedTempFile;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const BUILD_ZIP_HANDLER: &str = "build_zip";

/// Arguments of one archive build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZipJob {
    pub credentials: ApiCredentials,
    pub short_name: String,
    pub task_ids: Vec<u64>,
    pub filename: String,
    pub importer: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub entries: usize,
    /// Tasks left out: missing task, no input selected, or input gone.
    pub skipped: usize,
}

/// An archive handed out for download. The file is already unlinked from the
/// storage root; the open handle is the only way left to read it.
#[derive(Debug)]
pub struct ZipDownload {
    pub filename: String,
    pub len: u64,
    pub file: tokio::fs::File,
}

/// `{short_name}_input_{unix_timestamp}.zip`
pub fn archive_filename(short_name: &str, timestamp: u64) -> String {
    format!("{}_input_{}.zip", short_name, timestamp)
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid filename pattern"));

/// Reduces a string to a safe single path component: runs of anything but
/// ASCII letters, digits, `.`, `_` and `-` become `_`, and leading dots and
/// underscores are dropped.
pub fn sanitize_filename(name: &str) -> String {
    UNSAFE_CHARS
        .replace_all(name.trim(), "_")
        .trim_start_matches(['.', '_'])
        .to_string()
}

fn validate_filename(filename: &str) -> Result<(), AnalystError> {
    if filename.is_empty() || sanitize_filename(filename) != filename || !filename.ends_with(".zip") {
        return Err(AnalystError::Validation(format!(
            "invalid archive filename: {:?}",
            filename
        )));
    }
    Ok(())
}

/// Releases a reserved filename when the build ends, however it ends.
struct Reservation<'a> {
    reserved: &'a DashMap<String, ()>,
    filename: &'a str,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.reserved.remove(self.filename);
    }
}

fn join_error(err: tokio::task::JoinError) -> AnalystError {
    AnalystError::Io(std::io::Error::other(err))
}

pub struct ZipBuilder {
    root: PathBuf,
    client: Arc<dyn RemoteDataClient>,
    fetcher: Arc<dyn InputFetcher>,
    /// Filenames handed out whose build has not finished yet.
    reserved: DashMap<String, ()>,
}

impl ZipBuilder {
    pub fn new(
        root: impl Into<PathBuf>,
        client: Arc<dyn RemoteDataClient>,
        fetcher: Arc<dyn InputFetcher>,
    ) -> Self {
        Self {
            root: root.into(),
            client,
            fetcher,
            reserved: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// A fresh archive filename for a project: timestamped, sanitized, and not
    /// colliding with an archive on disk or one still being built.
    pub fn reserve_filename(&self, short_name: &str) -> String {
        let base = sanitize_filename(&archive_filename(short_name, now_secs()));
        let stem = base.trim_end_matches(".zip").to_string();

        let mut attempt = 0usize;
        loop {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{}_{}.zip", stem, attempt)
            };
            attempt += 1;

            if self.archive_path(&candidate).exists() {
                continue;
            }
            if let Entry::Vacant(slot) = self.reserved.entry(candidate.clone()) {
                slot.insert(());
                return candidate;
            }
        }
    }

    /// Writes one entry per task with a resolvable input, then persists the
    /// archive under its final name.
    pub async fn build(&self, job: &ZipJob) -> Result<BuildReport, AnalystError> {
        let _reservation = Reservation {
            reserved: &self.reserved,
            filename: &job.filename,
        };
        validate_filename(&job.filename)?;
        let importer = importer_for(&job.importer)?;

        self.build_archive(job, importer.as_ref()).await
    }

    async fn build_archive(
        &self,
        job: &ZipJob,
        importer: &dyn InputImporter,
    ) -> Result<BuildReport, AnalystError> {
        let project = self
            .client
            .get_project(&job.credentials, &job.short_name)
            .await?;

        tokio::fs::create_dir_all(&self.root).await?;
        // Dropping the temporary file deletes it, so an error or an abort
        // anywhere below leaves nothing behind.
        let tmp = {
            let root = self.root.clone();
            tokio::task::spawn_blocking(move || NamedTempFile::new_in(root))
                .await
                .map_err(join_error)??
        };
        let mut writer = ZipWriter::new(tmp);
        let mut report = BuildReport::default();
        let mut seen = HashSet::with_capacity(job.task_ids.len());

        tracing::info!(
            "Building {} from {} tasks of {} ({} importer)",
            job.filename,
            job.task_ids.len(),
            project.short_name,
            importer.name()
        );

        for &task_id in &job.task_ids {
            if !seen.insert(task_id) {
                tracing::debug!("Task {} listed twice, writing it once", task_id);
                continue;
            }
            let Some((entry_name, bytes)) = self.resolve_input(job, &project, importer, task_id).await? else {
                report.skipped += 1;
                continue;
            };

            writer = tokio::task::spawn_blocking(move || {
                let options = SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated);
                writer.start_file(entry_name, options)?;
                writer.write_all(&bytes)?;
                Ok::<_, AnalystError>(writer)
            })
            .await
            .map_err(join_error)??;
            report.entries += 1;
        }

        let final_path = self.archive_path(&job.filename);
        tokio::task::spawn_blocking(move || {
            let tmp = writer.finish()?;
            tmp.as_file().sync_all()?;
            tmp.persist(final_path).map_err(|e| e.error)?;
            Ok::<_, AnalystError>(())
        })
        .await
        .map_err(join_error)??;

        tracing::info!(
            "Archive {} ready: {} entries, {} tasks skipped",
            job.filename,
            report.entries,
            report.skipped
        );
        Ok(report)
    }

    /// The entry name and content for one task, or `None` when the task has
    /// no input to include.
    async fn resolve_input(
        &self,
        job: &ZipJob,
        project: &Project,
        importer: &dyn InputImporter,
        task_id: u64,
    ) -> Result<Option<(String, Vec<u8>)>, AnalystError> {
        let task = match self
            .client
            .get_task(&job.credentials, project.id, task_id)
            .await
        {
            Ok(task) => task,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Task {} not found, skipping", task_id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(input) = importer.select(&task) else {
            tracing::warn!("Task {} has no {} input, skipping", task_id, importer.name());
            return Ok(None);
        };

        match self.fetcher.fetch(&input.url).await {
            Ok(bytes) => Ok(Some((input.entry_name, bytes))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Input {} of task {} is gone, skipping", input.url, task_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// True once the archive exists under its final name and is non-empty.
    pub async fn check(&self, filename: &str) -> bool {
        if validate_filename(filename).is_err() {
            return false;
        }
        match tokio::fs::metadata(self.archive_path(filename)).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Hands the archive out for download, at most once.
    ///
    /// The archive is first renamed to a private name, so of several concurrent
    /// callers exactly one wins; the others (and any later caller) get `None`.
    pub async fn respond(&self, filename: &str) -> Result<Option<ZipDownload>, AnalystError> {
        validate_filename(filename)?;
        if !self.check(filename).await {
            return Ok(None);
        }

        let sending = self.root.join(format!(
            ".{}.{}.sending",
            filename,
            uuid::Uuid::new_v4().simple()
        ));
        match tokio::fs::rename(self.archive_path(filename), &sending).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let file = tokio::fs::File::open(&sending).await?;
        let len = file.metadata().await?.len();
        if let Err(e) = tokio::fs::remove_file(&sending).await {
            tracing::warn!("Could not unlink {}: {}", sending.display(), e);
        }

        tracing::info!("Serving archive {} ({} bytes)", filename, len);
        Ok(Some(ZipDownload {
            filename: filename.to_string(),
            len,
            file,
        }))
    }
}

pub fn register(registry: &JobHandlerRegistry, builder: Arc<ZipBuilder>) {
    registry.register(BUILD_ZIP_HANDLER, move |job: Job| {
        let builder = builder.clone();
        async move {
            let outcome = match decode_payload::<ZipJob>(&job) {
                Ok(args) => builder.build(&args).await.map(|_| JobOutcome::Done),
                Err(e) => Err(e),
            };
            not_found_is_nothing_to_do(outcome)
        }
    });
}
