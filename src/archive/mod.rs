//! Input Archive Module
//!
//! Builds one downloadable zip holding an input file per requested task.
//!
//! ## Workflow
//! 1. **Prepare**: the endpoint reserves a timestamped filename and queues a `build_zip` job.
//! 2. **Build**: the job resolves each task's input through an importer, fetches it,
//!    and writes it into a partial archive that is renamed into place when complete.
//! 3. **Check**: callers poll readiness, which is just "the final file exists".
//! 4. **Download**: the archive is streamed once and removed.
//!
//! ## Submodules
//! - **`builder`**: `ZipBuilder`, filename rules and the job body.
//! - **`importer`**: Per-source strategies choosing a task's input file.
//! - **`fetcher`**: Downloading input bytes.
//! - **`handlers`**: Prepare, check and download endpoints.
//! - **`types`**: Request and response DTOs.

pub mod builder;
pub mod fetcher;
pub mod handlers;
pub mod importer;
pub mod types;

pub use builder::sanitize_filename;

#[cfg(test)]
mod tests;
