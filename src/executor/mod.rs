//! Job Execution Module
//!
//! Decouples request handling from long-running work. HTTP handlers enqueue jobs
//! and return immediately; a fixed-size worker pool runs them in the background.
//!
//! ## Architecture Overview
//! The executor follows a **Pull-based** model:
//! 1. **Submission**: Jobs are enqueued on the `JobQueue` as a handler name plus JSON arguments.
//! 2. **Persistence**: With a `JobJournal` attached, the queue snapshots itself on every change
//!    and restores unfinished jobs on startup (at-least-once).
//! 3. **Execution**: Workers claim `Pending` jobs and invoke the registered handler.
//! 4. **Timeouts**: A job that outlives its timeout is aborted and reported as failed.
//!    Nothing is retried automatically.
//!
//! ## Submodules
//! - **`queue`**: Job state storage, claiming and completion.
//! - **`executor`**: The worker pool and the execution lifecycle (claim -> run -> complete).
//! - **`registry`**: Maps string identifiers (e.g., "analyse_task") to executable Rust code.
//! - **`journal`**: Crash-safe snapshots of the queue.
//! - **`protocol`** / **`handlers`**: The job status HTTP API.

pub mod executor;
pub mod handlers;
pub mod journal;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;
