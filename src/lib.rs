//! Crowd Analyst Library
//!
//! Post-processing service for a crowdsourcing platform: reconciles the
//! independent submissions for each task into one result, and packages task
//! input files into downloadable archives. All long-running work goes through
//! a local job queue served by a worker pool.
//!
//! ## Architecture Modules
//! - **`executor`**: The job queue, handler registry and worker pool. Jobs carry
//!   their arguments as JSON, run under a hard timeout, and end with a classified
//!   status that the HTTP API exposes.
//! - **`client`**: The remote data client. Typed, credential-per-call access to
//!   projects, tasks, task runs and results on the remote platform.
//! - **`analysis`**: The consensus analyzer. A pure per-field majority vote over
//!   task runs, the per-category analyzer catalog, and the analysis job body.
//! - **`scheduler`**: Batch reanalysis of a whole project, paced to respect the
//!   remote rate limit.
//! - **`archive`**: The zip build pipeline: importers, fetching, atomic builds
//!   and single-shot downloads.
//! - **`config`**, **`error`**, **`http`**, **`state`**: Startup settings, the
//!   error taxonomy, and the HTTP surface tying the subsystems together.

pub mod analysis;
pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod scheduler;
pub mod state;
