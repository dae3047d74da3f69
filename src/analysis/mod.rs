//! Consensus Analysis Module
//!
//! Reconciles the independent submissions collected for a task into one result.
//!
//! ## Workflow
//! 1. **Trigger**: a completed-task webhook (per-category analyzer) or a batch
//!    reanalysis enqueues one `analyse_task` job per task.
//! 2. **Fetch**: the job loads the task's runs and its result through the remote client.
//! 3. **Reconcile**: `consensus::analyse` picks, per field, the value enough runs agree on.
//! 4. **Write back**: the result's fields and status are replaced in one update.
//!
//! ## Submodules
//! - **`consensus`**: The pure consensus algorithm.
//! - **`normalize`**: Canonical comparison keys for field values.
//! - **`catalog`**: Per-category analyzer settings.
//! - **`jobs`**: The queued job body.
//! - **`handlers`**: Webhook, next-result and result-edit endpoints.
//! - **`types`**: Settings and DTOs.

pub mod catalog;
pub mod consensus;
pub mod handlers;
pub mod jobs;
pub mod normalize;
pub mod types;
