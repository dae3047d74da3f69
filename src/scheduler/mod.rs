//! Batch Reanalysis Scheduler
//!
//! Re-runs consensus over a whole project after thresholds, excluded keys or the
//! crowd data have changed.
//!
//! ## Responsibilities
//! - **Listing**: resolving the tasks in scope (all tasks, tasks in a state, or
//!   the tasks behind results in a status).
//! - **Pacing**: spacing submissions so the remote rate limit is respected.
//! - **Isolation**: each task gets its own analysis job; one failing task never
//!   stops the rest from being submitted.
//!
//! ## Submodules
//! - **`batch`**: The batch job body and its timeout rule.
//! - **`pacer`**: The `Pacer` abstraction and its fixed-interval implementation.
//! - **`handlers`**: The reanalysis endpoint.
//! - **`types`**: Scope, report and request DTOs.

pub mod batch;
pub mod handlers;
pub mod pacer;
pub mod types;
