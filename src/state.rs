use crate::analysis::catalog::AnalyzerCatalog;
use crate::archive::builder::ZipBuilder;
use crate::client::RemoteDataClient;
use crate::client::types::ApiCredentials;
use crate::config::JobTimings;
use crate::executor::queue::JobQueue;
use crate::scheduler::batch::BatchScheduler;

use std::sync::Arc;

/// Services shared by the HTTP handlers.
///
/// Built once at startup and handed to the router as an `Extension`; nothing
/// here is a process-wide global.
pub struct AppState {
    pub credentials: ApiCredentials,
    pub client: Arc<dyn RemoteDataClient>,
    pub queue: Arc<JobQueue>,
    pub catalog: Arc<AnalyzerCatalog>,
    pub scheduler: Arc<BatchScheduler>,
    pub archives: Arc<ZipBuilder>,
    pub timings: JobTimings,
}
