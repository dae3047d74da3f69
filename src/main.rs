use clap::Parser;
use crowd_analyst::analysis::jobs::{self as analysis_jobs, ConsensusAnalyzer};
use crowd_analyst::archive::builder::{self as archive_builder, ZipBuilder};
use crowd_analyst::archive::fetcher::HttpFetcher;
use crowd_analyst::client::RemoteDataClient;
use crowd_analyst::client::http::PyBossaClient;
use crowd_analyst::config::Config;
use crowd_analyst::executor::executor::JobExecutor;
use crowd_analyst::executor::journal::JobJournal;
use crowd_analyst::executor::queue::JobQueue;
use crowd_analyst::executor::registry::JobHandlerRegistry;
use crowd_analyst::http::router;
use crowd_analyst::scheduler::batch::{self as batch_jobs, BatchScheduler};
use crowd_analyst::state::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let catalog = Arc::new(config.catalog()?);
    let timings = config.timings();

    tracing::info!(
        "Remote platform: {} ({} category analyzers, default match {}%)",
        config.endpoint,
        catalog.category_count(),
        config.match_percentage
    );

    // 1. Remote client and job queue:
    let client: Arc<dyn RemoteDataClient> = Arc::new(PyBossaClient::new());
    let queue = match &config.journal {
        Some(path) => JobQueue::with_journal(JobJournal::new(path))?,
        None => JobQueue::new(),
    };
    let queue = Arc::new(queue.retain_finished(config.retain_finished_jobs));

    // 2. Job bodies:
    let analyzer = Arc::new(ConsensusAnalyzer::new(client.clone()));
    let scheduler = Arc::new(BatchScheduler::new(client.clone(), queue.clone()));
    let archives = Arc::new(ZipBuilder::new(
        &config.zip_dir,
        client.clone(),
        Arc::new(HttpFetcher::new()),
    ));

    let registry = JobHandlerRegistry::new();
    analysis_jobs::register(&registry, analyzer);
    batch_jobs::register(&registry, scheduler.clone());
    archive_builder::register(&registry, archives.clone());
    tracing::info!("Registered job handlers: {:?}", registry.list_handlers());

    // 3. Worker pool:
    let executor = JobExecutor::new(queue.clone(), registry, config.workers);
    executor.start();

    // 4. HTTP API:
    let state = Arc::new(AppState {
        credentials: config.credentials(),
        client,
        queue: queue.clone(),
        catalog,
        scheduler,
        archives,
        timings,
    });
    let app = router(state);

    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Shutting down, writing job journal");
    queue.flush()?;

    Ok(())
}
