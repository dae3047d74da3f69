//! Executor Module Tests
//!
//! ## Test Scopes
//! - **Registry**: Verifies handler registration, lookup, and execution mechanics.
//! - **Queue**: Claiming, completion and status accounting.
//! - **Worker pool**: Timeouts, panics and error classification end to end.
//! - **Journal**: Snapshot and restore of unfinished jobs.

#[cfg(test)]
mod tests {
    use crate::error::{AnalystError, ErrorKind};
    use crate::executor::executor::JobExecutor;
    use crate::executor::journal::JobJournal;
    use crate::executor::queue::JobQueue;
    use crate::executor::registry::JobHandlerRegistry;
    use crate::executor::types::{Job, JobId, JobOutcome, JobStatus};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn job(handler: &str, payload: serde_json::Value) -> Job {
        Job {
            handler: handler.to_string(),
            payload,
            timeout_secs: 30,
        }
    }

    // ============================================================
    // REGISTRY
    // ============================================================

    #[tokio::test]
    async fn test_registry_register_and_execute() {
        let registry = JobHandlerRegistry::new();
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        registry.register("test_handler", move |_job| {
            let count = call_count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(JobOutcome::Done)
            }
        });

        assert_eq!(registry.list_handlers(), vec!["test_handler".to_string()]);

        let result = registry
            .execute(&job("test_handler", serde_json::json!({"test": "data"})))
            .await;

        assert_eq!(result.unwrap(), JobOutcome::Done);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registry_unknown_handler_returns_error() {
        let registry = JobHandlerRegistry::new();

        let result = registry
            .execute(&job("non_existent_handler", serde_json::json!({})))
            .await;

        assert!(result.unwrap_err().to_string().contains("Unknown job handler"));
    }

    #[tokio::test]
    async fn test_registry_handler_receives_payload() {
        let registry = JobHandlerRegistry::new();
        let received = Arc::new(tokio::sync::Mutex::new(None));
        let received_clone = received.clone();

        registry.register("payload_handler", move |job| {
            let received = received_clone.clone();
            async move {
                *received.lock().await = Some(job.payload);
                Ok(JobOutcome::Done)
            }
        });

        registry
            .execute(&job(
                "payload_handler",
                serde_json::json!({"short_name": "playbills", "task_id": 42}),
            ))
            .await
            .unwrap();

        let payload = received.lock().await;
        let p = payload.as_ref().unwrap();
        assert_eq!(p["short_name"], "playbills");
        assert_eq!(p["task_id"], 42);
    }

    // ============================================================
    // QUEUE
    // ============================================================

    #[test]
    fn test_job_id_is_unique() {
        assert_ne!(JobId::new().0, JobId::new().0);
    }

    #[test]
    fn test_job_can_only_be_claimed_once() {
        let queue = JobQueue::new();
        let job_id = queue
            .enqueue("noop", &serde_json::json!({}), Duration::from_secs(5))
            .unwrap();

        assert_eq!(queue.pending_jobs().len(), 1);
        assert!(queue.try_claim_job(&job_id));
        assert!(!queue.try_claim_job(&job_id));
        assert!(queue.pending_jobs().is_empty());
        assert_eq!(queue.get_job(&job_id).unwrap().status, JobStatus::Running);
    }

    #[test]
    fn test_pending_jobs_are_offered_oldest_first() {
        let queue = JobQueue::new();
        let first = queue
            .enqueue_call("noop", serde_json::json!({"n": 1}), Duration::from_secs(5))
            .unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = queue
            .enqueue_call("noop", serde_json::json!({"n": 2}), Duration::from_secs(5))
            .unwrap();

        let pending: Vec<JobId> = queue.pending_jobs().into_iter().map(|(id, _)| id).collect();
        assert_eq!(pending, vec![first, second]);
    }

    #[test]
    fn test_complete_rejects_non_terminal_status() {
        let queue = JobQueue::new();
        let job_id = queue
            .enqueue("noop", &serde_json::json!({}), Duration::from_secs(5))
            .unwrap();

        assert!(queue.complete_job(&job_id, JobStatus::Running).is_err());
        assert!(queue.complete_job(&JobId::new(), JobStatus::Completed).is_err());
    }

    #[test]
    fn test_oldest_finished_jobs_are_evicted() {
        let queue = JobQueue::new().retain_finished(2);
        let pending = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();

        let mut finished = Vec::new();
        for _ in 0..4 {
            let job_id = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
            queue.complete_job(&job_id, JobStatus::Completed).unwrap();
            finished.push(job_id);
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(queue.job_count(), 3);
        assert!(queue.get_job(&pending).is_some());
        assert!(queue.get_job(&finished[0]).is_none());
        assert!(queue.get_job(&finished[1]).is_none());
        assert!(queue.get_job(&finished[3]).is_some());
    }

    #[test]
    fn test_status_counts() {
        let queue = JobQueue::new();
        let a = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
        let b = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
        let c = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
        queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();

        queue.complete_job(&a, JobStatus::Completed).unwrap();
        queue
            .complete_job(&b, JobStatus::Skipped { reason: "empty".into() })
            .unwrap();
        queue
            .complete_job(
                &c,
                JobStatus::Failed {
                    kind: ErrorKind::Transient,
                    error: "unreachable".into(),
                },
            )
            .unwrap();

        let counts = queue.status_counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.failed, 1);
    }

    // ============================================================
    // WORKER POOL
    // ============================================================

    async fn run_single(registry: Arc<JobHandlerRegistry>, timeout: Duration) -> JobStatus {
        let queue = Arc::new(JobQueue::new());
        let job_id = queue
            .enqueue("under_test", &serde_json::json!({}), timeout)
            .unwrap();
        let executor = JobExecutor::new(queue.clone(), registry, 1);

        assert!(executor.run_next(0).await);
        queue.get_job(&job_id).unwrap().status
    }

    #[tokio::test]
    async fn test_successful_job_is_completed() {
        let registry = JobHandlerRegistry::new();
        registry.register("under_test", |_job| async { Ok(JobOutcome::Done) });

        assert_eq!(
            run_single(registry, Duration::from_secs(5)).await,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_nothing_to_do_is_recorded_as_skipped() {
        let registry = JobHandlerRegistry::new();
        registry.register("under_test", |_job| async {
            Ok(JobOutcome::NothingToDo("no task runs".to_string()))
        });

        assert_eq!(
            run_single(registry, Duration::from_secs(5)).await,
            JobStatus::Skipped {
                reason: "no task runs".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failure_is_classified() {
        let registry = JobHandlerRegistry::new();
        registry.register("under_test", |_job| async {
            Err(anyhow::Error::new(AnalystError::RateLimited { retry_after: None })
                .context("updating result 7"))
        });

        match run_single(registry, Duration::from_secs(5)).await {
            JobStatus::Failed { kind, error } => {
                assert_eq!(kind, ErrorKind::RateLimited);
                assert!(error.contains("updating result 7"));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_terminates_job() {
        let finished = Arc::new(AtomicUsize::new(0));
        let finished_clone = finished.clone();
        let registry = JobHandlerRegistry::new();
        registry.register("under_test", move |_job| {
            let finished = finished_clone.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(JobOutcome::Done)
            }
        });

        match run_single(registry, Duration::from_secs(2)).await {
            JobStatus::Failed { kind, .. } => assert_eq!(kind, ErrorKind::Timeout),
            other => panic!("unexpected status {:?}", other),
        }

        // The aborted body never reaches its side effect.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported_failed() {
        let registry = JobHandlerRegistry::new();
        registry.register("under_test", |job: Job| async move {
            if job.timeout_secs > 0 {
                panic!("boom");
            }
            Ok(JobOutcome::Done)
        });

        match run_single(registry, Duration::from_secs(5)).await {
            JobStatus::Failed { kind, .. } => assert_eq!(kind, ErrorKind::Internal),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unregistered_handler_fails_job() {
        match run_single(JobHandlerRegistry::new(), Duration::from_secs(5)).await {
            JobStatus::Failed { kind, error } => {
                assert_eq!(kind, ErrorKind::Internal);
                assert!(error.contains("Unknown job handler"));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_started_pool_drains_queue() {
        let queue = Arc::new(JobQueue::new());
        let registry = JobHandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        registry.register("count", move |_job| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(JobOutcome::Done)
            }
        });

        let executor = JobExecutor::new(queue.clone(), registry, 3);
        let workers = executor.start();

        for _ in 0..10 {
            queue.enqueue("count", &(), Duration::from_secs(5)).unwrap();
        }

        for _ in 0..100 {
            if queue.status_counts().completed == 10 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(count.load(Ordering::SeqCst), 10);
        for worker in workers {
            worker.abort();
        }
    }

    // ============================================================
    // JOURNAL
    // ============================================================

    #[test]
    fn test_journal_restores_unfinished_jobs_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        let (running, done) = {
            let queue = JobQueue::with_journal(JobJournal::new(&path)).unwrap();
            let running = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
            let done = queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
            assert!(queue.try_claim_job(&running));
            assert!(queue.try_claim_job(&done));
            queue.complete_job(&done, JobStatus::Completed).unwrap();
            (running, done)
        };

        let restored = JobQueue::with_journal(JobJournal::new(&path)).unwrap();
        assert_eq!(restored.job_count(), 2);
        assert_eq!(restored.get_job(&running).unwrap().status, JobStatus::Pending);
        assert_eq!(restored.get_job(&done).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_concurrent_enqueues_all_reach_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let queue = Arc::new(JobQueue::with_journal(JobJournal::new(&path)).unwrap());

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for n in 0..20 {
                        queue
                            .enqueue("noop", &serde_json::json!({"t": t, "n": n}), Duration::from_secs(5))
                            .unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(queue.job_count(), 160);
        assert_eq!(JobJournal::new(&path).load().unwrap().len(), 160);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_journal_writes_off_runtime_then_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let queue = Arc::new(JobQueue::with_journal(JobJournal::new(&path)).unwrap());

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        queue.enqueue("noop", &(), Duration::from_secs(5)).unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        queue.flush().unwrap();
        let restored = JobQueue::with_journal(JobJournal::new(&path)).unwrap();
        assert_eq!(restored.job_count(), 100);
        assert_eq!(restored.pending_jobs().len(), 100);
    }

    #[test]
    fn test_missing_journal_is_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = JobQueue::with_journal(JobJournal::new(dir.path().join("none.json"))).unwrap();
        assert_eq!(queue.job_count(), 0);
    }
}
