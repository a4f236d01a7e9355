//! The job controller (C9): the long-lived process-facing surface —
//! submit/cancel/get/list — that owns a small fixed pool of dispatcher
//! threads and drives one [`JobExecutor`] per job to completion.
//!
//! The pool bounds *concurrent jobs*, not total jobs (spec.md §5): each
//! dispatcher thread pulls one job id off a shared `crossbeam-channel` and
//! runs it to completion before taking the next, exactly as `jobs::executor`
//! bounds per-job *workers* by `max_workers`. Default pool size is 2
//! (spec.md §4.9).

use crate::catalog::model::{Job, JobStatus};
use crate::catalog::sqlite::SqliteCatalog;
use crate::catalog::CatalogGateway;
use crate::error::JobError;
use crate::jobs::batch::BatchManager;
use crate::jobs::definition::JobContext;
use crate::jobs::executor::JobExecutor;
use crate::jobs::publisher::{JobProgress, ProgressPublisher};
use crate::jobs::registry::JobRegistry;
use crate::jobs::store::JobStore;
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_POOL_SIZE: usize = 2;

/// Owns job submission, cancellation, and dispatch for one catalog
/// process. Cheap to clone the handles it hands out (`Arc`-backed); the
/// controller itself is meant to be constructed once per process and kept
/// alive for its lifetime.
pub struct JobController {
    catalog: Arc<SqliteCatalog>,
    registry: Arc<JobRegistry>,
    publisher: Arc<ProgressPublisher>,
    batches: BatchManager,
    sender: Sender<String>,
    contexts: Arc<Mutex<HashMap<String, JobContext>>>,
}

impl JobController {
    /// Build a controller with the default dispatcher pool size (2),
    /// reclaiming any jobs left `running` by an unclean shutdown before
    /// accepting new submissions.
    pub fn new(catalog: Arc<SqliteCatalog>, registry: Arc<JobRegistry>) -> Self {
        Self::with_pool_size(catalog, registry, DEFAULT_POOL_SIZE)
    }

    pub fn with_pool_size(catalog: Arc<SqliteCatalog>, registry: Arc<JobRegistry>, pool_size: usize) -> Self {
        let publisher = Arc::new(ProgressPublisher::new());
        let store: Arc<dyn JobStore> = catalog.clone();
        let batches = BatchManager::new(store.clone());
        let executor = Arc::new(JobExecutor::new(store, publisher.clone()));
        let (sender, receiver) = unbounded::<String>();
        let contexts: Arc<Mutex<HashMap<String, JobContext>>> = Arc::new(Mutex::new(HashMap::new()));

        let controller = Self { catalog, registry, publisher, batches, sender, contexts };
        controller.reclaim_on_startup();
        controller.spawn_dispatchers(pool_size.max(1), receiver, executor);
        controller
    }

    fn spawn_dispatchers(&self, pool_size: usize, receiver: Receiver<String>, executor: Arc<JobExecutor>) {
        for worker_index in 0..pool_size {
            let receiver = receiver.clone();
            let catalog = self.catalog.clone();
            let registry = self.registry.clone();
            let executor = executor.clone();
            let contexts = self.contexts.clone();
            thread::Builder::new()
                .name(format!("job-dispatcher-{worker_index}"))
                .spawn(move || {
                    for job_id in receiver.iter() {
                        dispatch_one(&catalog, &registry, &executor, &contexts, &job_id);
                    }
                })
                .expect("failed to spawn job dispatcher thread");
        }
    }

    /// On restart, reclaim batches whose worker heartbeat went stale and
    /// re-enqueue any job left `running` so its executor resumes against
    /// the reclaimed batches (spec.md §5 restartability).
    fn reclaim_on_startup(&self) {
        match self.batches.reclaim_stale() {
            Ok(0) => {}
            Ok(n) => info!(reclaimed_batches = n, "reclaimed stale batches on startup"),
            Err(e) => warn!(error = %e, "failed to reclaim stale batches on startup"),
        }

        let running = match self.catalog.list_running_jobs() {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "failed to list running jobs on startup");
                return;
            }
        };

        for job in running {
            let ctx = JobContext::new(self.catalog.clone(), job.catalog_id.clone(), job.parameters.clone());
            self.contexts.lock().unwrap_or_else(|e| e.into_inner()).insert(job.id.clone(), ctx);
            info!(job_id = %job.id, job_type = %job.job_type, "resuming job after restart");
            let _ = self.sender.send(job.id.clone());
        }
    }

    /// Validate `job_type` is registered, create the `Job` row in
    /// `pending`, and hand it to the dispatcher pool. Returns the new
    /// job's id.
    pub fn submit(&self, job_type: &str, catalog_id: Option<String>, parameters: Value) -> Result<String, JobError> {
        self.registry.get(job_type)?;

        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let job = Job {
            id: job_id.clone(),
            catalog_id: catalog_id.clone(),
            job_type: job_type.to_string(),
            status: JobStatus::Pending,
            parameters: parameters.clone(),
            progress: Value::Null,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.catalog.create_job(&job)?;

        let ctx = JobContext::new(self.catalog.clone(), catalog_id, parameters);
        self.contexts.lock().unwrap_or_else(|e| e.into_inner()).insert(job_id.clone(), ctx);

        self.sender
            .send(job_id.clone())
            .map_err(|_| JobError::DiscoveryFailed("job dispatcher channel is closed".to_string()))?;

        Ok(job_id)
    }

    /// Request cancellation of a non-terminal job. Cooperative: the
    /// executor notices the flag between items and at each suspension
    /// point (spec.md §5). Batches already non-terminal are marked
    /// `cancelled` immediately so `aggregate`/`list_batches` reflect the
    /// request without waiting on the executor.
    pub fn cancel(&self, job_id: &str) -> Result<(), JobError> {
        let job = self.catalog.get_job(job_id)?.ok_or_else(|| JobError::NotFound { job_id: job_id.to_string() })?;
        if job.status.is_terminal() {
            return Err(JobError::AlreadyTerminal { job_id: job_id.to_string(), status: job.status.to_string() });
        }

        if let Some(ctx) = self.contexts.lock().unwrap_or_else(|e| e.into_inner()).get(job_id) {
            ctx.request_cancel();
        }
        self.batches.cancel_job_batches(job_id).map_err(JobError::Batch)?;
        info!(job_id, "cancellation requested");
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<Job>, JobError> {
        self.catalog.get_job(job_id)
    }

    pub fn list(&self, catalog_id: Option<&str>, status: Option<JobStatus>) -> Result<Vec<Job>, JobError> {
        self.catalog.list_jobs(catalog_id, status)
    }

    /// Subscribe to every (post-debounce) progress event this controller's
    /// dispatchers emit, across all jobs.
    pub fn subscribe_progress(&self) -> Receiver<JobProgress> {
        self.publisher.subscribe()
    }

    /// The most recent retained progress snapshots for one job.
    pub fn progress_history(&self, job_id: &str) -> Vec<JobProgress> {
        self.publisher.history(job_id)
    }
}

fn dispatch_one(
    catalog: &Arc<SqliteCatalog>,
    registry: &Arc<JobRegistry>,
    executor: &Arc<JobExecutor>,
    contexts: &Arc<Mutex<HashMap<String, JobContext>>>,
    job_id: &str,
) {
    let job = match catalog.get_job(job_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!(job_id, "dispatched job id has no row; dropping");
            return;
        }
        Err(e) => {
            warn!(job_id, error = %e, "failed to load job for dispatch");
            return;
        }
    };

    let definition = match registry.get(&job.job_type) {
        Ok(definition) => definition,
        Err(e) => {
            let _ = catalog.update_job_status(job_id, JobStatus::Failed, Some(&e.to_string()));
            return;
        }
    };

    let ctx = {
        let guard = contexts.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(job_id).cloned()
    };
    let Some(ctx) = ctx else {
        warn!(job_id, "dispatched job id has no context; dropping");
        return;
    };

    if let Err(e) = executor.run(&job, &definition, &ctx, catalog.as_ref() as &dyn CatalogGateway) {
        warn!(job_id, error = %e, "job execution failed");
    }

    contexts.lock().unwrap_or_else(|e| e.into_inner()).remove(job_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::registry::JobRegistry;
    use serde_json::json;
    use std::time::Duration;

    fn controller() -> (Arc<SqliteCatalog>, JobController) {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        catalog.create_catalog("cat1", "Test", &["/photos".to_string()]).unwrap();
        let registry = Arc::new(JobRegistry::with_builtin_jobs());
        let controller = JobController::with_pool_size(catalog.clone(), registry, 1);
        (catalog, controller)
    }

    #[test]
    fn submit_rejects_unknown_job_type() {
        let (_catalog, controller) = controller();
        let result = controller.submit("not_a_real_job", Some("cat1".to_string()), Value::Null);
        assert!(result.is_err());
    }

    #[test]
    fn submit_runs_scan_job_to_success() {
        let (_catalog, controller) = controller();
        let job_id = controller.submit("scan", Some("cat1".to_string()), json!({})).unwrap();

        let mut job = controller.get(&job_id).unwrap().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !job.status.is_terminal() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
            job = controller.get(&job_id).unwrap().unwrap();
        }

        assert_eq!(job.status, JobStatus::Success);
    }

    #[test]
    fn cancel_unknown_job_is_not_found() {
        let (_catalog, controller) = controller();
        let result = controller.cancel("nonexistent");
        assert!(matches!(result, Err(JobError::NotFound { .. })));
    }

    #[test]
    fn cancel_already_terminal_job_is_an_error() {
        let (_catalog, controller) = controller();
        let job_id = controller.submit("scan", Some("cat1".to_string()), json!({})).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !controller.get(&job_id).unwrap().unwrap().status.is_terminal() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }

        let result = controller.cancel(&job_id);
        assert!(matches!(result, Err(JobError::AlreadyTerminal { .. })));
    }

    #[test]
    fn list_filters_by_catalog_and_status() {
        let (_catalog, controller) = controller();
        controller.submit("scan", Some("cat1".to_string()), json!({})).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let jobs = controller.list(Some("cat1"), Some(JobStatus::Success)).unwrap();
            if !jobs.is_empty() || std::time::Instant::now() >= deadline {
                assert_eq!(jobs.len(), 1);
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}
