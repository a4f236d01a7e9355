//! The job executor (C7/C8): runs one job instance through its full
//! lifecycle — discover, partition into batches, claim and process batches
//! across a worker pool, aggregate, and finalize.
//!
//! Concurrency model: `definition.max_workers` threads independently loop
//! `claim_next`/process/`complete`-or-`fail` until no pending batch
//! remains; each worker processes its claimed batch's items sequentially,
//! so the crate's parallelism comes from however many batches are in
//! flight at once rather than a second fan-out inside one batch (simpler to
//! reason about, and batch size already controls item-level granularity).
//! Grounded on `other_examples/926ffa34_shirk33y-lv__src-jobs.rs.rs`'s
//! claim-loop shape, backed by this crate's SQLite `IMMEDIATE`-transaction
//! claim instead of an in-memory queue.

use crate::catalog::model::{Job, JobStatus};
use crate::catalog::CatalogGateway;
use crate::error::JobError;
use crate::jobs::batch::BatchManager;
use crate::jobs::definition::{JobContext, JobDefinition};
use crate::jobs::publisher::ProgressPublisher;
use crate::jobs::store::JobStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    batches: BatchManager,
    publisher: Arc<ProgressPublisher>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn JobStore>, publisher: Arc<ProgressPublisher>) -> Self {
        let batches = BatchManager::new(store.clone());
        Self { store, batches, publisher }
    }

    /// Run `job` to completion (or until `ctx` is cancelled), updating its
    /// persisted status/progress/result as it goes. Blocking: intended to
    /// be called from one of the controller's dispatcher threads.
    ///
    /// If `job` already has batches recorded (a process restart resumed it
    /// via `JobController::reclaim_on_startup`), discovery is skipped and
    /// the worker pool picks up wherever the stale batches were reclaimed
    /// to `pending`.
    pub fn run(&self, job: &Job, definition: &Arc<JobDefinition>, ctx: &JobContext, catalog: &dyn CatalogGateway) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            self.store.update_job_status(&job.id, JobStatus::Cancelled, None)?;
            self.publisher.forget(&job.id);
            return Ok(());
        }

        self.store.update_job_status(&job.id, JobStatus::Running, None)?;
        info!(job_id = %job.id, job_type = %job.job_type, "job started");

        let existing_batches = self.batches.list_batches(&job.id).map_err(JobError::Batch)?;
        let total_items = if existing_batches.is_empty() {
            let discovered = match (definition.discover)(ctx) {
                Ok(items) => items,
                Err(e) => {
                    self.store.update_job_status(&job.id, JobStatus::Failed, Some(&e.to_string()))?;
                    return Err(e);
                }
            };

            let created = self
                .batches
                .create_batches(&job.id, ctx.catalog_id.as_deref(), job.job_type.as_str(), &discovered, definition.batch_size)
                .map_err(JobError::Batch)?;
            info!(job_id = %job.id, batches = created.len(), items = discovered.len(), "discovery complete");
            discovered.len()
        } else {
            info!(job_id = %job.id, batches = existing_batches.len(), "resuming job with previously discovered batches");
            existing_batches.iter().map(|b| b.items_count).sum()
        };

        self.drain_batches(job, definition, ctx, total_items)?;

        let aggregate = self.batches.aggregate(&job.id).map_err(JobError::Batch)?;
        if ctx.is_cancelled() {
            self.batches.cancel_job_batches(&job.id).map_err(JobError::Batch)?;
            self.store.update_job_status(&job.id, JobStatus::Cancelled, None)?;
            self.publisher.forget(&job.id);
            return Ok(());
        }

        // spec.md §7: "job terminates success if any batch completed, else
        // failed" — a batch-fatal error only fails the whole job when it
        // leaves nothing for finalize to aggregate over. Otherwise finalize
        // runs on the completed batches' results same as any other job.
        if aggregate.failed > 0 && aggregate.completed == 0 {
            let message = format!("{} of {} batches failed", aggregate.failed, aggregate.total);
            self.store.update_job_status(&job.id, JobStatus::Failed, Some(&message))?;
            self.publisher.forget(&job.id);
            return Err(JobError::FinalizeFailed(message));
        }

        let all_batches = self.batches.list_batches(&job.id).map_err(JobError::Batch)?;
        let all_results: Vec<Value> = all_batches.iter().flat_map(|b| b.results.clone()).collect();

        let result = if let Some(finalize) = &definition.finalize {
            match finalize(ctx, &all_results) {
                Ok(value) => value,
                Err(e) => {
                    self.store.update_job_status(&job.id, JobStatus::Failed, Some(&e.to_string()))?;
                    self.publisher.forget(&job.id);
                    return Err(e);
                }
            }
        } else {
            Value::Array(all_results)
        };

        self.store.update_job_result(&job.id, result)?;
        self.store.update_job_status(&job.id, JobStatus::Success, None)?;
        self.publisher.forget(&job.id);
        info!(job_id = %job.id, "job succeeded");
        let _ = catalog.publish(&format!("job:{}", job.id), &serde_json::json!({ "status": "success" }));
        Ok(())
    }

    fn drain_batches(&self, job: &Job, definition: &Arc<JobDefinition>, ctx: &JobContext, total_items: usize) -> Result<(), JobError> {
        let worker_count = definition.max_workers.max(1);
        std::thread::scope(|scope| {
            for worker_index in 0..worker_count {
                let worker_id = format!("{}-{worker_index}-{}", job.id, Uuid::new_v4());
                scope.spawn(move || self.worker_loop(job, definition, ctx, &worker_id, total_items));
            }
        });
        Ok(())
    }

    fn worker_loop(&self, job: &Job, definition: &Arc<JobDefinition>, ctx: &JobContext, worker_id: &str, total_items: usize) {
        loop {
            if ctx.is_cancelled() {
                return;
            }

            let claimed = match self.batches.claim_next(&job.id, worker_id) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "claim failed");
                    return;
                }
            };
            let Some(batch) = claimed else { return };

            let mut results = Vec::with_capacity(batch.items_count);
            let mut errors = Vec::new();
            let mut success = 0usize;

            for (index, item) in batch.work_items.iter().enumerate() {
                if ctx.is_cancelled() {
                    break;
                }
                match process_item_with_retry(definition, ctx, item) {
                    Ok(value) => {
                        results.push(value);
                        success += 1;
                    }
                    // spec.md §4.8 step 3 / §7: a batch-fatal error (gateway
                    // down, contract violation, unhandled panic) fails the
                    // whole batch and this worker exits; it is never folded
                    // into the batch's per-item `errors`. Everything else
                    // (bad file, decode failure, timeout) is per-item and
                    // never fails the batch, even if every item errors.
                    Err(e) if e.is_batch_fatal() => {
                        let message = e.to_string();
                        warn!(batch_id = %batch.id, error = %message, "batch-fatal error, failing batch");
                        if let Err(fail_err) = self.batches.fail(&batch.id, &message, &errors) {
                            warn!(batch_id = %batch.id, error = %fail_err, "could not mark batch failed");
                        }
                        let aggregate = self.batches.aggregate(&job.id).unwrap_or_default();
                        self.publisher.report(
                            ctx.catalog.as_ref(),
                            &job.id,
                            aggregate.total,
                            aggregate.completed,
                            aggregate.failed,
                            aggregate.processed,
                            total_items,
                            true,
                        );
                        return;
                    }
                    Err(e) => errors.push(format!("item {index}: {e}")),
                }

                let processed = success + errors.len();
                if let Err(e) = self.batches.report_progress(&batch.id, processed, success, errors.len()) {
                    warn!(batch_id = %batch.id, error = %e, "progress report failed");
                }

                let aggregate = self.batches.aggregate(&job.id).unwrap_or_default();
                self.publisher.report(
                    ctx.catalog.as_ref(),
                    &job.id,
                    aggregate.total,
                    aggregate.completed,
                    aggregate.failed,
                    aggregate.processed,
                    total_items,
                    false,
                );
            }

            if ctx.is_cancelled() {
                // Leave this batch `running`; the executor's post-drain
                // `cancel_job_batches` sweep is the sole writer of the
                // `cancelled` terminal state (spec.md §5: cancellation
                // marks non-terminal batches cancelled, it does not route
                // through `fail`).
                return;
            }

            if let Err(e) = self.batches.complete(&batch.id, &results) {
                warn!(batch_id = %batch.id, error = %e, "could not finalize batch status");
            }

            let aggregate = self.batches.aggregate(&job.id).unwrap_or_default();
            self.publisher.report(
                ctx.catalog.as_ref(),
                &job.id,
                aggregate.total,
                aggregate.completed,
                aggregate.failed,
                aggregate.processed,
                total_items,
                true,
            );
        }
    }
}

fn process_item_with_retry(definition: &Arc<JobDefinition>, ctx: &JobContext, item: &Value) -> Result<Value, JobError> {
    let mut attempt: u32 = 0;
    loop {
        let outcome = match definition.timeout_per_item {
            Some(timeout) => process_item_with_timeout(definition, ctx, item, timeout),
            None => (definition.process)(ctx, item),
        };

        match outcome {
            Ok(value) => return Ok(value),
            // Batch-fatal errors (gateway down, contract violation) are not
            // retried — retrying against a broken gateway just delays the
            // `fail` the caller is about to issue.
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                if !definition.retry_on_failure || attempt >= definition.max_retries {
                    return Err(e);
                }
                let delay = (RETRY_BASE_DELAY * 2u32.pow(attempt)).min(RETRY_MAX_DELAY);
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

fn process_item_with_timeout(definition: &Arc<JobDefinition>, ctx: &JobContext, item: &Value, timeout: Duration) -> Result<Value, JobError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let definition = definition.clone();
    let ctx = ctx.clone();
    let item = item.clone();
    // A detached (not scoped) thread: owning clones of everything it needs
    // lets this function return as soon as `recv_timeout` expires, without
    // waiting for `process` to finish — `thread::scope` would block here
    // joining the spawned thread, which defeats the timeout. The item is
    // marked as an error and the worker moves on to the next one while this
    // thread finishes in the background; its eventual result has nowhere
    // left to go once `rx` is dropped, so it's just discarded.
    std::thread::spawn(move || {
        let result = (definition.process)(&ctx, &item);
        let _ = tx.send(result);
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(JobError::ItemTimeout(timeout)),
    }
}
