//! Durable persistence for `Job`/`JobBatch` rows (C5's claim/complete/fail
//! protocol and C9's job lifecycle CRUD).
//!
//! `JobStore` is deliberately separate from `catalog::CatalogGateway`:
//! the gateway is the narrow per-image/group surface spec.md §4.4 hands to
//! job *processors*; this trait is the coordinator-facing surface the
//! executor and controller use to track jobs and batches themselves. Both
//! happen to be implemented by the same `SqliteCatalog` connection because
//! they share one database file, but a deployment could split them.

use crate::catalog::model::{BatchStatus, Job, JobBatch, JobStatus};
use crate::catalog::sqlite::SqliteCatalog;
use crate::error::{BatchError, CatalogError, JobError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Aggregate batch counters for one job (spec.md §4.5 `aggregate`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAggregate {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub processed: usize,
    pub success: usize,
    pub error: usize,
}

impl BatchAggregate {
    /// A job is terminal iff every one of its batches is terminal
    /// (spec.md §4.5 invariant 2). An empty job (zero batches) counts as
    /// terminal so `discover` returning nothing can still finish the job.
    pub fn all_terminal(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

/// Durable store for jobs and job batches.
pub trait JobStore: Send + Sync {
    fn create_job(&self, job: &Job) -> Result<(), JobError>;
    fn get_job(&self, job_id: &str) -> Result<Option<Job>, JobError>;
    fn list_jobs(&self, catalog_id: Option<&str>, status: Option<JobStatus>) -> Result<Vec<Job>, JobError>;
    fn list_running_jobs(&self) -> Result<Vec<Job>, JobError>;
    fn update_job_status(&self, job_id: &str, status: JobStatus, error: Option<&str>) -> Result<(), JobError>;
    fn update_job_progress(&self, job_id: &str, progress: Value) -> Result<(), JobError>;
    fn update_job_result(&self, job_id: &str, result: Value) -> Result<(), JobError>;

    fn create_batches(
        &self,
        parent_job_id: &str,
        catalog_id: Option<&str>,
        job_type: &str,
        items: &[Value],
        batch_size: usize,
    ) -> Result<Vec<JobBatch>, BatchError>;
    fn claim_next(&self, parent_job_id: &str, worker_id: &str) -> Result<Option<JobBatch>, BatchError>;
    fn report_progress(&self, batch_id: &str, processed: usize, success: usize, error: usize) -> Result<(), BatchError>;
    fn complete(&self, batch_id: &str, results: &[Value]) -> Result<(), BatchError>;
    fn fail(&self, batch_id: &str, error_message: &str, errors: &[String]) -> Result<(), BatchError>;
    fn cancel_job_batches(&self, parent_job_id: &str) -> Result<(), BatchError>;
    fn aggregate(&self, parent_job_id: &str) -> Result<BatchAggregate, BatchError>;
    /// Every batch belonging to a job, in batch-number order — the
    /// executor's finalizer input.
    fn list_batches(&self, parent_job_id: &str) -> Result<Vec<JobBatch>, BatchError>;
    /// Reclaim `running` batches whose `heartbeat_at` is older than
    /// `stale_after`, transitioning them back to `pending` (spec.md §5
    /// restartability). Returns the number reclaimed.
    fn reclaim_stale(&self, stale_after: Duration) -> Result<usize, BatchError>;
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let status: String = row.get(3)?;
    let parameters: String = row.get(4)?;
    let progress: String = row.get(5)?;
    let result: Option<String> = row.get(6)?;
    Ok(Job {
        id: row.get(0)?,
        catalog_id: row.get(1)?,
        job_type: row.get(2)?,
        status: status.parse().unwrap_or(JobStatus::Pending),
        parameters: serde_json::from_str(&parameters).unwrap_or(Value::Null),
        progress: serde_json::from_str(&progress).unwrap_or(Value::Null),
        result: result.and_then(|r| serde_json::from_str(&r).ok()),
        error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_batch(row: &rusqlite::Row) -> rusqlite::Result<JobBatch> {
    let status: String = row.get(6)?;
    let work_items: String = row.get(7)?;
    let results: String = row.get(13)?;
    let errors: String = row.get(15)?;
    Ok(JobBatch {
        id: row.get(0)?,
        parent_job_id: row.get(1)?,
        catalog_id: row.get(2)?,
        batch_number: row.get::<_, i64>(3)? as usize,
        total_batches: row.get::<_, i64>(4)? as usize,
        job_type: row.get(5)?,
        status: status.parse().unwrap_or(BatchStatus::Pending),
        work_items: serde_json::from_str(&work_items).unwrap_or_default(),
        items_count: row.get::<_, i64>(8)? as usize,
        worker_id: row.get(9)?,
        processed_count: row.get::<_, i64>(10)? as usize,
        success_count: row.get::<_, i64>(11)? as usize,
        error_count: row.get::<_, i64>(12)? as usize,
        results: serde_json::from_str(&results).unwrap_or_default(),
        error_message: row.get(14)?,
        errors: serde_json::from_str(&errors).unwrap_or_default(),
        created_at: row.get(16)?,
        started_at: row.get(17)?,
        completed_at: row.get(18)?,
        heartbeat_at: row.get(19)?,
    })
}

const BATCH_COLUMNS: &str = "id, parent_job_id, catalog_id, batch_number, total_batches, job_type,
    status, work_items, items_count, worker_id, processed_count, success_count, error_count,
    results, error_message, errors, created_at, started_at, completed_at, heartbeat_at";

impl JobStore for SqliteCatalog {
    fn create_job(&self, job: &Job) -> Result<(), JobError> {
        let conn = self.lock().map_err(JobError::Catalog)?;
        let parameters = serde_json::to_string(&job.parameters).unwrap_or_default();
        let progress = serde_json::to_string(&job.progress).unwrap_or_default();
        conn.execute(
            "INSERT INTO jobs (id, catalog_id, job_type, status, parameters, progress, result, error, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                job.id,
                job.catalog_id,
                job.job_type,
                job.status.to_string(),
                parameters,
                progress,
                job.result.as_ref().map(|r| r.to_string()),
                job.error,
                job.created_at,
                job.updated_at,
            ],
        )
        .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.lock().map_err(JobError::Catalog)?;
        conn.query_row(
            "SELECT id, catalog_id, job_type, status, parameters, progress, result, error, created_at, updated_at
             FROM jobs WHERE id = ?1",
            [job_id],
            row_to_job,
        )
        .optional()
        .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))
    }

    fn list_jobs(&self, catalog_id: Option<&str>, status: Option<JobStatus>) -> Result<Vec<Job>, JobError> {
        let conn = self.lock().map_err(JobError::Catalog)?;
        let sql = "SELECT id, catalog_id, job_type, status, parameters, progress, result, error, created_at, updated_at
                    FROM jobs WHERE (?1 IS NULL OR catalog_id = ?1) AND (?2 IS NULL OR status = ?2)
                    ORDER BY created_at DESC";
        let mut stmt = conn.prepare(sql).map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        let rows = stmt
            .query_map(params![catalog_id, status.map(|s| s.to_string())], row_to_job)
            .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))
    }

    fn list_running_jobs(&self) -> Result<Vec<Job>, JobError> {
        self.list_jobs(None, Some(JobStatus::Running))
    }

    fn update_job_status(&self, job_id: &str, status: JobStatus, error: Option<&str>) -> Result<(), JobError> {
        let conn = self.lock().map_err(JobError::Catalog)?;
        let updated = conn
            .execute(
                "UPDATE jobs SET status = ?1, error = COALESCE(?2, error), updated_at = ?3 WHERE id = ?4",
                params![status.to_string(), error, Utc::now(), job_id],
            )
            .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        if updated == 0 {
            return Err(JobError::NotFound { job_id: job_id.to_string() });
        }
        Ok(())
    }

    fn update_job_progress(&self, job_id: &str, progress: Value) -> Result<(), JobError> {
        let conn = self.lock().map_err(JobError::Catalog)?;
        conn.execute(
            "UPDATE jobs SET progress = ?1, updated_at = ?2 WHERE id = ?3",
            params![progress.to_string(), Utc::now(), job_id],
        )
        .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    fn update_job_result(&self, job_id: &str, result: Value) -> Result<(), JobError> {
        let conn = self.lock().map_err(JobError::Catalog)?;
        conn.execute(
            "UPDATE jobs SET result = ?1, updated_at = ?2 WHERE id = ?3",
            params![result.to_string(), Utc::now(), job_id],
        )
        .map_err(|e| JobError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    fn create_batches(
        &self,
        parent_job_id: &str,
        catalog_id: Option<&str>,
        job_type: &str,
        items: &[Value],
        batch_size: usize,
    ) -> Result<Vec<JobBatch>, BatchError> {
        let batch_size = batch_size.max(1);
        let chunks: Vec<&[Value]> = items.chunks(batch_size).collect();
        let total_batches = chunks.len();
        let now = Utc::now();

        let mut conn = self.lock().map_err(BatchError::Catalog)?;
        let tx = conn.transaction().map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;

        let mut created = Vec::with_capacity(total_batches);
        for (batch_number, chunk) in chunks.into_iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            let work_items: Vec<Value> = chunk.to_vec();
            let work_items_json = serde_json::to_string(&work_items).unwrap_or_default();

            tx.execute(
                "INSERT INTO job_batches (
                    id, parent_job_id, catalog_id, batch_number, total_batches, job_type,
                    status, work_items, items_count, created_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    id,
                    parent_job_id,
                    catalog_id,
                    batch_number as i64,
                    total_batches as i64,
                    job_type,
                    BatchStatus::Pending.to_string(),
                    work_items_json,
                    work_items.len() as i64,
                    now,
                ],
            )
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;

            created.push(JobBatch {
                id,
                parent_job_id: parent_job_id.to_string(),
                catalog_id: catalog_id.map(String::from),
                batch_number,
                total_batches,
                job_type: job_type.to_string(),
                status: BatchStatus::Pending,
                work_items,
                items_count: chunk.len(),
                worker_id: None,
                processed_count: 0,
                success_count: 0,
                error_count: 0,
                results: Vec::new(),
                error_message: None,
                errors: Vec::new(),
                created_at: now,
                started_at: None,
                completed_at: None,
                heartbeat_at: None,
            });
        }

        tx.commit().map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(created)
    }

    fn claim_next(&self, parent_job_id: &str, worker_id: &str) -> Result<Option<JobBatch>, BatchError> {
        let mut conn = self.lock().map_err(BatchError::Catalog)?;
        // IMMEDIATE acquires SQLite's single writer lock up front: with a
        // single-writer embedded database this is the practical
        // equivalent of `SELECT ... FOR UPDATE SKIP LOCKED` — it rules out
        // two threads both observing the same `pending` row before either
        // commits its claim.
        let tx = conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(|e| BatchError::ClaimFailed(e.to_string()))?;

        let candidate: Option<String> = tx
            .query_row(
                "SELECT id FROM job_batches WHERE parent_job_id = ?1 AND status = ?2
                 ORDER BY batch_number LIMIT 1",
                params![parent_job_id, BatchStatus::Pending.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| BatchError::ClaimFailed(e.to_string()))?;

        let Some(batch_id) = candidate else {
            tx.commit().map_err(|e| BatchError::ClaimFailed(e.to_string()))?;
            return Ok(None);
        };

        let now = Utc::now();
        let updated = tx
            .execute(
                "UPDATE job_batches SET status = ?1, worker_id = ?2, started_at = ?3, heartbeat_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![BatchStatus::Running.to_string(), worker_id, now, batch_id, BatchStatus::Pending.to_string()],
            )
            .map_err(|e| BatchError::ClaimFailed(e.to_string()))?;

        if updated == 0 {
            // Lost the race (shouldn't happen under IMMEDIATE, but stay
            // defensive): report no batch claimed rather than return a
            // stale row.
            tx.commit().map_err(|e| BatchError::ClaimFailed(e.to_string()))?;
            return Ok(None);
        }

        let batch = tx
            .query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM job_batches WHERE id = ?1"),
                [&batch_id],
                row_to_batch,
            )
            .map_err(|e| BatchError::ClaimFailed(e.to_string()))?;

        tx.commit().map_err(|e| BatchError::ClaimFailed(e.to_string()))?;
        Ok(Some(batch))
    }

    fn report_progress(&self, batch_id: &str, processed: usize, success: usize, error: usize) -> Result<(), BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        // Monotonic: never let a counter move backwards even if called
        // out of order by two racing notifications.
        let updated = conn
            .execute(
                "UPDATE job_batches SET
                    processed_count = MAX(processed_count, ?1),
                    success_count = MAX(success_count, ?2),
                    error_count = MAX(error_count, ?3),
                    heartbeat_at = ?4
                 WHERE id = ?5",
                params![processed as i64, success as i64, error as i64, Utc::now(), batch_id],
            )
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        if updated == 0 {
            return Err(BatchError::NotFound { batch_id: batch_id.to_string() });
        }
        Ok(())
    }

    fn complete(&self, batch_id: &str, results: &[Value]) -> Result<(), BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        let current_status: Option<String> = conn
            .query_row("SELECT status FROM job_batches WHERE id = ?1", [batch_id], |r| r.get(0))
            .optional()
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        let Some(current_status) = current_status else {
            return Err(BatchError::NotFound { batch_id: batch_id.to_string() });
        };
        let status: BatchStatus = current_status.parse().unwrap_or(BatchStatus::Pending);
        if status.is_terminal() {
            return Ok(()); // idempotent
        }

        let results_json = serde_json::to_string(results).unwrap_or_default();
        conn.execute(
            "UPDATE job_batches SET status = ?1, results = ?2, completed_at = ?3 WHERE id = ?4",
            params![BatchStatus::Completed.to_string(), results_json, Utc::now(), batch_id],
        )
        .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    fn fail(&self, batch_id: &str, error_message: &str, errors: &[String]) -> Result<(), BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        let current_status: Option<String> = conn
            .query_row("SELECT status FROM job_batches WHERE id = ?1", [batch_id], |r| r.get(0))
            .optional()
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        let Some(current_status) = current_status else {
            return Err(BatchError::NotFound { batch_id: batch_id.to_string() });
        };
        let status: BatchStatus = current_status.parse().unwrap_or(BatchStatus::Pending);
        if status.is_terminal() {
            return Ok(()); // idempotent
        }

        let errors_json = serde_json::to_string(&errors.iter().take(100).collect::<Vec<_>>()).unwrap_or_default();
        conn.execute(
            "UPDATE job_batches SET status = ?1, error_message = ?2, errors = ?3, completed_at = ?4 WHERE id = ?5",
            params![BatchStatus::Failed.to_string(), error_message, errors_json, Utc::now(), batch_id],
        )
        .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    fn cancel_job_batches(&self, parent_job_id: &str) -> Result<(), BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        conn.execute(
            "UPDATE job_batches SET status = ?1, completed_at = ?2
             WHERE parent_job_id = ?3 AND status NOT IN (?4, ?5, ?6)",
            params![
                BatchStatus::Cancelled.to_string(),
                Utc::now(),
                parent_job_id,
                BatchStatus::Completed.to_string(),
                BatchStatus::Failed.to_string(),
                BatchStatus::Cancelled.to_string(),
            ],
        )
        .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(())
    }

    fn aggregate(&self, parent_job_id: &str) -> Result<BatchAggregate, BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        let mut stmt = conn
            .prepare(
                "SELECT status, COUNT(*), COALESCE(SUM(processed_count),0), COALESCE(SUM(success_count),0), COALESCE(SUM(error_count),0)
                 FROM job_batches WHERE parent_job_id = ?1 GROUP BY status",
            )
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;

        let mut aggregate = BatchAggregate::default();
        let rows = stmt
            .query_map([parent_job_id], |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                let processed: i64 = row.get(2)?;
                let success: i64 = row.get(3)?;
                let error: i64 = row.get(4)?;
                Ok((status, count as usize, processed as usize, success as usize, error as usize))
            })
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;

        for row in rows {
            let (status, count, processed, success, error) = row.map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
            aggregate.total += count;
            aggregate.processed += processed;
            aggregate.success += success;
            aggregate.error += error;
            match status.parse::<BatchStatus>() {
                Ok(BatchStatus::Pending) => aggregate.pending += count,
                Ok(BatchStatus::Running) => aggregate.running += count,
                Ok(BatchStatus::Completed) => aggregate.completed += count,
                Ok(BatchStatus::Failed) => aggregate.failed += count,
                Ok(BatchStatus::Cancelled) => aggregate.cancelled += count,
                Err(_) => {}
            }
        }

        Ok(aggregate)
    }

    fn list_batches(&self, parent_job_id: &str) -> Result<Vec<JobBatch>, BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {BATCH_COLUMNS} FROM job_batches WHERE parent_job_id = ?1 ORDER BY batch_number"))
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        let rows = stmt
            .query_map([parent_job_id], row_to_batch)
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))
    }

    fn reclaim_stale(&self, stale_after: Duration) -> Result<usize, BatchError> {
        let conn = self.lock().map_err(BatchError::Catalog)?;
        let cutoff: DateTime<Utc> = Utc::now() - ChronoDuration::from_std(stale_after).unwrap_or(ChronoDuration::seconds(60));

        let updated = conn
            .execute(
                "UPDATE job_batches SET status = ?1, worker_id = NULL, started_at = NULL, heartbeat_at = NULL
                 WHERE status = ?2 AND (heartbeat_at IS NULL OR heartbeat_at < ?3)",
                params![BatchStatus::Pending.to_string(), BatchStatus::Running.to_string(), cutoff],
            )
            .map_err(|e| BatchError::Catalog(CatalogError::QueryFailed(e.to_string())))?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::JobStatus;

    fn new_job(id: &str) -> Job {
        let now = Utc::now();
        Job {
            id: id.to_string(),
            catalog_id: Some("cat1".to_string()),
            job_type: "scan".to_string(),
            status: JobStatus::Pending,
            parameters: Value::Null,
            progress: Value::Null,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_fetch_job() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_job(&new_job("j1")).unwrap();

        let job = store.get_job("j1").unwrap().unwrap();
        assert_eq!(job.job_type, "scan");
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn claim_next_is_single_writer() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_job(&new_job("j1")).unwrap();
        let items: Vec<Value> = (0..5).map(|i| serde_json::json!({ "id": i })).collect();
        store.create_batches("j1", Some("cat1"), "scan", &items, 2).unwrap();

        let first = store.claim_next("j1", "worker-a").unwrap().unwrap();
        let second = store.claim_next("j1", "worker-b").unwrap().unwrap();
        assert_ne!(first.id, second.id);

        // Claiming again with only one pending batch left works, and once
        // exhausted returns None.
        let third = store.claim_next("j1", "worker-a").unwrap();
        assert!(third.is_some());
        assert!(store.claim_next("j1", "worker-a").unwrap().is_none());
    }

    #[test]
    fn complete_and_fail_are_idempotent() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_job(&new_job("j1")).unwrap();
        store.create_batches("j1", Some("cat1"), "scan", &[serde_json::json!({})], 10).unwrap();

        let batch = store.claim_next("j1", "w1").unwrap().unwrap();
        store.report_progress(&batch.id, 1, 1, 0).unwrap();
        store.complete(&batch.id, &[serde_json::json!({"ok": true})]).unwrap();
        // Second call should not error even though already terminal.
        store.complete(&batch.id, &[]).unwrap();
        store.fail(&batch.id, "too late", &[]).unwrap();

        let aggregate = store.aggregate("j1").unwrap();
        assert_eq!(aggregate.completed, 1);
        assert_eq!(aggregate.failed, 0);
        assert!(aggregate.all_terminal());
    }

    #[test]
    fn cancel_job_batches_only_touches_non_terminal() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_job(&new_job("j1")).unwrap();
        let items: Vec<Value> = (0..3).map(|i| serde_json::json!({ "id": i })).collect();
        store.create_batches("j1", Some("cat1"), "scan", &items, 1).unwrap();

        let batch = store.claim_next("j1", "w1").unwrap().unwrap();
        store.complete(&batch.id, &[]).unwrap();

        store.cancel_job_batches("j1").unwrap();

        let aggregate = store.aggregate("j1").unwrap();
        assert_eq!(aggregate.completed, 1);
        assert_eq!(aggregate.cancelled, 2);
    }

    #[test]
    fn reclaim_stale_returns_batches_to_pending() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_job(&new_job("j1")).unwrap();
        store.create_batches("j1", Some("cat1"), "scan", &[serde_json::json!({})], 10).unwrap();
        store.claim_next("j1", "dead-worker").unwrap().unwrap();

        // Immediately "stale" with a zero timeout.
        let reclaimed = store.reclaim_stale(Duration::from_secs(0)).unwrap();
        assert_eq!(reclaimed, 1);

        let aggregate = store.aggregate("j1").unwrap();
        assert_eq!(aggregate.pending, 1);
        assert_eq!(aggregate.running, 0);
    }
}
