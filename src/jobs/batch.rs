//! The batch manager (C5): the single surface the executor and controller
//! use to partition work and move batches through their lifecycle. A thin
//! wrapper over `JobStore` — its value is giving batch lifecycle a named
//! component with its own restart/cancellation policy, not new SQL.

use crate::catalog::model::JobBatch;
use crate::error::BatchError;
use crate::jobs::store::{BatchAggregate, JobStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Batches whose worker hasn't heartbeat in this long are assumed dead and
/// returned to `pending` on restart (spec.md §5 restartability).
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct BatchManager {
    store: Arc<dyn JobStore>,
}

impl BatchManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn create_batches(
        &self,
        parent_job_id: &str,
        catalog_id: Option<&str>,
        job_type: &str,
        items: &[Value],
        batch_size: usize,
    ) -> Result<Vec<JobBatch>, BatchError> {
        self.store.create_batches(parent_job_id, catalog_id, job_type, items, batch_size)
    }

    /// Claim the next pending batch for `parent_job_id`, or `None` if the
    /// job has no pending batches left (the executor then checks whether
    /// the job is fully terminal).
    pub fn claim_next(&self, parent_job_id: &str, worker_id: &str) -> Result<Option<JobBatch>, BatchError> {
        self.store.claim_next(parent_job_id, worker_id)
    }

    pub fn report_progress(&self, batch_id: &str, processed: usize, success: usize, error: usize) -> Result<(), BatchError> {
        self.store.report_progress(batch_id, processed, success, error)
    }

    pub fn complete(&self, batch_id: &str, results: &[Value]) -> Result<(), BatchError> {
        self.store.complete(batch_id, results)
    }

    pub fn fail(&self, batch_id: &str, error_message: &str, errors: &[String]) -> Result<(), BatchError> {
        self.store.fail(batch_id, error_message, errors)
    }

    pub fn cancel_job_batches(&self, parent_job_id: &str) -> Result<(), BatchError> {
        self.store.cancel_job_batches(parent_job_id)
    }

    pub fn aggregate(&self, parent_job_id: &str) -> Result<BatchAggregate, BatchError> {
        self.store.aggregate(parent_job_id)
    }

    pub fn list_batches(&self, parent_job_id: &str) -> Result<Vec<JobBatch>, BatchError> {
        self.store.list_batches(parent_job_id)
    }

    /// Reclaim batches stuck `running` past `DEFAULT_STALE_TIMEOUT`. Called
    /// once at controller startup to recover from an unclean shutdown.
    pub fn reclaim_stale(&self) -> Result<usize, BatchError> {
        self.store.reclaim_stale(DEFAULT_STALE_TIMEOUT)
    }
}
