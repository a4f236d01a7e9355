//! Declarative job definitions: each registered job type is data, not a
//! trait impl — a `discover` closure, a per-item `process` closure, and an
//! optional single-pass `finalize` closure, closing over whatever state
//! (catalog handle, algorithm parameters) it needs. This mirrors the
//! closure-table style other crates in the pack use for small, swappable
//! behaviors instead of a trait-object hierarchy: cheaper to read when
//! there are six job types and none of them share meaningful state.

use crate::catalog::SqliteCatalog;
use crate::error::JobError;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-job-instance context handed to `discover`, `process`, and
/// `finalize`. Cheap to clone: everything behind it is `Arc`'d.
#[derive(Clone)]
pub struct JobContext {
    pub catalog: Arc<SqliteCatalog>,
    pub catalog_id: Option<String>,
    pub parameters: Value,
    cancelled: Arc<AtomicBool>,
}

impl JobContext {
    pub fn new(catalog: Arc<SqliteCatalog>, catalog_id: Option<String>, parameters: Value) -> Self {
        Self {
            catalog,
            catalog_id,
            parameters,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once `cancel` has been requested for this job instance.
    /// `process`/`finalize` closures should check this between items and
    /// bail out promptly rather than racing to finish (spec.md §4.6
    /// cooperative cancellation).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// A catalog id is required by every builtin job; callers outside the
    /// registry's closures can use this instead of re-checking `Option`.
    pub fn require_catalog_id(&self) -> Result<&str, JobError> {
        self.catalog_id.as_deref().ok_or_else(|| JobError::DiscoveryFailed("job has no catalog_id".to_string()))
    }
}

/// Outcome of processing one work item: `Ok` results feed the finalizer
/// and the batch's `results`, `Err` becomes a per-item entry in the
/// batch's `errors` without failing the whole batch.
pub type WorkItemOutcome = Result<Value, JobError>;

type DiscoverFn = dyn Fn(&JobContext) -> Result<Vec<Value>, JobError> + Send + Sync;
type ProcessFn = dyn Fn(&JobContext, &Value) -> WorkItemOutcome + Send + Sync;
type FinalizeFn = dyn Fn(&JobContext, &[Value]) -> Result<Value, JobError> + Send + Sync;

/// A registered job type (spec.md §4.7 `JobDefinition`).
pub struct JobDefinition {
    pub job_type: &'static str,
    pub discover: Box<DiscoverFn>,
    pub process: Box<ProcessFn>,
    pub finalize: Option<Box<FinalizeFn>>,
    pub batch_size: usize,
    pub max_workers: usize,
    pub retry_on_failure: bool,
    pub max_retries: u32,
    pub timeout_per_item: Option<Duration>,
}

impl JobDefinition {
    pub fn builder(job_type: &'static str, discover: Box<DiscoverFn>, process: Box<ProcessFn>) -> JobDefinitionBuilder {
        JobDefinitionBuilder {
            job_type,
            discover,
            process,
            finalize: None,
            batch_size: 1000,
            max_workers: 4,
            retry_on_failure: true,
            max_retries: 3,
            timeout_per_item: None,
        }
    }
}

pub struct JobDefinitionBuilder {
    job_type: &'static str,
    discover: Box<DiscoverFn>,
    process: Box<ProcessFn>,
    finalize: Option<Box<FinalizeFn>>,
    batch_size: usize,
    max_workers: usize,
    retry_on_failure: bool,
    max_retries: u32,
    timeout_per_item: Option<Duration>,
}

impl JobDefinitionBuilder {
    pub fn finalize<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobContext, &[Value]) -> Result<Value, JobError> + Send + Sync + 'static,
    {
        self.finalize = Some(Box::new(f));
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    pub fn retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn timeout_per_item(mut self, timeout: Duration) -> Self {
        self.timeout_per_item = Some(timeout);
        self
    }

    pub fn build(self) -> JobDefinition {
        JobDefinition {
            job_type: self.job_type,
            discover: self.discover,
            process: self.process,
            finalize: self.finalize,
            batch_size: self.batch_size,
            max_workers: self.max_workers,
            retry_on_failure: self.retry_on_failure,
            max_retries: self.max_retries,
            timeout_per_item: self.timeout_per_item,
        }
    }
}
