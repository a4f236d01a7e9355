//! # Jobs Module
//!
//! The job execution core: discover a finite work set, partition it into
//! durable batches, process batches in parallel across a worker pool, and
//! optionally run a single finalizer once every batch lands. `store` and
//! `batch` persist and claim `Job`/`JobBatch` rows; `definition` and
//! `registry` declare what each job type does; `executor` runs one job
//! instance through its full lifecycle; `controller` is the long-lived
//! process that owns worker threads and exposes submit/cancel/get/list.

pub mod batch;
pub mod controller;
pub mod definition;
pub mod executor;
pub mod publisher;
pub mod registry;
pub mod store;

pub use batch::BatchManager;
pub use controller::JobController;
pub use definition::{JobContext, JobDefinition, WorkItemOutcome};
pub use publisher::ProgressPublisher;
pub use registry::JobRegistry;
pub use store::{BatchAggregate, JobStore};
