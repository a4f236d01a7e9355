//! # Photo Catalog Jobs
//!
//! The parallel job execution core of a photo/video library manager: it
//! turns long-running catalog analyses (scan, perceptual hashing, duplicate
//! detection, burst detection, quality scoring, thumbnailing, auto-tagging)
//! into a uniform pipeline of discovery, batching, parallel processing, and
//! an optional finalizer — backed by a durable SQLite-based catalog so
//! progress survives process restarts and batches are individually
//! cancellable and retryable.
//!
//! ## Architecture
//! - `core` — the per-item analysis primitives (hashing, grouping, burst
//!   clustering, scanning, metadata extraction, quality scoring); these are
//!   GUI/server-agnostic and have no knowledge of jobs or batches.
//! - `catalog` — the durable gateway (C4) image/job/batch/group storage.
//! - `jobs` — the job framework (C5-C9): definitions, registry, batch
//!   manager, executor, progress publisher, and controller.
//! - `events` — low-level progress events emitted by `core` algorithms
//!   (reused by job processors that wrap them).
//! - `error` — the error taxonomy (see spec §7: transient I/O, per-item,
//!   batch-fatal, job-fatal).
//! - `cli` — a command-line harness that submits/queries/cancels jobs
//!   against a local catalog file.

pub mod catalog;
pub mod core;
pub mod error;
pub mod events;
pub mod jobs;

// Re-export commonly used types at the crate root
pub use error::{PhotoCatalogError, Result};
