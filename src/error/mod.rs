//! # Error Module
//!
//! Error types for the photo catalog job execution core.
//!
//! ## Design Principles
//! - **Never panic** on catalog data or filesystem input — return errors
//! - **Include context** — paths, ids, what went wrong
//! - **Classify failures** — transient I/O, per-item, batch-fatal, job-fatal
//!   (see spec §7); callers decide whether to retry, fail a batch, or fail
//!   a job based on which variant they see.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum PhotoCatalogError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Grouping error: {0}")]
    Group(#[from] GroupError),

    #[error("Burst detection error: {0}")]
    Burst(#[from] BurstError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur during media discovery (the `scan` job's `discover`)
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,
}

/// Errors that occur during image hashing (perceptual hashes and checksums)
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to decode image {path}: {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while grouping images into duplicate clusters. The
/// grouping primitives themselves (`group_exact`/`group_perceptual`) are
/// infallible over well-formed input; this is raised by callers reading a
/// stored hash back out of the catalog before handing it to them.
#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Malformed hash: expected 16 hex digits, got {value:?}")]
    MalformedHash { value: String },
}

/// Errors that occur while clustering images into bursts
#[derive(Error, Debug)]
pub enum BurstError {
    #[error("Invalid gap threshold: {value} (must be > 0)")]
    InvalidGapThreshold { value: f64 },

    #[error("Invalid minimum burst size: {value} (must be >= 2)")]
    InvalidMinSize { value: usize },

    #[error("Unknown selection method: {value}")]
    UnknownSelectionMethod { value: String },
}

/// Errors raised by the catalog gateway (C4)
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to open catalog database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Catalog corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Failed to (de)serialize catalog row data: {0}")]
    SerializationFailed(String),

    #[error("Image not found: {image_id} in catalog {catalog_id}")]
    ImageNotFound {
        catalog_id: String,
        image_id: String,
    },

    #[error("Catalog not found: {catalog_id}")]
    CatalogNotFound { catalog_id: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl CatalogError {
    /// True for failures of the gateway itself (connection, schema,
    /// constraint) rather than ones scoped to the one item that raised
    /// them (spec.md §4.4/§7: a constraint violation is batch-fatal unless
    /// it originated from a single item, in which case it's per-item).
    pub fn is_batch_fatal(&self) -> bool {
        !matches!(self, CatalogError::ImageNotFound { .. })
    }
}

/// Errors raised by the batch manager (C5)
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch {batch_id} is already terminal ({status})")]
    AlreadyTerminal { batch_id: String, status: String },

    #[error("Batch {batch_id} not found")]
    NotFound { batch_id: String },

    #[error("Failed to claim a batch: {0}")]
    ClaimFailed(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors raised by the job executor/controller (C7-C9)
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job type not registered: {job_type}")]
    UnknownJobType { job_type: String },

    #[error("Job {job_id} not found")]
    NotFound { job_id: String },

    #[error("Job {job_id} is already terminal ({status})")]
    AlreadyTerminal { job_id: String, status: String },

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Finalizer failed: {0}")]
    FinalizeFailed(String),

    #[error("Item processing timed out after {0:?}")]
    ItemTimeout(std::time::Duration),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl JobError {
    /// True for errors the executor's per-item loop must treat as
    /// batch-fatal (spec.md §4.8 step 3, §7) rather than folding into the
    /// batch's accumulated per-item `errors`: a broken gateway or a
    /// violated contract, as opposed to one bad file, a decode failure, or
    /// a per-item timeout.
    pub fn is_batch_fatal(&self) -> bool {
        match self {
            JobError::Catalog(e) => e.is_batch_fatal(),
            JobError::Batch(_) => true,
            JobError::UnknownJobType { .. }
            | JobError::NotFound { .. }
            | JobError::AlreadyTerminal { .. }
            | JobError::DiscoveryFailed(_)
            | JobError::FinalizeFailed(_)
            | JobError::ItemTimeout(_) => false,
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, PhotoCatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/vacation"));
    }

    #[test]
    fn hash_error_includes_path() {
        let error = HashError::DecodeError {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
    }

    #[test]
    fn catalog_error_suggests_recovery() {
        let error = CatalogError::Corrupted {
            path: PathBuf::from("/cache/catalog.db"),
        };
        let message = error.to_string();
        assert!(message.contains("Delete this file"));
    }

    #[test]
    fn batch_error_wraps_catalog_error() {
        let error: BatchError = CatalogError::QueryFailed("timeout".to_string()).into();
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn job_error_wraps_batch_error() {
        let error: JobError = BatchError::NotFound {
            batch_id: "b1".to_string(),
        }
        .into();
        assert!(error.to_string().contains("b1"));
    }

    #[test]
    fn top_level_error_converts_from_job_error() {
        let job_err = JobError::UnknownJobType {
            job_type: "bogus".to_string(),
        };
        let top: PhotoCatalogError = job_err.into();
        assert!(top.to_string().contains("bogus"));
    }
}
