//! Domain types persisted in the catalog store (spec.md §3).

use crate::core::burst::SelectionMethod;
use crate::core::comparator::SimilarityType;
use crate::core::scanner::MediaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A logical collection of images rooted at one or more source directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    pub source_directories: Vec<String>,
}

/// Processing status of an `Image` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Analyzing,
    NeedsReview,
    Complete,
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Analyzing => "analyzing",
            ImageStatus::NeedsReview => "needs_review",
            ImageStatus::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ImageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            "analyzing" => Ok(ImageStatus::Analyzing),
            "needs_review" => Ok(ImageStatus::NeedsReview),
            "complete" => Ok(ImageStatus::Complete),
            other => Err(format!("unknown image status: {other}")),
        }
    }
}

/// A single timestamp candidate for an image, with its source and
/// confidence (e.g. EXIF, filesystem mtime, filename heuristic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateEntry {
    pub timestamp: DateTime<Utc>,
    pub confidence: String,
}

/// Catalog-scoped image record (spec.md §3 `Image`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub catalog_id: String,
    pub source_path: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub file_type: MediaKind,
    pub dhash: Option<String>,
    pub ahash: Option<String>,
    pub whash: Option<String>,
    pub quality_score: Option<u8>,
    pub thumbnail_path: Option<String>,
    pub dates: HashMap<String, DateEntry>,
    pub metadata: Value,
    pub status: ImageStatus,
    pub processing_flags: Value,
}

impl Image {
    /// A freshly-discovered image record, as produced by `scan.process`
    /// before any downstream job has touched it.
    pub fn new(id: String, catalog_id: String, source_path: String, checksum: String, size_bytes: u64, file_type: MediaKind) -> Self {
        Self {
            id,
            catalog_id,
            source_path,
            checksum,
            size_bytes,
            file_type,
            dhash: None,
            ahash: None,
            whash: None,
            quality_score: None,
            thumbnail_path: None,
            dates: HashMap::new(),
            metadata: Value::Object(Default::default()),
            status: ImageStatus::Pending,
            processing_flags: Value::Object(Default::default()),
        }
    }
}

/// Lifecycle status of a `Job` (spec.md §3). Terminal states are
/// `Success | Failed | Cancelled`; transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A submitted job instance (spec.md §3 `Job`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub catalog_id: Option<String>,
    pub job_type: String,
    pub status: JobStatus,
    pub parameters: Value,
    pub progress: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a `JobBatch` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "running" => Ok(BatchStatus::Running),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            "cancelled" => Ok(BatchStatus::Cancelled),
            other => Err(format!("unknown batch status: {other}")),
        }
    }
}

/// A durable partition of a job's work set (spec.md §3 `JobBatch`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobBatch {
    pub id: String,
    pub parent_job_id: String,
    pub catalog_id: Option<String>,
    pub batch_number: usize,
    pub total_batches: usize,
    pub job_type: String,
    pub status: BatchStatus,
    pub work_items: Vec<Value>,
    pub items_count: usize,
    pub worker_id: Option<String>,
    pub processed_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<Value>,
    pub error_message: Option<String>,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
}

/// A catalog-persisted duplicate group (spec.md §3 `DuplicateGroup`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroupRecord {
    pub id: String,
    pub catalog_id: String,
    pub primary_image_id: String,
    pub similarity_type: SimilarityType,
    pub confidence: u32,
    pub reviewed: bool,
    pub members: Vec<DuplicateMemberRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMemberRecord {
    pub image_id: String,
    pub similarity_score: u32,
}

/// A catalog-persisted burst (spec.md §3 `Burst`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstRecord {
    pub id: String,
    pub catalog_id: String,
    pub image_ids: Vec<String>,
    pub image_count: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub best_image_id: Option<String>,
    pub selection_method: SelectionMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTag {
    pub image_id: String,
    pub tag_id: String,
    pub confidence: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn job_status_terminal_states() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn batch_status_terminal_states() {
        assert!(BatchStatus::Completed.is_terminal());
        assert!(!BatchStatus::Running.is_terminal());
    }

    #[test]
    fn status_round_trips_through_string() {
        assert_eq!(JobStatus::from_str(&JobStatus::Running.to_string()).unwrap(), JobStatus::Running);
        assert_eq!(BatchStatus::from_str(&BatchStatus::Failed.to_string()).unwrap(), BatchStatus::Failed);
        assert_eq!(ImageStatus::from_str(&ImageStatus::NeedsReview.to_string()).unwrap(), ImageStatus::NeedsReview);
    }
}
