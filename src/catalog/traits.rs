//! The catalog gateway: the narrow interface job processors use to read
//! and write catalog state, independent of the storage engine behind it.

use super::model::{BurstRecord, DuplicateGroupRecord, Image};
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A row shape tailored to hashing: only what `detect_duplicates` needs.
#[derive(Debug, Clone)]
pub struct ImageHashRow {
    pub id: String,
    pub checksum: String,
    pub dhash: Option<String>,
    pub ahash: Option<String>,
    pub whash: Option<String>,
    pub quality_score: Option<u8>,
    pub size_bytes: Option<u64>,
}

/// A row shape tailored to burst detection: only what `detect_bursts` needs.
#[derive(Debug, Clone)]
pub struct ImageTimestampRow {
    pub id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub camera: Option<String>,
    pub quality_score: Option<u8>,
}

/// Storage-agnostic read/write surface onto one catalog's data.
///
/// Implementations must be safe to share across the worker threads that
/// claim and process job batches concurrently.
pub trait CatalogGateway: Send + Sync {
    /// Directories a catalog was created from (the `scan` job's `discover`
    /// input when no explicit paths are given).
    fn list_source_directories(&self, catalog_id: &str) -> Result<Vec<String>, CatalogError>;

    /// Image ids that have not yet had `generate_thumbnails`/hashing applied.
    fn list_images_without_hashes(&self, catalog_id: &str) -> Result<Vec<String>, CatalogError>;

    /// All images with their current hashes, for `detect_duplicates`.
    fn list_images_with_hashes(&self, catalog_id: &str) -> Result<Vec<ImageHashRow>, CatalogError>;

    /// All images with their timestamp/camera, for `detect_bursts`.
    fn list_images_with_timestamps(&self, catalog_id: &str) -> Result<Vec<ImageTimestampRow>, CatalogError>;

    /// Resolve an image id to its filesystem path.
    fn get_image_path(&self, catalog_id: &str, image_id: &str) -> Result<String, CatalogError>;

    /// Insert a new image row, or update it in place if `(catalog_id,
    /// source_path)` already exists (idempotent rescans).
    fn upsert_image(&self, image: &Image) -> Result<(), CatalogError>;

    /// Persist the three perceptual hashes computed for one image.
    fn update_image_hashes(&self, image_id: &str, dhash: &str, ahash: &str, whash: &str) -> Result<(), CatalogError>;

    /// Atomically replace a catalog's duplicate groups with a freshly
    /// computed set (clears stale groups from a prior run first).
    fn replace_duplicate_groups(&self, catalog_id: &str, groups: &[DuplicateGroupRecord]) -> Result<(), CatalogError>;

    /// Atomically replace a catalog's burst groups with a freshly
    /// computed set.
    fn replace_burst_groups(&self, catalog_id: &str, bursts: &[BurstRecord]) -> Result<(), CatalogError>;

    /// Best-effort fan-out of a progress event to any subscriber of
    /// `channel`. Never fails the caller; delivery is not guaranteed.
    fn publish(&self, channel: &str, event: &Value) -> Result<(), CatalogError>;
}
