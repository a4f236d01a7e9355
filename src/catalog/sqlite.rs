//! SQLite implementation of the catalog gateway (C4).
//!
//! Grounded on the teacher's `core::cache::sqlite::SqliteCache`: a
//! `Mutex<Connection>` guarding a WAL-mode connection, schema created with
//! `CREATE TABLE IF NOT EXISTS` at open time. This module additionally
//! owns the `catalogs` table (catalog identity/lifecycle is outside
//! `CatalogGateway`'s narrow per-image/group surface but has to live
//! somewhere); job and batch persistence is added by `jobs::store`, which
//! implements `jobs::store::JobStore` for this same connection.

use super::model::{
    BurstRecord, Catalog, DateEntry, DuplicateGroupRecord, DuplicateMemberRecord, Image,
    ImageStatus,
};
use super::traits::{CatalogGateway, ImageHashRow, ImageTimestampRow};
use crate::core::burst::SelectionMethod;
use crate::core::comparator::SimilarityType;
use crate::core::scanner::MediaKind;
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

/// A SQLite-backed catalog store.
///
/// Safe to share across the worker threads the job executor spawns to
/// claim and process batches concurrently: every operation takes the
/// connection mutex for the duration of a single statement (or a short
/// transaction for multi-row writes), never across a suspension point.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCatalog {
    /// Open or create a catalog database at `path`, creating the full
    /// schema (catalogs, images, jobs, job_batches, duplicate groups,
    /// bursts, tags) if it does not already exist.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CatalogError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| CatalogError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Open a fresh in-memory catalog, primarily for tests.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CatalogError::OpenFailed { path: PathBuf::from(":memory:"), reason: e.to_string() })?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// The filesystem path this catalog was opened from (`:memory:` for
    /// in-memory instances). Used by jobs that need a place on disk to
    /// write derived artifacts, e.g. `generate_thumbnails`.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    /// Register a new catalog (or return the existing one for that name).
    pub fn create_catalog(&self, id: &str, name: &str, source_directories: &[String]) -> Result<Catalog, CatalogError> {
        let conn = self.lock()?;
        let dirs_json = serde_json::to_string(source_directories)
            .map_err(|e| CatalogError::SerializationFailed(e.to_string()))?;

        conn.execute(
            "INSERT INTO catalogs (id, name, source_directories) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET source_directories = excluded.source_directories",
            params![id, name, dirs_json],
        )
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        self.get_catalog_by_name_locked(&conn, name)?
            .ok_or_else(|| CatalogError::QueryFailed("catalog vanished after insert".into()))
    }

    pub fn get_catalog(&self, catalog_id: &str) -> Result<Option<Catalog>, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, source_directories FROM catalogs WHERE id = ?1",
            [catalog_id],
            |row| Self::row_to_catalog(row),
        )
        .optional()
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    fn get_catalog_by_name_locked(&self, conn: &Connection, name: &str) -> Result<Option<Catalog>, CatalogError> {
        conn.query_row(
            "SELECT id, name, source_directories FROM catalogs WHERE name = ?1",
            [name],
            Self::row_to_catalog,
        )
        .optional()
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    pub fn list_catalogs(&self) -> Result<Vec<Catalog>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, source_directories FROM catalogs ORDER BY name")
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_catalog)
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    fn row_to_catalog(row: &rusqlite::Row) -> rusqlite::Result<Catalog> {
        let dirs_json: String = row.get(2)?;
        let source_directories: Vec<String> = serde_json::from_str(&dirs_json).unwrap_or_default();
        Ok(Catalog {
            id: row.get(0)?,
            name: row.get(1)?,
            source_directories,
        })
    }

    fn row_to_image(row: &rusqlite::Row) -> rusqlite::Result<Image> {
        let file_type: String = row.get(5)?;
        let dates_json: String = row.get(11)?;
        let metadata_json: String = row.get(12)?;
        let status: String = row.get(13)?;
        let flags_json: String = row.get(14)?;

        Ok(Image {
            id: row.get(0)?,
            catalog_id: row.get(1)?,
            source_path: row.get(2)?,
            checksum: row.get(3)?,
            size_bytes: row.get::<_, i64>(4)? as u64,
            file_type: if file_type == "video" { MediaKind::Video } else { MediaKind::Image },
            dhash: row.get(6)?,
            ahash: row.get(7)?,
            whash: row.get(8)?,
            quality_score: row.get::<_, Option<i64>>(9)?.map(|v| v as u8),
            thumbnail_path: row.get(10)?,
            dates: serde_json::from_str::<HashMap<String, DateEntry>>(&dates_json).unwrap_or_default(),
            metadata: serde_json::from_str::<Value>(&metadata_json).unwrap_or(Value::Null),
            status: ImageStatus::from_str(&status).unwrap_or(ImageStatus::Pending),
            processing_flags: serde_json::from_str::<Value>(&flags_json).unwrap_or(Value::Null),
        })
    }

    /// Fetch one image by id, for processors that need the full record
    /// (e.g. `auto_tag`, `score_quality`) beyond the narrow row shapes
    /// `CatalogGateway` exposes.
    pub fn get_image(&self, catalog_id: &str, image_id: &str) -> Result<Option<Image>, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, catalog_id, source_path, checksum, size_bytes, file_type,
                    dhash, ahash, whash, quality_score, thumbnail_path, dates,
                    metadata, status, processing_flags
             FROM images WHERE catalog_id = ?1 AND id = ?2",
            params![catalog_id, image_id],
            Self::row_to_image,
        )
        .optional()
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    /// Set a single image's `quality_score` (`score_quality.process`).
    pub fn update_image_quality(&self, catalog_id: &str, image_id: &str, quality_score: u8) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE images SET quality_score = ?1, status = ?2 WHERE catalog_id = ?3 AND id = ?4",
            params![quality_score as i64, ImageStatus::Analyzing.to_string(), catalog_id, image_id],
        )
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// Set a single image's `thumbnail_path` (`generate_thumbnails.process`).
    pub fn update_image_thumbnail(&self, catalog_id: &str, image_id: &str, thumbnail_path: &str) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE images SET thumbnail_path = ?1 WHERE catalog_id = ?2 AND id = ?3",
            params![thumbnail_path, catalog_id, image_id],
        )
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// Merge `tags` (and their confidences) into an image's relations and
    /// `processing_flags`/`metadata` (`auto_tag.process`). `model` records
    /// which pluggable tagger produced them (spec.md §6 `model` parameter).
    pub fn apply_auto_tags(&self, catalog_id: &str, image_id: &str, tags: &[(String, Option<f64>)], model: &str) -> Result<(), CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        for (name, confidence) in tags {
            let tag_id = format!("tag:{name}");
            tx.execute(
                "INSERT INTO tags (id, name) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                params![tag_id, name],
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

            tx.execute(
                "INSERT INTO image_tags (image_id, tag_id, confidence) VALUES (?1, ?2, ?3)
                 ON CONFLICT(image_id, tag_id) DO UPDATE SET confidence = excluded.confidence",
                params![image_id, tag_id, *confidence],
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        }

        let flags_json: String = tx
            .query_row(
                "SELECT processing_flags FROM images WHERE catalog_id = ?1 AND id = ?2",
                params![catalog_id, image_id],
                |r| r.get(0),
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let mut flags: Value = serde_json::from_str(&flags_json).unwrap_or(Value::Object(Default::default()));
        if let Value::Object(map) = &mut flags {
            map.insert("auto_tagged".into(), Value::Bool(true));
            map.insert("auto_tag_model".into(), Value::String(model.to_string()));
        }
        tx.execute(
            "UPDATE images SET processing_flags = ?1, status = ?2 WHERE catalog_id = ?3 AND id = ?4",
            params![
                serde_json::to_string(&flags).unwrap_or_default(),
                ImageStatus::Complete.to_string(),
                catalog_id,
                image_id
            ],
        )
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        tx.commit().map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn row_to_burst(row: &rusqlite::Row) -> rusqlite::Result<BurstRecord> {
        let image_ids_json: String = row.get(2)?;
        let selection_method: String = row.get(10)?;
        Ok(BurstRecord {
            id: row.get(0)?,
            catalog_id: row.get(1)?,
            image_ids: serde_json::from_str(&image_ids_json).unwrap_or_default(),
            image_count: row.get::<_, i64>(3)? as usize,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            duration_seconds: row.get(6)?,
            camera_make: row.get(7)?,
            camera_model: row.get(8)?,
            best_image_id: row.get(9)?,
            selection_method: SelectionMethod::from_str(&selection_method).unwrap_or(SelectionMethod::Quality),
        })
    }

    /// Bursts currently persisted for a catalog, for the CLI/demo harness.
    pub fn list_bursts(&self, catalog_id: &str) -> Result<Vec<BurstRecord>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, catalog_id, image_ids, image_count, start_time, end_time,
                        duration_seconds, camera_make, camera_model, best_image_id, selection_method
                 FROM bursts WHERE catalog_id = ?1 ORDER BY start_time",
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([catalog_id], Self::row_to_burst)
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    /// Duplicate groups currently persisted for a catalog, for the
    /// CLI/demo harness.
    pub fn list_duplicate_groups(&self, catalog_id: &str) -> Result<Vec<DuplicateGroupRecord>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, catalog_id, primary_image_id, similarity_type, confidence, reviewed
                 FROM duplicate_groups WHERE catalog_id = ?1 ORDER BY id",
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let group_rows = stmt
            .query_map([catalog_id], |row| {
                let similarity_type: String = row.get(3)?;
                Ok(DuplicateGroupRecord {
                    id: row.get(0)?,
                    catalog_id: row.get(1)?,
                    primary_image_id: row.get(2)?,
                    similarity_type: if similarity_type == "exact" { SimilarityType::Exact } else { SimilarityType::Perceptual },
                    confidence: row.get::<_, i64>(4)? as u32,
                    reviewed: row.get::<_, i64>(5)? != 0,
                    members: Vec::new(),
                })
            })
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let mut groups = group_rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        for group in &mut groups {
            let mut mstmt = conn
                .prepare("SELECT image_id, similarity_score FROM duplicate_members WHERE group_id = ?1")
                .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
            let members = mstmt
                .query_map([&group.id], |row| {
                    Ok(DuplicateMemberRecord {
                        image_id: row.get(0)?,
                        similarity_score: row.get::<_, i64>(1)? as u32,
                    })
                })
                .map_err(|e| CatalogError::QueryFailed(e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
            group.members = members;
        }

        Ok(groups)
    }
}

impl CatalogGateway for SqliteCatalog {
    fn list_source_directories(&self, catalog_id: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .get_catalog(catalog_id)?
            .map(|c| c.source_directories)
            .unwrap_or_default())
    }

    fn list_images_without_hashes(&self, catalog_id: &str) -> Result<Vec<String>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id FROM images WHERE catalog_id = ?1
                 AND (dhash IS NULL OR ahash IS NULL OR whash IS NULL)",
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([catalog_id], |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    fn list_images_with_hashes(&self, catalog_id: &str) -> Result<Vec<ImageHashRow>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, checksum, dhash, ahash, whash, quality_score, size_bytes
                 FROM images WHERE catalog_id = ?1",
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([catalog_id], |row| {
                Ok(ImageHashRow {
                    id: row.get(0)?,
                    checksum: row.get(1)?,
                    dhash: row.get(2)?,
                    ahash: row.get(3)?,
                    whash: row.get(4)?,
                    quality_score: row.get::<_, Option<i64>>(5)?.map(|v| v as u8),
                    size_bytes: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
                })
            })
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))
    }

    fn list_images_with_timestamps(&self, catalog_id: &str) -> Result<Vec<ImageTimestampRow>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, dates, metadata, quality_score FROM images WHERE catalog_id = ?1",
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        let rows = stmt
            .query_map([catalog_id], |row| {
                let id: String = row.get(0)?;
                let dates_json: String = row.get(1)?;
                let metadata_json: String = row.get(2)?;
                let quality_score: Option<i64> = row.get(3)?;
                Ok((id, dates_json, metadata_json, quality_score))
            })
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, dates_json, metadata_json, quality_score)| {
                let dates: HashMap<String, DateEntry> = serde_json::from_str(&dates_json).unwrap_or_default();
                let timestamp: Option<DateTime<Utc>> = dates.values().map(|d| d.timestamp).min();
                let metadata: Value = serde_json::from_str(&metadata_json).unwrap_or(Value::Null);
                let camera = metadata.get("camera").and_then(|v| v.as_str()).map(String::from);
                ImageTimestampRow {
                    id,
                    timestamp,
                    camera,
                    quality_score: quality_score.map(|v| v as u8),
                }
            })
            .collect())
    }

    fn get_image_path(&self, catalog_id: &str, image_id: &str) -> Result<String, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT source_path FROM images WHERE catalog_id = ?1 AND id = ?2",
            params![catalog_id, image_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?
        .ok_or_else(|| CatalogError::ImageNotFound {
            catalog_id: catalog_id.to_string(),
            image_id: image_id.to_string(),
        })
    }

    fn upsert_image(&self, image: &Image) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        let dates_json = serde_json::to_string(&image.dates).map_err(|e| CatalogError::SerializationFailed(e.to_string()))?;
        let metadata_json = serde_json::to_string(&image.metadata).map_err(|e| CatalogError::SerializationFailed(e.to_string()))?;
        let flags_json = serde_json::to_string(&image.processing_flags).map_err(|e| CatalogError::SerializationFailed(e.to_string()))?;

        conn.execute(
            "INSERT INTO images (
                id, catalog_id, source_path, checksum, size_bytes, file_type,
                dhash, ahash, whash, quality_score, thumbnail_path, dates,
                metadata, status, processing_flags
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
             ON CONFLICT(catalog_id, source_path) DO UPDATE SET
                checksum = excluded.checksum,
                size_bytes = excluded.size_bytes,
                file_type = excluded.file_type,
                dhash = COALESCE(excluded.dhash, images.dhash),
                ahash = COALESCE(excluded.ahash, images.ahash),
                whash = COALESCE(excluded.whash, images.whash),
                quality_score = COALESCE(excluded.quality_score, images.quality_score),
                thumbnail_path = COALESCE(excluded.thumbnail_path, images.thumbnail_path),
                dates = excluded.dates,
                metadata = excluded.metadata,
                status = excluded.status,
                processing_flags = excluded.processing_flags",
            params![
                image.id,
                image.catalog_id,
                image.source_path,
                image.checksum,
                image.size_bytes as i64,
                image.file_type.to_string(),
                image.dhash,
                image.ahash,
                image.whash,
                image.quality_score.map(|v| v as i64),
                image.thumbnail_path,
                dates_json,
                metadata_json,
                image.status.to_string(),
                flags_json,
            ],
        )
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn update_image_hashes(&self, image_id: &str, dhash: &str, ahash: &str, whash: &str) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE images SET dhash = ?1, ahash = ?2, whash = ?3, status = ?4 WHERE id = ?5",
                params![dhash, ahash, whash, ImageStatus::Analyzing.to_string(), image_id],
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        if updated == 0 {
            return Err(CatalogError::ImageNotFound {
                catalog_id: String::new(),
                image_id: image_id.to_string(),
            });
        }
        Ok(())
    }

    fn replace_duplicate_groups(&self, catalog_id: &str, groups: &[DuplicateGroupRecord]) -> Result<(), CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        tx.execute(
            "DELETE FROM duplicate_members WHERE group_id IN (SELECT id FROM duplicate_groups WHERE catalog_id = ?1)",
            [catalog_id],
        )
        .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        tx.execute("DELETE FROM duplicate_groups WHERE catalog_id = ?1", [catalog_id])
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        for group in groups {
            if group.members.len() < 2 {
                return Err(CatalogError::ConstraintViolation(format!(
                    "duplicate group {} has fewer than 2 members",
                    group.id
                )));
            }
            tx.execute(
                "INSERT INTO duplicate_groups (id, catalog_id, primary_image_id, similarity_type, confidence, reviewed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    group.id,
                    catalog_id,
                    group.primary_image_id,
                    group.similarity_type.to_string(),
                    group.confidence,
                    group.reviewed as i64,
                ],
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

            for member in &group.members {
                tx.execute(
                    "INSERT INTO duplicate_members (group_id, image_id, similarity_score) VALUES (?1, ?2, ?3)",
                    params![group.id, member.image_id, member.similarity_score],
                )
                .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn replace_burst_groups(&self, catalog_id: &str, bursts: &[BurstRecord]) -> Result<(), CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        tx.execute("DELETE FROM bursts WHERE catalog_id = ?1", [catalog_id])
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;

        for burst in bursts {
            if burst.image_count < 2 {
                return Err(CatalogError::ConstraintViolation(format!(
                    "burst {} has fewer than 2 members",
                    burst.id
                )));
            }
            let image_ids_json = serde_json::to_string(&burst.image_ids).map_err(|e| CatalogError::SerializationFailed(e.to_string()))?;
            tx.execute(
                "INSERT INTO bursts (
                    id, catalog_id, image_ids, image_count, start_time, end_time,
                    duration_seconds, camera_make, camera_model, best_image_id, selection_method
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                params![
                    burst.id,
                    catalog_id,
                    image_ids_json,
                    burst.image_count as i64,
                    burst.start_time,
                    burst.end_time,
                    burst.duration_seconds,
                    burst.camera_make,
                    burst.camera_model,
                    burst.best_image_id,
                    format!("{:?}", burst.selection_method).to_lowercase(),
                ],
            )
            .map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        }

        tx.commit().map_err(|e| CatalogError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn publish(&self, channel: &str, event: &Value) -> Result<(), CatalogError> {
        // Best-effort: a real deployment backs this with LISTEN/NOTIFY or
        // an equivalent broker. This embedded store keeps an append-only
        // log so a reader with no live subscription can still replay
        // recent events; failures here never propagate to the caller.
        let conn = match self.lock() {
            Ok(c) => c,
            Err(_) => return Ok(()),
        };
        let payload = serde_json::to_string(event).unwrap_or_default();
        let _ = conn.execute(
            "INSERT INTO event_log (channel, payload, created_at) VALUES (?1, ?2, ?3)",
            params![channel, payload, Utc::now()],
        );
        Ok(())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS catalogs (
    id TEXT PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    source_directories TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images (
    id TEXT NOT NULL,
    catalog_id TEXT NOT NULL,
    source_path TEXT NOT NULL,
    checksum TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    file_type TEXT NOT NULL,
    dhash TEXT,
    ahash TEXT,
    whash TEXT,
    quality_score INTEGER,
    thumbnail_path TEXT,
    dates TEXT NOT NULL DEFAULT '{}',
    metadata TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'pending',
    processing_flags TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (catalog_id, id)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_images_path ON images(catalog_id, source_path);
CREATE INDEX IF NOT EXISTS idx_images_checksum ON images(catalog_id, checksum);

CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    catalog_id TEXT,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',
    progress TEXT NOT NULL DEFAULT '{}',
    result TEXT,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_jobs_catalog ON jobs(catalog_id);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

CREATE TABLE IF NOT EXISTS job_batches (
    id TEXT PRIMARY KEY,
    parent_job_id TEXT NOT NULL,
    catalog_id TEXT,
    batch_number INTEGER NOT NULL,
    total_batches INTEGER NOT NULL,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL,
    work_items TEXT NOT NULL,
    items_count INTEGER NOT NULL,
    worker_id TEXT,
    processed_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    results TEXT NOT NULL DEFAULT '[]',
    error_message TEXT,
    errors TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    heartbeat_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_batches_job ON job_batches(parent_job_id, status);

CREATE TABLE IF NOT EXISTS duplicate_groups (
    id TEXT PRIMARY KEY,
    catalog_id TEXT NOT NULL,
    primary_image_id TEXT NOT NULL,
    similarity_type TEXT NOT NULL,
    confidence INTEGER NOT NULL,
    reviewed INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_dup_groups_catalog ON duplicate_groups(catalog_id);

CREATE TABLE IF NOT EXISTS duplicate_members (
    group_id TEXT NOT NULL,
    image_id TEXT NOT NULL,
    similarity_score INTEGER NOT NULL,
    PRIMARY KEY (group_id, image_id)
);

CREATE TABLE IF NOT EXISTS bursts (
    id TEXT PRIMARY KEY,
    catalog_id TEXT NOT NULL,
    image_ids TEXT NOT NULL,
    image_count INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    camera_make TEXT,
    camera_model TEXT,
    best_image_id TEXT,
    selection_method TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bursts_catalog ON bursts(catalog_id);

CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS image_tags (
    image_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,
    confidence REAL,
    PRIMARY KEY (image_id, tag_id)
);

CREATE TABLE IF NOT EXISTS event_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_event_log_channel ON event_log(channel, id);
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::MediaKind;

    fn image(id: &str, catalog_id: &str, path: &str, checksum: &str) -> Image {
        Image::new(id.to_string(), catalog_id.to_string(), path.to_string(), checksum.to_string(), 1024, MediaKind::Image)
    }

    #[test]
    fn open_in_memory_creates_schema() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        assert!(catalog.list_catalogs().unwrap().is_empty());
    }

    #[test]
    fn create_and_fetch_catalog() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_catalog("cat1", "Vacation Photos", &["/photos".to_string()]).unwrap();

        let fetched = store.get_catalog("cat1").unwrap().unwrap();
        assert_eq!(fetched.name, "Vacation Photos");
        assert_eq!(fetched.source_directories, vec!["/photos".to_string()]);
    }

    #[test]
    fn upsert_image_is_idempotent_on_source_path() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_catalog("cat1", "Test", &[]).unwrap();

        store.upsert_image(&image("img1", "cat1", "/photos/a.jpg", "c1")).unwrap();
        store.upsert_image(&image("img1", "cat1", "/photos/a.jpg", "c1")).unwrap();

        let without_hashes = store.list_images_without_hashes("cat1").unwrap();
        assert_eq!(without_hashes.len(), 1);
    }

    #[test]
    fn update_image_hashes_round_trips() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_catalog("cat1", "Test", &[]).unwrap();
        store.upsert_image(&image("img1", "cat1", "/photos/a.jpg", "c1")).unwrap();

        store.update_image_hashes("img1", "0000000000000000", "1111111111111111", "2222222222222222").unwrap();

        let rows = store.list_images_with_hashes("cat1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dhash.as_deref(), Some("0000000000000000"));
        assert!(store.list_images_without_hashes("cat1").unwrap().is_empty());
    }

    #[test]
    fn replace_duplicate_groups_rejects_singleton_group() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_catalog("cat1", "Test", &[]).unwrap();

        let groups = vec![DuplicateGroupRecord {
            id: "g1".to_string(),
            catalog_id: "cat1".to_string(),
            primary_image_id: "img1".to_string(),
            similarity_type: SimilarityType::Exact,
            confidence: 100,
            reviewed: false,
            members: vec![DuplicateMemberRecord { image_id: "img1".to_string(), similarity_score: 100 }],
        }];

        assert!(store.replace_duplicate_groups("cat1", &groups).is_err());
    }

    #[test]
    fn replace_duplicate_groups_clears_prior_run() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_catalog("cat1", "Test", &[]).unwrap();

        let make_group = |id: &str| DuplicateGroupRecord {
            id: id.to_string(),
            catalog_id: "cat1".to_string(),
            primary_image_id: "img1".to_string(),
            similarity_type: SimilarityType::Exact,
            confidence: 100,
            reviewed: false,
            members: vec![
                DuplicateMemberRecord { image_id: "img1".to_string(), similarity_score: 100 },
                DuplicateMemberRecord { image_id: "img2".to_string(), similarity_score: 100 },
            ],
        };

        store.replace_duplicate_groups("cat1", &[make_group("g1")]).unwrap();
        store.replace_duplicate_groups("cat1", &[make_group("g2")]).unwrap();

        let groups = store.list_duplicate_groups("cat1").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "g2");
    }

    #[test]
    fn publish_never_fails_caller() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        let result = store.publish("catalog:cat1", &serde_json::json!({"type": "progress"}));
        assert!(result.is_ok());
    }

    #[test]
    fn get_image_path_reports_missing_image() {
        let store = SqliteCatalog::open_in_memory().unwrap();
        store.create_catalog("cat1", "Test", &[]).unwrap();
        assert!(store.get_image_path("cat1", "missing").is_err());
    }
}
