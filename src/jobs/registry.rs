//! The builtin job table (C6/C7): wires the six registered job types to the
//! C1-C3 analysis primitives and the catalog gateway. Grounded on the same
//! closure-table shape as `definition.rs`; this module is just where that
//! table gets populated.

use crate::catalog::model::{BurstRecord, DuplicateGroupRecord, DuplicateMemberRecord, Image};
use crate::catalog::CatalogGateway;
use crate::core::burst::{self, BurstImage, BurstParams};
use crate::core::comparator::{self, ImageRecord, SimilarityType};
use crate::core::hasher::{hash_all_file, ImageHashValue};
use crate::core::metadata;
use crate::core::quality::QualityAnalyzer;
use crate::core::scanner::{MediaKind, PhotoScanner, ScanConfig, WalkDirScanner};
use crate::error::{CatalogError, GroupError, JobError};
use crate::jobs::definition::{JobContext, JobDefinition};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// A process-wide table of registered job types, looked up by name when a
/// job is submitted.
pub struct JobRegistry {
    definitions: HashMap<&'static str, Arc<JobDefinition>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self { definitions: HashMap::new() }
    }

    pub fn register(&mut self, definition: JobDefinition) {
        self.definitions.insert(definition.job_type, Arc::new(definition));
    }

    pub fn get(&self, job_type: &str) -> Result<Arc<JobDefinition>, JobError> {
        self.definitions
            .get(job_type)
            .cloned()
            .ok_or_else(|| JobError::UnknownJobType { job_type: job_type.to_string() })
    }

    pub fn job_types(&self) -> Vec<&'static str> {
        self.definitions.keys().copied().collect()
    }

    /// The six job types spec.md §4.7 names, each wired to its primitive.
    pub fn with_builtin_jobs() -> Self {
        let mut registry = Self::new();
        registry.register(scan_job());
        registry.register(detect_duplicates_job());
        registry.register(detect_bursts_job());
        registry.register(generate_thumbnails_job());
        registry.register(score_quality_job());
        registry.register(auto_tag_job());
        registry
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn sha256_checksum(path: &Path) -> Result<String, JobError> {
    let bytes = std::fs::read(path).map_err(|e| JobError::DiscoveryFailed(format!("reading {}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// `scan`: discover = one work item per configured source directory,
/// process = walk that directory and upsert every discovered file as an
/// `Image` row (grounded on `core::scanner::WalkDirScanner`).
fn scan_job() -> JobDefinition {
    JobDefinition::builder(
        "scan",
        Box::new(|ctx: &JobContext| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let directories = if let Some(paths) = ctx.parameters.get("directories").and_then(|v| v.as_array()) {
                paths.iter().filter_map(|v| v.as_str().map(String::from)).collect::<Vec<_>>()
            } else {
                ctx.catalog.list_source_directories(&catalog_id).map_err(JobError::Catalog)?
            };
            Ok(directories.into_iter().map(|dir| json!({ "directory": dir })).collect())
        }),
        Box::new(|ctx: &JobContext, item: &Value| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let directory = item
                .get("directory")
                .and_then(|v| v.as_str())
                .ok_or_else(|| JobError::DiscoveryFailed("scan work item missing directory".to_string()))?;

            let scanner = WalkDirScanner::new(ScanConfig::default());
            let result = scanner
                .scan(&[PathBuf::from(directory)])
                .map_err(|e| JobError::DiscoveryFailed(e.to_string()))?;

            let mut inserted = 0usize;
            for photo in &result.photos {
                let checksum = sha256_checksum(&photo.path)?;
                let metadata = metadata::extract_metadata(&photo.path);
                let mut image = Image::new(
                    Uuid::new_v4().to_string(),
                    catalog_id.clone(),
                    photo.path.to_string_lossy().into_owned(),
                    checksum,
                    photo.size,
                    photo.format.media_kind(),
                );
                if let Some(taken) = metadata.date_taken {
                    image.dates.insert(
                        "taken".to_string(),
                        crate::catalog::model::DateEntry { timestamp: taken, confidence: "exif".to_string() },
                    );
                }
                image.metadata = json!({
                    "camera": metadata.camera_display(),
                    "width": metadata.width,
                    "height": metadata.height,
                });
                ctx.catalog.upsert_image(&image).map_err(JobError::Catalog)?;
                inserted += 1;
            }

            Ok(json!({
                "directory": directory,
                "discovered": inserted,
                "scan_errors": result.errors.len(),
            }))
        }),
    )
    .batch_size(4)
    .max_workers(4)
    .build()
}

/// `detect_duplicates`: discover = one work item per image missing a hash,
/// process = compute and persist dHash/aHash/wHash for that image, finalize
/// = group every hashed image by checksum and perceptual distance and
/// replace the catalog's duplicate groups (grounded on
/// `core::comparator::grouper`).
fn detect_duplicates_job() -> JobDefinition {
    JobDefinition::builder(
        "detect_duplicates",
        Box::new(|ctx: &JobContext| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let recompute = ctx.parameters.get("recompute_hashes").and_then(|v| v.as_bool()).unwrap_or(false);
            let ids = if recompute {
                ctx.catalog
                    .list_images_with_hashes(&catalog_id)
                    .map_err(JobError::Catalog)?
                    .into_iter()
                    .map(|r| r.id)
                    .collect()
            } else {
                ctx.catalog.list_images_without_hashes(&catalog_id).map_err(JobError::Catalog)?
            };
            Ok(ids.into_iter().map(|id| json!({ "image_id": id })).collect())
        }),
        Box::new(|ctx: &JobContext, item: &Value| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let image_id = item
                .get("image_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| JobError::DiscoveryFailed("missing image_id".to_string()))?;

            let path = ctx.catalog.get_image_path(&catalog_id, image_id).map_err(JobError::Catalog)?;
            let hashes = hash_all_file(Path::new(&path))
                .map_err(|e| JobError::DiscoveryFailed(format!("hashing {path}: {e}")))?;

            ctx.catalog
                .update_image_hashes(image_id, &hashes.dhash.to_hex(), &hashes.ahash.to_hex(), &hashes.whash.to_hex())
                .map_err(JobError::Catalog)?;

            Ok(json!({ "image_id": image_id }))
        }),
    )
    .finalize(|ctx: &JobContext, _results: &[Value]| {
        let catalog_id = ctx.require_catalog_id()?.to_string();
        // spec.md §6: `similarity_threshold` (default 5), `hash_kind`
        // (default dhash) are the recognized `detect_duplicates` parameters.
        let threshold = ctx.parameters.get("similarity_threshold").and_then(|v| v.as_u64()).unwrap_or(5) as u32;
        let hash_kind = ctx
            .parameters
            .get("hash_kind")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<crate::core::hasher::HashAlgorithmKind>().ok())
            .unwrap_or(crate::core::hasher::HashAlgorithmKind::Difference);

        let rows = ctx.catalog.list_images_with_hashes(&catalog_id).map_err(JobError::Catalog)?;
        let records: Vec<ImageRecord<String>> = rows
            .iter()
            .map(|r| ImageRecord {
                id: r.id.clone(),
                checksum: r.checksum.clone(),
                quality_score: r.quality_score,
                size_bytes: r.size_bytes,
            })
            .collect();

        let mut exact_groups = comparator::group_exact(&records);

        // A hash stored with the wrong digit count is data corruption, not
        // a per-item skip — surfacing it fails the finalizer (spec.md §7:
        // finalizer failures are job-fatal) rather than silently excluding
        // the image from every duplicate group it should have joined.
        let mut selected_hashes: HashMap<String, ImageHashValue> = HashMap::new();
        for r in &rows {
            let hex = match hash_kind {
                crate::core::hasher::HashAlgorithmKind::Difference => r.dhash.as_ref(),
                crate::core::hasher::HashAlgorithmKind::Average => r.ahash.as_ref(),
                crate::core::hasher::HashAlgorithmKind::Wavelet => r.whash.as_ref(),
            };
            if let Some(hex) = hex {
                let hash = ImageHashValue::from_hex(hex, hash_kind)
                    .map_err(|_| JobError::FinalizeFailed(GroupError::MalformedHash { value: hex.clone() }.to_string()))?;
                selected_hashes.insert(r.id.clone(), hash);
            }
        }

        // Images already claimed by an exact group are excluded from
        // perceptual grouping so a group never contains the same pair twice.
        let exact_member_ids: HashSet<&String> = exact_groups.iter().flat_map(|g| g.members.iter().map(|m| &m.image_id)).collect();
        let remaining_records: Vec<ImageRecord<String>> = records.into_iter().filter(|r| !exact_member_ids.contains(&r.id)).collect();

        let perceptual_groups = comparator::group_perceptual(&remaining_records, &selected_hashes, threshold);

        let mut all_groups = Vec::new();
        all_groups.append(&mut exact_groups);
        all_groups.extend(perceptual_groups);

        let records: Vec<DuplicateGroupRecord> = all_groups
            .into_iter()
            .map(|g| DuplicateGroupRecord {
                id: Uuid::new_v4().to_string(),
                catalog_id: catalog_id.clone(),
                primary_image_id: g.primary_image_id,
                similarity_type: g.similarity_type,
                confidence: g.confidence,
                reviewed: false,
                members: g
                    .members
                    .into_iter()
                    .map(|m| DuplicateMemberRecord { image_id: m.image_id, similarity_score: m.similarity_score })
                    .collect(),
            })
            .collect();

        let group_count = records.len();
        ctx.catalog.replace_duplicate_groups(&catalog_id, &records).map_err(JobError::Catalog)?;
        Ok(json!({ "duplicate_groups": group_count }))
    })
    .batch_size(200)
    .max_workers(4)
    .build()
}

/// `detect_bursts`: no useful per-item work precedes the aggregate — the
/// single finalizer does the whole computation (grounded on
/// `core::burst::detect_bursts`/`select_best`). Discover still produces one
/// work item so the batch/claim machinery has something to run.
fn detect_bursts_job() -> JobDefinition {
    JobDefinition::builder(
        "detect_bursts",
        Box::new(|_ctx: &JobContext| Ok(vec![json!({})])),
        Box::new(|_ctx: &JobContext, _item: &Value| Ok(json!({}))),
    )
    .finalize(|ctx: &JobContext, _results: &[Value]| {
        let catalog_id = ctx.require_catalog_id()?.to_string();
        let params = BurstParams {
            gap_threshold: ctx.parameters.get("gap_threshold").and_then(|v| v.as_f64()).unwrap_or(1.0),
            min_size: ctx.parameters.get("min_size").and_then(|v| v.as_u64()).unwrap_or(3) as usize,
            min_duration: ctx.parameters.get("min_duration").and_then(|v| v.as_f64()).unwrap_or(0.5),
        };
        let method = ctx
            .parameters
            .get("selection_method")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(burst::SelectionMethod::Quality);

        let rows = ctx.catalog.list_images_with_timestamps(&catalog_id).map_err(JobError::Catalog)?;
        let images: Vec<BurstImage<String>> = rows
            .iter()
            .map(|r| BurstImage { id: r.id.clone(), timestamp: r.timestamp, camera: r.camera.clone(), quality_score: r.quality_score })
            .collect();
        let by_id: HashMap<String, &BurstImage<String>> = images.iter().map(|img| (img.id.clone(), img)).collect();

        let detected = burst::detect_bursts(&images, &params).map_err(|e| JobError::FinalizeFailed(e.to_string()))?;

        let records: Vec<BurstRecord> = detected
            .iter()
            .map(|b| {
                let best_image_id = Some(burst::select_best(b, &by_id, method));
                BurstRecord {
                    id: Uuid::new_v4().to_string(),
                    catalog_id: catalog_id.clone(),
                    image_ids: b.image_ids.clone(),
                    image_count: b.image_ids.len(),
                    start_time: b.start_time,
                    end_time: b.end_time,
                    duration_seconds: b.duration_seconds,
                    camera_make: b.camera.clone(),
                    camera_model: None,
                    best_image_id,
                    selection_method: method,
                }
            })
            .collect();

        let burst_count = records.len();
        ctx.catalog.replace_burst_groups(&catalog_id, &records).map_err(JobError::Catalog)?;
        Ok(json!({ "bursts": burst_count }))
    })
    .batch_size(1)
    .max_workers(1)
    .build()
}

/// `generate_thumbnails`: discover = one work item per image missing a
/// thumbnail, process = decode, downscale, write a JPEG thumbnail next to
/// the catalog database, and record its path.
fn generate_thumbnails_job() -> JobDefinition {
    JobDefinition::builder(
        "generate_thumbnails",
        Box::new(|ctx: &JobContext| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let rows = ctx.catalog.list_images_with_hashes(&catalog_id).map_err(JobError::Catalog)?;
            let mut items = Vec::new();
            for row in rows {
                if let Some(image) = ctx.catalog.get_image(&catalog_id, &row.id).map_err(JobError::Catalog)? {
                    if image.thumbnail_path.is_none() && matches!(image.file_type, MediaKind::Image) {
                        items.push(json!({ "image_id": row.id }));
                    }
                }
            }
            Ok(items)
        }),
        Box::new(|ctx: &JobContext, item: &Value| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let image_id = item
                .get("image_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| JobError::DiscoveryFailed("missing image_id".to_string()))?;

            let source_path = ctx.catalog.get_image_path(&catalog_id, image_id).map_err(JobError::Catalog)?;
            // spec.md §6: `generate_thumbnails` recognizes `size_px`
            // (default 256) and `quality` (default 85, JPEG encode quality).
            let size = ctx.parameters.get("size_px").and_then(|v| v.as_u64()).unwrap_or(256) as u32;
            let quality = ctx.parameters.get("quality").and_then(|v| v.as_u64()).unwrap_or(85).clamp(1, 100) as u8;

            let image = image::open(&source_path).map_err(|e| JobError::DiscoveryFailed(format!("decoding {source_path}: {e}")))?;
            let thumbnail = image.thumbnail(size, size);

            let thumbnail_dir = thumbnail_dir_for(ctx.catalog.db_path());
            std::fs::create_dir_all(&thumbnail_dir)
                .map_err(|e| JobError::DiscoveryFailed(format!("creating {}: {e}", thumbnail_dir.display())))?;
            let thumbnail_path = thumbnail_dir.join(format!("{image_id}.jpg"));
            let mut out = std::fs::File::create(&thumbnail_path)
                .map_err(|e| JobError::DiscoveryFailed(format!("creating {}: {e}", thumbnail_path.display())))?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            thumbnail
                .write_with_encoder(encoder)
                .map_err(|e| JobError::DiscoveryFailed(format!("saving {}: {e}", thumbnail_path.display())))?;

            ctx.catalog
                .update_image_thumbnail(&catalog_id, image_id, &thumbnail_path.to_string_lossy())
                .map_err(JobError::Catalog)?;

            Ok(json!({ "image_id": image_id, "thumbnail_path": thumbnail_path.to_string_lossy() }))
        }),
    )
    .batch_size(50)
    .max_workers(4)
    .build()
}

fn thumbnail_dir_for(db_path: &Path) -> PathBuf {
    if db_path == Path::new(":memory:") {
        return std::env::temp_dir().join("photo-catalog-thumbnails");
    }
    db_path.with_extension("thumbnails")
}

/// `score_quality`: discover = one work item per image missing a quality
/// score, process = run `core::quality::QualityAnalyzer` against the source
/// file and persist the result.
fn score_quality_job() -> JobDefinition {
    JobDefinition::builder(
        "score_quality",
        Box::new(|ctx: &JobContext| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let rows = ctx.catalog.list_images_with_hashes(&catalog_id).map_err(JobError::Catalog)?;
            Ok(rows
                .into_iter()
                .filter(|r| r.quality_score.is_none())
                .map(|r| json!({ "image_id": r.id }))
                .collect())
        }),
        Box::new(|ctx: &JobContext, item: &Value| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let image_id = item
                .get("image_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| JobError::DiscoveryFailed("missing image_id".to_string()))?;

            let source_path = ctx.catalog.get_image_path(&catalog_id, image_id).map_err(JobError::Catalog)?;
            let analyzer = QualityAnalyzer::default();
            let score = analyzer
                .analyze_file(Path::new(&source_path))
                .map_err(|e| JobError::DiscoveryFailed(format!("analyzing {source_path}: {e}")))?;

            let quality_score = score.overall.round().clamp(0.0, 100.0) as u8;
            ctx.catalog.update_image_quality(&catalog_id, image_id, quality_score).map_err(JobError::Catalog)?;

            Ok(json!({ "image_id": image_id, "quality_score": quality_score }))
        }),
    )
    .batch_size(100)
    .max_workers(4)
    .build()
}

/// `auto_tag`: discover = one work item per image, process = derive a
/// small set of heuristic tags from EXIF metadata and quality score (no ML
/// model ships with this crate; the hook is the EXIF/quality data already
/// in the catalog).
fn auto_tag_job() -> JobDefinition {
    JobDefinition::builder(
        "auto_tag",
        Box::new(|ctx: &JobContext| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let rows = ctx.catalog.list_images_with_hashes(&catalog_id).map_err(JobError::Catalog)?;
            Ok(rows.into_iter().map(|r| json!({ "image_id": r.id })).collect())
        }),
        Box::new(|ctx: &JobContext, item: &Value| {
            let catalog_id = ctx.require_catalog_id()?.to_string();
            let image_id = item
                .get("image_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| JobError::DiscoveryFailed("missing image_id".to_string()))?;

            let image = ctx
                .catalog
                .get_image(&catalog_id, image_id)
                .map_err(JobError::Catalog)?
                .ok_or_else(|| JobError::Catalog(CatalogError::ImageNotFound { catalog_id: catalog_id.clone(), image_id: image_id.to_string() }))?;

            // spec.md §6: `auto_tag` recognizes `model` (recorded against
            // the image so callers can see which pluggable tagger ran) and
            // `top_k` (caps how many tags survive, highest-confidence first).
            let model = ctx.parameters.get("model").and_then(|v| v.as_str()).unwrap_or("heuristic-v1").to_string();
            let top_k = ctx.parameters.get("top_k").and_then(|v| v.as_u64()).map(|n| n as usize);

            let mut tags: Vec<(String, Option<f64>)> = Vec::new();
            if let Some(quality) = image.quality_score {
                if quality >= 70 {
                    tags.push(("high_quality".to_string(), Some(quality as f64 / 100.0)));
                } else if quality < 30 {
                    tags.push(("low_quality".to_string(), Some(1.0 - quality as f64 / 100.0)));
                }
            }
            if let Some(camera) = image.metadata.get("camera").and_then(|v| v.as_str()) {
                tags.push((format!("camera:{camera}"), Some(1.0)));
            }
            if let (Some(width), Some(height)) = (
                image.metadata.get("width").and_then(|v| v.as_u64()),
                image.metadata.get("height").and_then(|v| v.as_u64()),
            ) {
                let megapixels = (width * height) as f64 / 1_000_000.0;
                if megapixels >= 12.0 {
                    tags.push(("high_resolution".to_string(), Some(1.0)));
                }
            }

            tags.sort_by(|a, b| b.1.unwrap_or(0.0).total_cmp(&a.1.unwrap_or(0.0)));
            if let Some(k) = top_k {
                tags.truncate(k);
            }

            let tag_count = tags.len();
            ctx.catalog.apply_auto_tags(&catalog_id, image_id, &tags, &model).map_err(JobError::Catalog)?;
            Ok(json!({ "image_id": image_id, "tags_applied": tag_count }))
        }),
    )
    .batch_size(200)
    .max_workers(4)
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_includes_all_builtin_job_types() {
        let registry = JobRegistry::with_builtin_jobs();
        let mut types = registry.job_types();
        types.sort_unstable();
        assert_eq!(types, vec!["auto_tag", "detect_bursts", "detect_duplicates", "generate_thumbnails", "scan", "score_quality"]);
    }

    #[test]
    fn unknown_job_type_is_an_error() {
        let registry = JobRegistry::with_builtin_jobs();
        assert!(registry.get("nonexistent").is_err());
    }
}
