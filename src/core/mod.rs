//! # Core Module
//!
//! The per-item analysis primitives (C1-C3): GUI/catalog-agnostic building
//! blocks with no knowledge of jobs, batches, or persistence.
//!
//! ## Modules
//! - `scanner` - discovers media files in directories
//! - `hasher` - computes perceptual hashes (C1)
//! - `comparator` - groups duplicates by checksum or perceptual hash (C2)
//! - `burst` - clusters bursts of photos taken in quick succession (C3)
//! - `metadata` - extracts EXIF timestamps and camera info
//! - `quality` - scores image sharpness/contrast/brightness

pub mod burst;
pub mod comparator;
pub mod hasher;
pub mod metadata;
pub mod quality;
pub mod scanner;

// Re-export commonly used types
pub use burst::{BurstParams, DetectedBurst, SelectionMethod};
pub use comparator::{DuplicateGroup, DuplicateMember, SimilarityType};
pub use hasher::{HashAlgorithmKind, PerceptualHash};
pub use scanner::PhotoFile;
