//! # Hasher Module
//!
//! Computes perceptual hashes for images (C1 in the job-execution-core
//! design: hash primitives).
//!
//! ## Supported Algorithms
//! - **dHash (Difference Hash)** - best balance of speed and accuracy
//! - **aHash (Average Hash)** - fastest, good for exact duplicates
//! - **wHash (Wavelet Hash)** - most robust to recompression noise
//!
//! Every algorithm in this crate produces a fixed 64-bit (8x8) hash,
//! returned as 16 lowercase hex digits — this is a catalog-wide invariant
//! (an `Image`'s `dhash`/`ahash`/`whash` columns are always 16 hex digits).
//!
//! ## Performance Optimizations
//! - Uses `zune-jpeg` for 1.5-2x faster JPEG decoding
//! - Uses `fast_image_resize` for 5-14x faster SIMD-accelerated resizing
//!
//! ## Example
//! ```rust,ignore
//! use photo_catalog_jobs::core::hasher::{HasherConfig, HashAlgorithmKind};
//!
//! let hasher = HasherConfig::new()
//!     .algorithm(HashAlgorithmKind::Difference)
//!     .build()?;
//!
//! let hash = hasher.hash_file(&path)?;
//! ```

mod algorithms;
pub mod fast_decode;
pub mod fast_resize;
mod traits;

pub use algorithms::{AverageHasher, DifferenceHasher, WaveletHasher};
pub use traits::{similarity_score, HashAlgorithm, HashAlgorithmKind, ImageHashValue, PerceptualHash, HASH_BITS};

// Re-export PerceptualHash for external use
pub use traits::PerceptualHash as _;

use crate::error::HashError;
use fast_decode::FastDecoder;
use image::DynamicImage;
use rayon::prelude::*;
use std::path::Path;

/// Fixed hash grid size (8x8 = 64 bits) used for every algorithm in this crate.
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Configuration builder for hashers
#[derive(Debug, Clone)]
pub struct HasherConfig {
    /// Algorithm to use
    algorithm: HashAlgorithmKind,
}

impl HasherConfig {
    /// Create a new hasher configuration with defaults (dHash)
    pub fn new() -> Self {
        Self {
            algorithm: HashAlgorithmKind::Difference,
        }
    }

    /// Set the hash algorithm
    pub fn algorithm(mut self, algorithm: HashAlgorithmKind) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Build the hasher. Hash size is always 8 (64 bits) — spec.md fixes
    /// this crate-wide, so unlike the teacher's original builder there is
    /// no caller-configurable `hash_size` knob.
    pub fn build(self) -> Result<Box<dyn HashAlgorithm>, HashError> {
        match self.algorithm {
            HashAlgorithmKind::Average => Ok(Box::new(AverageHasher::new(DEFAULT_HASH_SIZE))),
            HashAlgorithmKind::Difference => Ok(Box::new(DifferenceHasher::new(DEFAULT_HASH_SIZE))),
            HashAlgorithmKind::Wavelet => Ok(Box::new(WaveletHasher::new(DEFAULT_HASH_SIZE))),
        }
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// All three perceptual hashes for a single image, computed from one decode.
///
/// `detect_duplicates.process` (spec.md §4.8) computes dHash/aHash/wHash for
/// one image per invocation; decoding once and running all three algorithms
/// against the same `DynamicImage` avoids three redundant file reads.
pub struct AllHashes {
    pub dhash: ImageHashValue,
    pub ahash: ImageHashValue,
    pub whash: ImageHashValue,
}

/// Compute dHash, aHash, and wHash for a file in a single decode.
pub fn hash_all_file(path: &Path) -> Result<AllHashes, HashError> {
    let image = FastDecoder::decode(path)?;
    hash_all_image(&image)
}

/// Compute dHash, aHash, and wHash for an already-decoded image.
///
/// The three algorithms are independent passes over the same decoded
/// image, so they fan out across rayon's global pool the same way the
/// teacher's `Pipeline::hash_photos` parallelizes per-photo hashing —
/// here the parallelism is per-algorithm rather than per-photo, since a
/// `detect_duplicates` work item is already one photo.
pub fn hash_all_image(image: &DynamicImage) -> Result<AllHashes, HashError> {
    let jobs: [Box<dyn Fn() -> Result<ImageHashValue, HashError> + Sync>; 3] = [
        Box::new(|| DifferenceHasher::new(DEFAULT_HASH_SIZE).hash_image(image)),
        Box::new(|| AverageHasher::new(DEFAULT_HASH_SIZE).hash_image(image)),
        Box::new(|| WaveletHasher::new(DEFAULT_HASH_SIZE).hash_image(image)),
    ];
    let mut results: Vec<Result<ImageHashValue, HashError>> = jobs.par_iter().map(|job| job()).collect();
    let whash = results.pop().expect("three jobs");
    let ahash = results.pop().expect("three jobs");
    let dhash = results.pop().expect("three jobs");
    Ok(AllHashes { dhash: dhash?, ahash: ahash?, whash: whash? })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_dhash() {
        let config = HasherConfig::new();
        assert_eq!(config.algorithm, HashAlgorithmKind::Difference);
    }

    #[test]
    fn config_builder_works() {
        let config = HasherConfig::new().algorithm(HashAlgorithmKind::Average);
        assert_eq!(config.algorithm, HashAlgorithmKind::Average);
    }

    #[test]
    fn build_creates_hasher() {
        let hasher = HasherConfig::new().build();
        assert!(hasher.is_ok());
    }

    #[test]
    fn hash_all_produces_three_64_bit_hashes() {
        use image::{ImageBuffer, Rgb};

        let buffer = ImageBuffer::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let image = DynamicImage::ImageRgb8(buffer);

        let hashes = hash_all_image(&image).unwrap();
        assert_eq!(hashes.dhash.as_bytes().len(), 8);
        assert_eq!(hashes.ahash.as_bytes().len(), 8);
        assert_eq!(hashes.whash.as_bytes().len(), 8);
    }
}
