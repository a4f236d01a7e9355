//! Trait definitions for perceptual hashing.

use super::fast_decode::FastDecoder;
use crate::error::HashError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed hash width in bits for every algorithm in this crate (8x8 grid).
pub const HASH_BITS: u32 = 64;

/// A computed perceptual hash that can be compared
pub trait PerceptualHash: Clone + Send + Sync {
    /// Compute the Hamming distance to another hash
    ///
    /// Returns the number of bits that differ between the two hashes.
    /// Lower distance = more similar images.
    fn distance(&self, other: &Self) -> u32;

    /// Get the raw hash bytes
    fn as_bytes(&self) -> &[u8];

    /// Get the hash as a hexadecimal string (16 lowercase hex digits)
    fn to_hex(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Get the total number of bits in this hash
    fn bit_count(&self) -> u32 {
        (self.as_bytes().len() * 8) as u32
    }

    /// Calculate similarity as a float percentage (0.0-100.0)
    fn similarity(&self, other: &Self) -> f64 {
        let distance = self.distance(other);
        let max_distance = self.bit_count();
        if max_distance == 0 {
            return 100.0;
        }
        (1.0 - (distance as f64 / max_distance as f64)) * 100.0
    }
}

/// Available hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithmKind {
    /// Average Hash (aHash) - thresholds against the mean pixel value
    Average,
    /// Difference Hash (dHash) - thresholds adjacent-pixel gradients
    Difference,
    /// Wavelet Hash (wHash) - thresholds the low-frequency Haar approximation
    Wavelet,
}

impl HashAlgorithmKind {
    /// Get a human-readable description of the algorithm
    pub fn description(&self) -> &'static str {
        match self {
            HashAlgorithmKind::Average => {
                "Average Hash (aHash) - thresholds against mean brightness"
            }
            HashAlgorithmKind::Difference => {
                "Difference Hash (dHash) - thresholds brightness gradients between pixels"
            }
            HashAlgorithmKind::Wavelet => {
                "Wavelet Hash (wHash) - thresholds the low-frequency Haar approximation"
            }
        }
    }
}

impl std::fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithmKind::Average => write!(f, "aHash"),
            HashAlgorithmKind::Difference => write!(f, "dHash"),
            HashAlgorithmKind::Wavelet => write!(f, "wHash"),
        }
    }
}

impl std::str::FromStr for HashAlgorithmKind {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ahash" | "average" => Ok(HashAlgorithmKind::Average),
            "dhash" | "difference" => Ok(HashAlgorithmKind::Difference),
            "whash" | "wavelet" => Ok(HashAlgorithmKind::Wavelet),
            other => Err(HashError::ComputationFailed(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}

/// Trait for hash algorithm implementations
pub trait HashAlgorithm: Send + Sync {
    /// Compute a hash from an already-loaded image
    fn hash_image(&self, image: &DynamicImage) -> Result<ImageHashValue, HashError>;

    /// Compute a hash directly from a file path.
    ///
    /// Uses fast decoders for optimal performance:
    /// - JPEG: zune-jpeg (1.5-2x faster)
    /// - Other formats: image crate fallback
    fn hash_file(&self, path: &Path) -> Result<ImageHashValue, HashError> {
        let image = FastDecoder::decode(path)?;
        self.hash_image(&image)
    }

    /// Get the algorithm kind
    fn kind(&self) -> HashAlgorithmKind;
}

/// Concrete hash value type. Always 8 bytes (64 bits) for every algorithm
/// this crate produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHashValue {
    /// The raw hash bytes
    bytes: Vec<u8>,
    /// The algorithm that produced this hash
    algorithm: HashAlgorithmKind,
}

impl ImageHashValue {
    /// Create a new hash value
    pub fn new(bytes: Vec<u8>, algorithm: HashAlgorithmKind) -> Self {
        Self { bytes, algorithm }
    }

    /// Create from raw bytes (for catalog restoration)
    pub fn from_bytes(bytes: &[u8], algorithm: HashAlgorithmKind) -> Self {
        Self {
            bytes: bytes.to_vec(),
            algorithm,
        }
    }

    /// Parse from a 16-digit lowercase hex string as stored in the catalog
    pub fn from_hex(hex: &str, algorithm: HashAlgorithmKind) -> Result<Self, HashError> {
        if hex.len() != 16 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashError::ComputationFailed(format!(
                "expected 16 hex digits, got {hex:?}"
            )));
        }
        let mut bytes = Vec::with_capacity(8);
        for i in 0..8 {
            let byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| HashError::ComputationFailed(e.to_string()))?;
            bytes.push(byte);
        }
        Ok(Self { bytes, algorithm })
    }

    /// Get the algorithm that produced this hash
    pub fn algorithm(&self) -> HashAlgorithmKind {
        self.algorithm
    }

    /// `popcount(self xor other)` over the fixed 64-bit width
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        self.distance(other)
    }

    /// `100 * (1 - distance/64)`, rounded toward zero, as an integer 0-100
    pub fn similarity_score(&self, other: &Self) -> u32 {
        similarity_score(self.distance(other))
    }
}

/// Free function form of the similarity formula, for callers holding only a
/// raw distance (e.g. after aggregating across a group).
pub fn similarity_score(distance: u32) -> u32 {
    let distance = distance.min(HASH_BITS);
    ((HASH_BITS - distance) * 100) / HASH_BITS
}

impl PerceptualHash for ImageHashValue {
    fn distance(&self, other: &Self) -> u32 {
        // Hamming distance: count differing bits
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_hash(bytes: &[u8]) -> ImageHashValue {
        ImageHashValue::new(bytes.to_vec(), HashAlgorithmKind::Difference)
    }

    #[test]
    fn distance_to_self_is_zero() {
        let hash = create_test_hash(&[0xFF, 0x00, 0xAA, 0x55, 0, 0, 0, 0]);
        assert_eq!(hash.distance(&hash), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let hash_a = create_test_hash(&[0xFF, 0x00, 0, 0, 0, 0, 0, 0]);
        let hash_b = create_test_hash(&[0x00, 0xFF, 0, 0, 0, 0, 0, 0]);

        assert_eq!(hash_a.distance(&hash_b), hash_b.distance(&hash_a));
    }

    #[test]
    fn distance_counts_differing_bits() {
        let hash_a = create_test_hash(&[0b11111111, 0, 0, 0, 0, 0, 0, 0]);
        let hash_b = create_test_hash(&[0b00000000, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(hash_a.distance(&hash_b), 8);
    }

    #[test]
    fn similarity_is_100_for_identical() {
        let hash = create_test_hash(&[0xFF, 0x00, 0, 0, 0, 0, 0, 0]);
        assert_eq!(hash.similarity(&hash), 100.0);
        assert_eq!(hash.similarity_score(&hash), 100);
    }

    #[test]
    fn similarity_score_rounds_toward_zero() {
        // distance 1 out of 64: 100*(1-1/64) = 98.4375 -> truncates to 98
        assert_eq!(similarity_score(1), 98);
        // distance 63 out of 64: 100*(1/64) = 1.5625 -> truncates to 1
        assert_eq!(similarity_score(63), 1);
    }

    #[test]
    fn similarity_is_0_for_opposite() {
        let hash_a = create_test_hash(&[0xFF, 0, 0, 0, 0, 0, 0, 0]);
        let hash_b = create_test_hash(&[0x00, 0, 0, 0, 0, 0, 0, 0]);

        assert_eq!(hash_a.similarity(&hash_b), 100.0 - (8.0 / 64.0) * 100.0);
    }

    #[test]
    fn to_hex_produces_16_digit_string() {
        let hash = create_test_hash(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(hash.to_hex(), "deadbeef01020304");
        assert_eq!(hash.to_hex().len(), 16);
    }

    #[test]
    fn from_hex_round_trips() {
        let hash = create_test_hash(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04]);
        let parsed = ImageHashValue::from_hex(&hash.to_hex(), HashAlgorithmKind::Difference)
            .expect("valid hex");
        assert_eq!(parsed.distance(&hash), 0);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let result = ImageHashValue::from_hex("abcd", HashAlgorithmKind::Average);
        assert!(result.is_err());
    }

    #[test]
    fn algorithm_kind_display() {
        assert_eq!(HashAlgorithmKind::Average.to_string(), "aHash");
        assert_eq!(HashAlgorithmKind::Difference.to_string(), "dHash");
        assert_eq!(HashAlgorithmKind::Wavelet.to_string(), "wHash");
    }

    #[test]
    fn algorithm_kind_from_str() {
        use std::str::FromStr;
        assert_eq!(
            HashAlgorithmKind::from_str("dhash").unwrap(),
            HashAlgorithmKind::Difference
        );
        assert!(HashAlgorithmKind::from_str("bogus").is_err());
    }
}
