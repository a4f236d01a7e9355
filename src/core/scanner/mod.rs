//! # Scanner Module
//!
//! Discovers media files in directories for the `scan` job's `discover`
//! step.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg), PNG (.png), WebP (.webp), HEIC/HEIF (.heic, .heif),
//!   GIF (.gif), BMP (.bmp), TIFF (.tiff, .tif)
//! - RAW (.raw, .cr2, .nef, .arw, .dng)
//! - Video (.mp4, .mov, .avi, .mkv)
//!
//! ## Example
//! ```rust,ignore
//! use photo_catalog_jobs::core::scanner::{WalkDirScanner, PhotoScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let photos = scanner.scan(&["/Users/photos".into()])?;
//! ```

mod filter;
mod walker;

pub use filter::ImageFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Represents a discovered photo file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoFile {
    /// Path to the photo file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Detected image format
    pub format: ImageFormat,
}

/// Supported media formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Heic,
    Gif,
    Bmp,
    Tiff,
    Raw,
    Mp4,
    Mov,
    Avi,
    Mkv,
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "webp" => ImageFormat::WebP,
            "heic" | "heif" => ImageFormat::Heic,
            "gif" => ImageFormat::Gif,
            "bmp" => ImageFormat::Bmp,
            "tiff" | "tif" => ImageFormat::Tiff,
            "raw" | "cr2" | "nef" | "arw" | "dng" => ImageFormat::Raw,
            "mp4" => ImageFormat::Mp4,
            "mov" => ImageFormat::Mov,
            "avi" => ImageFormat::Avi,
            "mkv" => ImageFormat::Mkv,
            _ => ImageFormat::Unknown,
        }
    }

    /// Check if this format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, ImageFormat::Unknown)
    }

    /// Whether the catalog should record this file as `file_type = video`.
    pub fn media_kind(&self) -> MediaKind {
        match self {
            ImageFormat::Mp4 | ImageFormat::Mov | ImageFormat::Avi | ImageFormat::Mkv => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }
}

/// The catalog's `Image.file_type` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Successfully discovered photos
    pub photos: Vec<PhotoFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for photo scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait PhotoScanner: Send + Sync {
    /// Scan directories and return discovered photos
    fn scan(&self, paths: &[PathBuf]) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events
    fn scan_with_events(
        &self,
        paths: &[PathBuf],
        events: &EventSender,
    ) -> Result<ScanResult, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_format_from_extension_lowercase() {
        assert_eq!(ImageFormat::from_extension("jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("jpeg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("heic"), ImageFormat::Heic);
    }

    #[test]
    fn image_format_from_extension_uppercase() {
        assert_eq!(ImageFormat::from_extension("JPG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("PNG"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("HEIC"), ImageFormat::Heic);
    }

    #[test]
    fn unknown_extension_returns_unknown() {
        assert_eq!(ImageFormat::from_extension("txt"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_extension("pdf"), ImageFormat::Unknown);
    }

    #[test]
    fn unknown_format_is_not_supported() {
        assert!(!ImageFormat::Unknown.is_supported());
        assert!(ImageFormat::Jpeg.is_supported());
    }

    #[test]
    fn raw_extensions_detected() {
        for ext in ["raw", "cr2", "nef", "arw", "dng"] {
            assert_eq!(ImageFormat::from_extension(ext), ImageFormat::Raw);
        }
    }

    #[test]
    fn video_extensions_detected_as_video_media_kind() {
        for ext in ["mp4", "mov", "avi", "mkv"] {
            let format = ImageFormat::from_extension(ext);
            assert_eq!(format.media_kind(), MediaKind::Video);
        }
    }

    #[test]
    fn image_formats_have_image_media_kind() {
        assert_eq!(ImageFormat::Jpeg.media_kind(), MediaKind::Image);
        assert_eq!(ImageFormat::Raw.media_kind(), MediaKind::Image);
    }
}
