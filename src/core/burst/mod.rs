//! # Burst Module
//!
//! Burst primitives (C3): clusters photos taken in quick succession into
//! "bursts" by time-gap clustering, then picks the best shot from each.
//!
//! ## Algorithm
//!
//! Images are partitioned by camera (all images with no camera form a
//! single shared partition), each partition is sorted by ascending
//! timestamp, and a sequence accumulates until the gap to the next
//! timestamp exceeds `gap_threshold` or the timestamp is missing. A
//! sequence is emitted as a burst only if it meets both `min_size` and
//! `min_duration`.

use crate::error::BurstError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single image as seen by burst detection.
#[derive(Debug, Clone)]
pub struct BurstImage<Id> {
    pub id: Id,
    pub timestamp: Option<DateTime<Utc>>,
    pub camera: Option<String>,
    pub quality_score: Option<u8>,
}

/// Tunable parameters for [`detect_bursts`].
#[derive(Debug, Clone)]
pub struct BurstParams {
    /// Maximum gap between consecutive timestamps, in seconds, before a
    /// sequence is closed off.
    pub gap_threshold: f64,
    /// Minimum number of images for a sequence to be emitted as a burst.
    pub min_size: usize,
    /// Minimum span, in seconds, between a burst's first and last shot.
    pub min_duration: f64,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            gap_threshold: 1.0,
            min_size: 3,
            min_duration: 0.5,
        }
    }
}

impl BurstParams {
    pub fn validate(&self) -> Result<(), BurstError> {
        if self.gap_threshold <= 0.0 {
            return Err(BurstError::InvalidGapThreshold {
                value: self.gap_threshold,
            });
        }
        if self.min_size < 2 {
            return Err(BurstError::InvalidMinSize { value: self.min_size });
        }
        Ok(())
    }
}

/// A detected burst, ready for persistence as a catalog `Burst` row.
#[derive(Debug, Clone)]
pub struct DetectedBurst<Id> {
    pub image_ids: Vec<Id>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub camera: Option<String>,
}

/// How to pick the best shot within a detected burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SelectionMethod {
    /// Highest `quality_score` (nulls treated as 0).
    Quality,
    /// Earliest timestamp (first id on ties).
    First,
    /// The image at index `floor(n/2)`.
    Middle,
}

impl std::str::FromStr for SelectionMethod {
    type Err = BurstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quality" => Ok(SelectionMethod::Quality),
            "first" => Ok(SelectionMethod::First),
            "middle" => Ok(SelectionMethod::Middle),
            other => Err(BurstError::UnknownSelectionMethod {
                value: other.to_string(),
            }),
        }
    }
}

/// Detect bursts across a set of images.
///
/// Images are partitioned by `camera` (all images with `camera = None`
/// share one partition), sorted by ascending timestamp within each
/// partition, then scanned for runs where consecutive timestamps are within
/// `gap_threshold` seconds of each other. A missing timestamp always closes
/// the current run (treated as an infinite gap).
pub fn detect_bursts<Id: Clone>(
    images: &[BurstImage<Id>],
    params: &BurstParams,
) -> Result<Vec<DetectedBurst<Id>>, BurstError> {
    params.validate()?;

    let mut partitions: HashMap<Option<String>, Vec<&BurstImage<Id>>> = HashMap::new();
    for image in images {
        partitions.entry(image.camera.clone()).or_default().push(image);
    }

    let mut bursts = Vec::new();

    for (camera, mut partition) in partitions {
        partition.sort_by_key(|img| img.timestamp);

        let mut current: Vec<&BurstImage<Id>> = Vec::new();

        let mut flush = |current: &mut Vec<&BurstImage<Id>>, bursts: &mut Vec<DetectedBurst<Id>>| {
            if current.len() >= params.min_size {
                // Timestamps were checked non-null on the way in, so these
                // unwraps are safe for any sequence that reached this point.
                let start_time = current.first().unwrap().timestamp.unwrap();
                let end_time = current.last().unwrap().timestamp.unwrap();
                let duration_seconds = (end_time - start_time).num_milliseconds() as f64 / 1000.0;

                if duration_seconds >= params.min_duration {
                    bursts.push(DetectedBurst {
                        image_ids: current.iter().map(|img| img.id.clone()).collect(),
                        start_time,
                        end_time,
                        duration_seconds,
                        camera: camera.clone(),
                    });
                }
            }
            current.clear();
        };

        for image in partition {
            let Some(timestamp) = image.timestamp else {
                flush(&mut current, &mut bursts);
                continue;
            };

            if let Some(last) = current.last() {
                let last_timestamp = last.timestamp.expect("current sequence only holds timestamped images");
                let gap = (timestamp - last_timestamp).num_milliseconds() as f64 / 1000.0;
                if gap > params.gap_threshold {
                    flush(&mut current, &mut bursts);
                }
            }

            current.push(image);
        }
        flush(&mut current, &mut bursts);
    }

    bursts.sort_by_key(|b| b.start_time);
    Ok(bursts)
}

/// Pick the best-in-burst image id, given the full set of images the burst
/// was detected from (so `first`/`middle`/`quality` can look up attributes).
pub fn select_best<'a, Id: Clone + Eq + std::hash::Hash>(
    burst: &DetectedBurst<Id>,
    images_by_id: &HashMap<Id, &'a BurstImage<Id>>,
    method: SelectionMethod,
) -> Id {
    match method {
        SelectionMethod::Quality => burst
            .image_ids
            .iter()
            .max_by_key(|id| images_by_id.get(*id).and_then(|img| img.quality_score).unwrap_or(0))
            .cloned()
            .expect("burst has at least min_size >= 2 members"),
        SelectionMethod::First => burst.image_ids[0].clone(),
        SelectionMethod::Middle => burst.image_ids[burst.image_ids.len() / 2].clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn image(id: &str, seconds: i64, camera: Option<&str>, quality: Option<u8>) -> BurstImage<String> {
        BurstImage {
            id: id.to_string(),
            timestamp: Some(ts(seconds)),
            camera: camera.map(String::from),
            quality_score: quality,
        }
    }

    #[test]
    fn detects_a_single_tight_sequence() {
        let images = vec![
            image("a", 0, Some("cam1"), None),
            image("b", 1, Some("cam1"), None),
            image("c", 2, Some("cam1"), None),
        ];

        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].image_ids, vec!["a", "b", "c"]);
        assert_eq!(bursts[0].duration_seconds, 2.0);
    }

    #[test]
    fn gap_above_threshold_splits_sequences() {
        let images = vec![
            image("a", 0, Some("cam1"), None),
            image("b", 1, Some("cam1"), None),
            image("c", 2, Some("cam1"), None),
            image("d", 10, Some("cam1"), None),
            image("e", 11, Some("cam1"), None),
            image("f", 12, Some("cam1"), None),
        ];

        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        assert_eq!(bursts.len(), 2);
    }

    #[test]
    fn below_min_size_is_dropped() {
        let images = vec![image("a", 0, Some("cam1"), None), image("b", 1, Some("cam1"), None)];
        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        assert!(bursts.is_empty());
    }

    #[test]
    fn below_min_duration_is_dropped() {
        let params = BurstParams {
            min_duration: 100.0,
            ..BurstParams::default()
        };
        let images = vec![
            image("a", 0, Some("cam1"), None),
            image("b", 1, Some("cam1"), None),
            image("c", 2, Some("cam1"), None),
        ];
        let bursts = detect_bursts(&images, &params).unwrap();
        assert!(bursts.is_empty());
    }

    #[test]
    fn different_cameras_partition_separately() {
        let images = vec![
            image("a", 0, Some("cam1"), None),
            image("b", 1, Some("cam1"), None),
            image("c", 2, Some("cam1"), None),
            image("d", 0, Some("cam2"), None),
            image("e", 1, Some("cam2"), None),
            image("f", 2, Some("cam2"), None),
        ];

        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        assert_eq!(bursts.len(), 2);
    }

    #[test]
    fn null_camera_images_share_one_partition() {
        let images = vec![
            image("a", 0, None, None),
            image("b", 1, None, None),
            image("c", 2, None, None),
        ];

        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].camera, None);
    }

    #[test]
    fn null_timestamp_terminates_sequence() {
        let mut images = vec![
            image("a", 0, Some("cam1"), None),
            image("b", 1, Some("cam1"), None),
            image("c", 2, Some("cam1"), None),
        ];
        images.push(BurstImage {
            id: "d".to_string(),
            timestamp: None,
            camera: Some("cam1".to_string()),
            quality_score: None,
        });
        images.push(image("e", 3, Some("cam1"), None));
        images.push(image("f", 4, Some("cam1"), None));

        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        // The null-timestamp image closes the first run; a-b-c survive as
        // one burst, e-f never reach min_size so nothing else is emitted.
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].image_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn invalid_gap_threshold_rejected() {
        let params = BurstParams {
            gap_threshold: 0.0,
            ..BurstParams::default()
        };
        assert!(detect_bursts::<String>(&[], &params).is_err());
    }

    #[test]
    fn invalid_min_size_rejected() {
        let params = BurstParams {
            min_size: 1,
            ..BurstParams::default()
        };
        assert!(detect_bursts::<String>(&[], &params).is_err());
    }

    #[test]
    fn select_best_by_quality() {
        let images = vec![
            image("a", 0, Some("cam1"), Some(50)),
            image("b", 1, Some("cam1"), Some(90)),
            image("c", 2, Some("cam1"), Some(10)),
        ];
        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        let by_id: HashMap<String, &BurstImage<String>> = images.iter().map(|img| (img.id.clone(), img)).collect();

        assert_eq!(select_best(&bursts[0], &by_id, SelectionMethod::Quality), "b");
    }

    #[test]
    fn select_best_first_and_middle() {
        let images = vec![
            image("a", 0, Some("cam1"), None),
            image("b", 1, Some("cam1"), None),
            image("c", 2, Some("cam1"), None),
        ];
        let bursts = detect_bursts(&images, &BurstParams::default()).unwrap();
        let by_id: HashMap<String, &BurstImage<String>> = images.iter().map(|img| (img.id.clone(), img)).collect();

        assert_eq!(select_best(&bursts[0], &by_id, SelectionMethod::First), "a");
        assert_eq!(select_best(&bursts[0], &by_id, SelectionMethod::Middle), "b");
    }

    #[test]
    fn selection_method_from_str() {
        use std::str::FromStr;
        assert_eq!(SelectionMethod::from_str("quality").unwrap(), SelectionMethod::Quality);
        assert!(SelectionMethod::from_str("bogus").is_err());
    }
}
