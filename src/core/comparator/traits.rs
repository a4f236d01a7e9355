//! Trait definitions for grouping strategies.

/// Where a duplicate group's similarity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SimilarityType {
    /// Grouped by identical SHA-256 checksum.
    Exact,
    /// Grouped by perceptual hash within a configured threshold.
    Perceptual,
}

impl std::fmt::Display for SimilarityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityType::Exact => write!(f, "exact"),
            SimilarityType::Perceptual => write!(f, "perceptual"),
        }
    }
}

/// Per-image attributes used for primary-member selection and confidence math.
///
/// This is a thin comparator-facing view, deliberately independent of the
/// catalog's full `Image` record so `core::comparator` stays GUI/catalog
/// agnostic.
#[derive(Debug, Clone)]
pub struct GroupCandidate<Id> {
    pub id: Id,
    pub quality_score: Option<u8>,
    pub size_bytes: Option<u64>,
}

/// Deterministic primary-member selection: greatest tuple
/// `(quality_score or 0, size_bytes or 0, id)` under lexicographic order,
/// ties broken by ascending id.
pub fn select_primary<Id: Clone + Ord>(candidates: &[GroupCandidate<Id>]) -> Id {
    candidates
        .iter()
        .max_by(|a, b| {
            let key_a = (a.quality_score.unwrap_or(0), a.size_bytes.unwrap_or(0));
            let key_b = (b.quality_score.unwrap_or(0), b.size_bytes.unwrap_or(0));
            key_a
                .cmp(&key_b)
                // Ascending id tiebreak: a *smaller* id should only win when the
                // primary keys are equal, so we reverse the id comparison before
                // folding it into the same max_by call.
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|c| c.id.clone())
        .expect("select_primary requires a non-empty group")
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, quality: Option<u8>, size: Option<u64>) -> GroupCandidate<String> {
        GroupCandidate {
            id: id.to_string(),
            quality_score: quality,
            size_bytes: size,
        }
    }

    #[test]
    fn picks_highest_quality() {
        let candidates = vec![
            candidate("a", Some(50), Some(100)),
            candidate("b", Some(90), Some(10)),
        ];
        assert_eq!(select_primary(&candidates), "b");
    }

    #[test]
    fn falls_back_to_size_on_quality_tie() {
        let candidates = vec![
            candidate("a", Some(50), Some(100)),
            candidate("b", Some(50), Some(200)),
        ];
        assert_eq!(select_primary(&candidates), "b");
    }

    #[test]
    fn ties_broken_by_ascending_id() {
        let candidates = vec![candidate("z", None, None), candidate("a", None, None)];
        assert_eq!(select_primary(&candidates), "a");
    }

    #[test]
    fn missing_quality_and_size_treated_as_zero() {
        let candidates = vec![candidate("a", None, None), candidate("b", Some(1), Some(1))];
        assert_eq!(select_primary(&candidates), "b");
    }
}
