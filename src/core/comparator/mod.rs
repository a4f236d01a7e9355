//! # Comparator Module
//!
//! Grouping primitives (C2): finds duplicate images two ways.
//!
//! - **Exact grouping** clusters images sharing an identical SHA-256
//!   checksum.
//! - **Perceptual grouping** clusters images whose perceptual hash distance
//!   falls at or below a configured threshold, using union-find for
//!   transitive clustering.
//!
//! Both produce [`DuplicateGroup`] values with a deterministic primary
//! member, selected by [`select_primary`].

mod grouper;
mod traits;

pub use grouper::{group_exact, group_perceptual, DuplicateGroup, DuplicateMember, ImageRecord};
pub use traits::{select_primary, GroupCandidate, SimilarityType};
