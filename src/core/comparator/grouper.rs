//! Groups images into duplicate clusters, either by exact checksum or by
//! perceptual hash within a similarity threshold.
//!
//! # Algorithm
//!
//! Perceptual grouping uses the Union-Find (Disjoint Set Union) algorithm to
//! efficiently group images whose pairwise Hamming distance falls at or below
//! a threshold.
//!
//! ## Transitive Grouping
//!
//! If A matches B and B matches C, then {A, B, C} forms a single group even
//! if A doesn't directly match C.
//!
//! ## Complexity
//!
//! - Time: O(n^2) to compare all pairs, O(n * alpha(n)) for the union-find
//!   itself (alpha is the inverse Ackermann function, effectively constant).
//! - Space: O(n) for the parent map.

use super::traits::{select_primary, GroupCandidate, SimilarityType};
use crate::core::hasher::{ImageHashValue, PerceptualHash};
use std::collections::HashMap;
use std::hash::Hash;

/// Union-Find data structure, generic over any hashable/cloneable id type.
struct UnionFind<Id: Clone + Eq + Hash> {
    parent: HashMap<Id, Id>,
}

impl<Id: Clone + Eq + Hash> UnionFind<Id> {
    fn new(items: impl IntoIterator<Item = Id>) -> Self {
        let mut parent = HashMap::new();
        for item in items {
            parent.insert(item.clone(), item);
        }
        Self { parent }
    }

    fn find(&mut self, x: &Id) -> Id {
        let p = self.parent.get(x).cloned().unwrap_or_else(|| x.clone());
        if &p != x {
            let root = self.find(&p);
            self.parent.insert(x.clone(), root.clone());
            root
        } else {
            x.clone()
        }
    }

    fn union(&mut self, a: &Id, b: &Id) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_a, root_b);
        }
    }

    fn groups(&mut self) -> HashMap<Id, Vec<Id>> {
        let items: Vec<_> = self.parent.keys().cloned().collect();
        let mut groups: HashMap<Id, Vec<Id>> = HashMap::new();
        for item in items {
            let root = self.find(&item);
            groups.entry(root).or_default().push(item);
        }
        groups
    }
}

/// A single member of a duplicate group.
#[derive(Debug, Clone)]
pub struct DuplicateMember<Id> {
    pub image_id: Id,
    /// Similarity of this member's hash to the group's primary, 0-100.
    /// Always 100 for exact (checksum) groups.
    pub similarity_score: u32,
}

/// A group of duplicate images, as produced by [`group_exact`] or
/// [`group_perceptual`].
#[derive(Debug, Clone)]
pub struct DuplicateGroup<Id> {
    pub primary_image_id: Id,
    pub similarity_type: SimilarityType,
    pub confidence: u32,
    pub members: Vec<DuplicateMember<Id>>,
}

/// Image attributes a caller supplies for grouping.
#[derive(Debug, Clone)]
pub struct ImageRecord<Id> {
    pub id: Id,
    pub checksum: String,
    pub quality_score: Option<u8>,
    pub size_bytes: Option<u64>,
}

/// Exact grouping: cluster images sharing an identical checksum. Groups of
/// size < 2 are dropped. `confidence` is always 100.
pub fn group_exact<Id: Clone + Eq + Hash + Ord>(images: &[ImageRecord<Id>]) -> Vec<DuplicateGroup<Id>> {
    let mut by_checksum: HashMap<&str, Vec<&ImageRecord<Id>>> = HashMap::new();
    for image in images {
        by_checksum.entry(image.checksum.as_str()).or_default().push(image);
    }

    by_checksum
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| {
            let candidates: Vec<GroupCandidate<Id>> = members
                .iter()
                .map(|m| GroupCandidate {
                    id: m.id.clone(),
                    quality_score: m.quality_score,
                    size_bytes: m.size_bytes,
                })
                .collect();
            let primary_image_id = select_primary(&candidates);

            DuplicateGroup {
                primary_image_id,
                similarity_type: SimilarityType::Exact,
                confidence: 100,
                members: members
                    .iter()
                    .map(|m| DuplicateMember {
                        image_id: m.id.clone(),
                        similarity_score: 100,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Perceptual grouping: union-find over all pairs whose Hamming distance is
/// at or below `threshold`. Each connected component of size >= 2 becomes a
/// group. Group confidence is `round(100 * (1 - avg_pairwise_distance / 64))`,
/// clamped to `[0, 100]`, where the average is taken over every pair within
/// the final component (not just the edges used to merge it).
pub fn group_perceptual<Id: Clone + Eq + Hash + Ord>(
    images: &[ImageRecord<Id>],
    hashes: &HashMap<Id, ImageHashValue>,
    threshold: u32,
) -> Vec<DuplicateGroup<Id>> {
    let ids: Vec<Id> = images
        .iter()
        .filter(|img| hashes.contains_key(&img.id))
        .map(|img| img.id.clone())
        .collect();

    let mut uf = UnionFind::new(ids.clone());

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let hash_a = &hashes[&ids[i]];
            let hash_b = &hashes[&ids[j]];
            if hash_a.distance(hash_b) <= threshold {
                uf.union(&ids[i], &ids[j]);
            }
        }
    }

    let by_id: HashMap<&Id, &ImageRecord<Id>> = images.iter().map(|img| (&img.id, img)).collect();

    uf.groups()
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| {
            let candidates: Vec<GroupCandidate<Id>> = members
                .iter()
                .filter_map(|id| by_id.get(id))
                .map(|img| GroupCandidate {
                    id: img.id.clone(),
                    quality_score: img.quality_score,
                    size_bytes: img.size_bytes,
                })
                .collect();
            let primary_image_id = select_primary(&candidates);
            let primary_hash = &hashes[&primary_image_id];

            let confidence = average_pairwise_confidence(&members, hashes);

            let group_members = members
                .iter()
                .map(|id| DuplicateMember {
                    image_id: id.clone(),
                    similarity_score: hashes[id].similarity_score(primary_hash),
                })
                .collect();

            DuplicateGroup {
                primary_image_id,
                similarity_type: SimilarityType::Perceptual,
                confidence,
                members: group_members,
            }
        })
        .collect()
}

fn average_pairwise_confidence<Id: Clone + Eq + Hash>(
    members: &[Id],
    hashes: &HashMap<Id, ImageHashValue>,
) -> u32 {
    if members.len() < 2 {
        return 100;
    }

    let mut total_distance: u64 = 0;
    let mut pair_count: u64 = 0;
    for i in 0..members.len() {
        for j in (i + 1)..members.len() {
            total_distance += hashes[&members[i]].distance(&hashes[&members[j]]) as u64;
            pair_count += 1;
        }
    }

    let avg_distance = total_distance as f64 / pair_count as f64;
    let confidence = 100.0 * (1.0 - avg_distance / 64.0);
    confidence.round().clamp(0.0, 100.0) as u32
}
