use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

use super::inverse_index::InverseIndex;
use super::minhash::{estimate_jaccard, Signature};
use super::sparse::jaccard;

/// Id used to pad results that found fewer than `k` neighbors.
pub const NO_NEIGHBOR: i64 = -1;

/// How a neighborhood is assembled from bucket hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Rank by shared blocks only; return `k` ids.
    #[default]
    Fast,
    /// Rank by shared blocks; return `k * excess_factor` ids for an external
    /// exact re-rank.
    CandidatePool,
    /// Take `k * excess_factor` candidates, re-rank them by exact Jaccard
    /// over the stored feature sets, return `k`.
    Refined,
}

impl QueryMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Some(Self::Fast),
            "candidates" | "candidate_pool" | "candidate-pool" => Some(Self::CandidatePool),
            "refined" | "exact" => Some(Self::Refined),
            _ => None,
        }
    }
}

/// Ranked neighbor ids and their similarity scores.
///
/// `ids` and `scores` have equal length; missing slots hold `NO_NEIGHBOR`
/// and `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub ids: Vec<i64>,
    pub scores: Vec<f64>,
}

impl QueryResult {
    /// Result of `len` empty slots.
    pub fn empty(len: usize) -> Self {
        Self {
            ids: vec![NO_NEIGHBOR; len],
            scores: vec![0.0; len],
        }
    }

    fn padded(ranked: Vec<(usize, f64)>, len: usize) -> Self {
        let mut result = Self::empty(len);
        for (slot, (id, score)) in ranked.into_iter().take(len).enumerate() {
            result.ids[slot] = id as i64;
            result.scores[slot] = score;
        }
        result
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `1 - score` per slot.
    pub fn distances(&self) -> Vec<f64> {
        self.scores.iter().map(|s| 1.0 - s).collect()
    }

    /// Filled slots only.
    pub fn found(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.ids
            .iter()
            .zip(&self.scores)
            .filter(|(id, _)| **id != NO_NEIGHBOR)
            .map(|(id, score)| (*id as usize, *score))
    }
}

/// Candidate with its number of colliding blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: usize,
    pub blocks_in_common: usize,
}

/// Read-only query view over an index.
pub struct NeighborhoodQuery<'a> {
    index: &'a InverseIndex,
    minimal_blocks_in_common: usize,
    excess_factor: usize,
}

impl<'a> NeighborhoodQuery<'a> {
    pub fn new(index: &'a InverseIndex, minimal_blocks_in_common: usize, excess_factor: usize) -> Self {
        Self {
            index,
            minimal_blocks_in_common: minimal_blocks_in_common.max(1),
            excess_factor: excess_factor.max(1),
        }
    }

    /// Candidates sharing at least `minimal_blocks_in_common` blocks with
    /// `signature`, by shared blocks descending then id ascending.
    pub fn candidates(&self, signature: &Signature, exclude: Option<usize>) -> Vec<Candidate> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for (b, key) in signature.blocks().iter().enumerate() {
            let Some(key) = key else { continue };
            if let Some(ids) = self.index.bucket(b, *key) {
                for &id in ids {
                    *counts.entry(id).or_insert(0) += 1;
                }
            }
        }
        if let Some(id) = exclude {
            counts.remove(&id);
        }

        let mut ranked: Vec<Candidate> = counts
            .into_iter()
            .filter(|&(_, n)| n >= self.minimal_blocks_in_common)
            .map(|(id, blocks_in_common)| Candidate { id, blocks_in_common })
            .collect();
        ranked.sort_unstable_by_key(|c| (Reverse(c.blocks_in_common), c.id));
        ranked
    }

    /// Top `k` neighbors of a query.
    ///
    /// `features` (sorted, unique) enables exact refinement; without them
    /// `Refined` falls back to the signature estimate.
    pub fn run(
        &self,
        signature: &Signature,
        features: Option<&[u64]>,
        exclude: Option<usize>,
        k: usize,
        mode: QueryMode,
    ) -> QueryResult {
        let pool = k.saturating_mul(self.excess_factor);
        let candidates = self.candidates(signature, exclude);
        match mode {
            QueryMode::Fast => QueryResult::padded(self.shared_block_scores(&candidates), k),
            QueryMode::CandidatePool => {
                QueryResult::padded(self.shared_block_scores(&candidates), pool)
            }
            QueryMode::Refined => {
                let head = &candidates[..candidates.len().min(pool)];
                QueryResult::padded(self.refine(signature, features, head), k)
            }
        }
    }

    /// Every candidate whose distance `1 - score` is at most `radius`.
    pub fn within_radius(
        &self,
        signature: &Signature,
        features: Option<&[u64]>,
        exclude: Option<usize>,
        radius: f64,
        refine: bool,
    ) -> Vec<(usize, f64)> {
        let candidates = self.candidates(signature, exclude);
        let scored = if refine {
            self.refine(signature, features, &candidates)
        } else {
            self.shared_block_scores(&candidates)
        };
        scored
            .into_iter()
            .filter(|&(_, score)| 1.0 - score <= radius)
            .collect()
    }

    fn shared_block_scores(&self, candidates: &[Candidate]) -> Vec<(usize, f64)> {
        let blocks = self.index.number_of_blocks().max(1) as f64;
        candidates
            .iter()
            .map(|c| (c.id, c.blocks_in_common as f64 / blocks))
            .collect()
    }

    fn refine(
        &self,
        signature: &Signature,
        features: Option<&[u64]>,
        candidates: &[Candidate],
    ) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = candidates
            .iter()
            .map(|c| {
                let score = match (features, self.index.features(c.id)) {
                    (Some(query), Some(stored)) => jaccard(query, stored),
                    _ => self
                        .index
                        .signature(c.id)
                        .map_or(0.0, |s| estimate_jaccard(signature, s)),
                };
                (c.id, score)
            })
            .collect();
        scored.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored
    }
}
