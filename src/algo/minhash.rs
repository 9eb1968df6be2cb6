use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

use super::hash::{HashFamily, MAX_VALUE};
use super::parallel::Executor;
use super::shingle;
use crate::config::MinHashConfig;
use crate::error::{MinHashError, Result};

/// MinHash signature of one instance.
///
/// `minima[k]` is the smallest value hash function `k` produced over the
/// instance's features (`MAX_VALUE` for an empty instance). `blocks` holds one
/// index key per block of `block_size` consecutive minima, or `None` when the
/// instance has no features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    minima: Vec<u64>,
    blocks: Vec<Option<u64>>,
}

impl Signature {
    pub fn minima(&self) -> &[u64] {
        &self.minima
    }

    pub fn blocks(&self) -> &[Option<u64>] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<u64> {
        self.blocks.get(index).copied().flatten()
    }

    pub fn number_of_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// True when the instance had no features.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Option::is_none)
    }
}

/// Projects sparse feature sets through a hash family into signatures.
#[derive(Debug, Clone)]
pub struct SignatureComputer {
    family: HashFamily,
    block_size: usize,
    shingle_size: Option<usize>,
}

impl SignatureComputer {
    pub fn new(family: HashFamily, block_size: usize) -> Result<Self> {
        if family.is_empty() {
            return Err(MinHashError::InvalidConfig(
                "number_of_hash_functions must be at least 1".into(),
            ));
        }
        if block_size == 0 || block_size >= family.len() {
            return Err(MinHashError::InvalidConfig(format!(
                "block_size ({block_size}) must be within 1..{}",
                family.len()
            )));
        }
        Ok(Self {
            family,
            block_size,
            shingle_size: None,
        })
    }

    pub fn from_config(config: &MinHashConfig) -> Result<Self> {
        let family = HashFamily::build(config.number_of_hash_functions(), config.hash_seed());
        let mut computer = Self::new(family, config.block_size())?;
        computer.shingle_size = config.shingle_size();
        Ok(computer)
    }

    /// Hash windows of `size` consecutive feature ids instead of single ids.
    pub fn with_shingles(mut self, size: usize) -> Self {
        self.shingle_size = Some(size.max(1));
        self
    }

    pub fn family(&self) -> &HashFamily {
        &self.family
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn number_of_blocks(&self) -> usize {
        self.family.len().div_ceil(self.block_size)
    }

    /// Per-function minima over `features`.
    pub fn minima(&self, features: &[u64]) -> Vec<u64> {
        let mut sig = vec![MAX_VALUE; self.family.len()];
        for &feature in features {
            for (slot, f) in sig.iter_mut().zip(self.family.iter()) {
                let h = f.hash(feature);
                if h < *slot {
                    *slot = h;
                }
            }
        }
        sig
    }

    /// Signature of one instance. `features` must be sorted when shingling.
    pub fn compute(&self, features: &[u64]) -> Signature {
        let minima = match self.shingle_size {
            Some(size) => self.minima(&shingle::shingle_features(features, size)),
            None => self.minima(features),
        };
        let blocks = if features.is_empty() {
            vec![None; self.number_of_blocks()]
        } else {
            minima
                .chunks(self.block_size)
                .enumerate()
                .map(|(i, values)| Some(block_key(i, values)))
                .collect()
        };
        Signature { minima, blocks }
    }

    /// Signatures of every row, in row order.
    pub fn compute_all(&self, rows: &[Vec<u64>], executor: &Executor) -> Vec<Signature> {
        executor.map(rows, |row| self.compute(row))
    }
}

/// Signature of `features` under `family`, reduced by `block_size`.
pub fn compute(features: &[u64], family: &HashFamily, block_size: usize) -> Result<Signature> {
    Ok(SignatureComputer::new(family.clone(), block_size)?.compute(features))
}

/// Estimate Jaccard similarity as the fraction of equal minima.
///
/// Signatures from differently sized hash families are not comparable and
/// score 0.
pub fn estimate_jaccard(a: &Signature, b: &Signature) -> f64 {
    if a.minima.is_empty() || a.minima.len() != b.minima.len() {
        return 0.0;
    }
    let matches = a
        .minima
        .iter()
        .zip(b.minima.iter())
        .filter(|(x, y)| x == y && **x != MAX_VALUE)
        .count();
    matches as f64 / a.minima.len() as f64
}

/// Index key of one block: equal only when every minimum in the block agrees.
fn block_key(block_index: usize, values: &[u64]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(block_index as u64, 0xCAFEBABE);
    for &v in values {
        v.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::parallel::Chunking;

    fn computer(h: usize, block: usize) -> SignatureComputer {
        SignatureComputer::new(HashFamily::build(h, 1), block).unwrap()
    }

    #[test]
    fn identical_sets_identical_signatures() {
        let c = computer(64, 4);
        assert_eq!(c.compute(&[1, 2, 3]), c.compute(&[1, 2, 3]));
    }

    #[test]
    fn empty_features_are_sentinels() {
        let c = computer(16, 4);
        let sig = c.compute(&[]);
        assert_eq!(sig.minima().len(), 16);
        assert!(sig.minima().iter().all(|&v| v == MAX_VALUE));
        assert_eq!(sig.number_of_blocks(), 4);
        assert!(sig.is_empty());
    }

    #[test]
    fn block_count_rounds_up() {
        let c = computer(10, 3);
        let sig = c.compute(&[5]);
        assert_eq!(sig.number_of_blocks(), 4);
        assert!(sig.blocks().iter().all(Option::is_some));
    }

    #[test]
    fn block_size_validated() {
        let family = HashFamily::build(4, 1);
        assert!(SignatureComputer::new(family.clone(), 4).is_err());
        assert!(SignatureComputer::new(family.clone(), 0).is_err());
        assert!(SignatureComputer::new(HashFamily::build(0, 1), 1).is_err());
        assert!(compute(&[1], &family, 9).is_err());
        assert!(compute(&[1], &family, 2).is_ok());
    }

    #[test]
    fn blocks_need_all_minima_equal() {
        let c = computer(8, 2);
        let a = c.compute(&[1, 2, 3, 4]);
        let b = c.compute(&[1, 2, 3, 99]);
        for (i, pair) in a.minima().chunks(2).zip(b.minima().chunks(2)).enumerate() {
            assert_eq!(pair.0 == pair.1, a.block(i) == b.block(i));
        }
    }

    #[test]
    fn overlapping_sets_high_estimate() {
        let c = computer(256, 4);
        let a: Vec<u64> = (0..100).collect();
        let b: Vec<u64> = (10..110).collect();
        let j = estimate_jaccard(&c.compute(&a), &c.compute(&b));
        // 90 shared out of 110 ≈ 0.818
        assert!(j > 0.65 && j < 0.95, "estimate {j}");
    }

    #[test]
    fn disjoint_sets_low_estimate() {
        let c = computer(128, 4);
        let j = estimate_jaccard(&c.compute(&[1, 2, 3]), &c.compute(&[7, 8, 9]));
        assert!(j < 0.2, "estimate {j}");
    }

    #[test]
    fn mismatched_signatures_score_zero() {
        let a = computer(32, 4).compute(&[1, 2, 3]);
        let b = computer(16, 4).compute(&[1, 2, 3]);
        assert_eq!(estimate_jaccard(&a, &b), 0.0);
        assert_eq!(estimate_jaccard(&a, &a), 1.0);
    }

    #[test]
    fn shingling_changes_signature() {
        let plain = computer(32, 4);
        let shingled = computer(32, 4).with_shingles(2);
        assert_ne!(plain.compute(&[1, 2, 3]), shingled.compute(&[1, 2, 3]));
        assert!(shingled.compute(&[]).is_empty());
    }

    #[test]
    fn compute_all_matches_sequential() {
        let c = computer(32, 4);
        let rows: Vec<Vec<u64>> = (0..50u64).map(|i| vec![i, i + 1, i * 7]).collect();
        let expected: Vec<Signature> = rows.iter().map(|r| c.compute(r)).collect();
        let exec = Executor::new(3, Chunking::Fixed(4)).unwrap();
        assert_eq!(c.compute_all(&rows, &exec), expected);
    }
}
