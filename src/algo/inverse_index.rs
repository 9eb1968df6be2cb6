use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use super::minhash::Signature;
use super::parallel::Executor;

/// Buckets of one block: `block_value → instance ids`, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Block {
    buckets: HashMap<u64, Vec<usize>>,
    retired: bool,
}

impl Block {
    /// Append `id` to the bucket of `key` unless the bucket is full or the
    /// block was pruned away. Returns whether the id was stored.
    pub(crate) fn insert(&mut self, key: u64, id: usize, max_bin_size: usize) -> bool {
        if self.retired {
            return false;
        }
        let bucket = self.buckets.entry(key).or_default();
        // Ids arrive in ascending order, so a repeat can only be the last one.
        if bucket.len() >= max_bin_size || bucket.last() == Some(&id) {
            return false;
        }
        bucket.push(id);
        true
    }

    pub fn get(&self, key: u64) -> Option<&[usize]> {
        self.buckets.get(&key).map(Vec::as_slice)
    }

    /// Number of distinct non-empty buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of stored ids across buckets.
    pub fn entries(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn bucket_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.buckets.values().map(Vec::len)
    }

    /// Drop every bucket and refuse further inserts. Returns the number of
    /// ids removed.
    pub(crate) fn retire(&mut self) -> usize {
        let removed = self.entries();
        self.buckets = HashMap::new();
        self.retired = true;
        removed
    }
}

/// Inverted index over block keys plus the per-instance signature and
/// feature storage needed to answer indexed and refined queries.
#[derive(Debug, Clone)]
pub struct InverseIndex {
    blocks: Vec<Block>,
    signatures: Vec<Signature>,
    features: Vec<Vec<u64>>,
    max_bin_size: usize,
    low_bit_mask: Option<u64>,
}

impl InverseIndex {
    pub fn new(number_of_blocks: usize, max_bin_size: usize) -> Self {
        Self {
            blocks: vec![Block::default(); number_of_blocks],
            signatures: Vec::new(),
            features: Vec::new(),
            max_bin_size,
            low_bit_mask: None,
        }
    }

    /// Skip keys whose `bits` least significant bits are all zero, storing
    /// roughly `1 - 2^-bits` of all keys. `None` or `0` stores every key.
    pub fn with_low_bit_filter(mut self, bits: Option<u32>) -> Self {
        self.low_bit_mask = bits
            .filter(|b| (1..=63).contains(b))
            .map(|b| (1u64 << b) - 1);
        self
    }

    /// Whether a key passes the low-bit filter.
    pub fn stores_key(&self, key: u64) -> bool {
        self.low_bit_mask.map_or(true, |mask| key & mask != 0)
    }

    /// Number of indexed instances.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn number_of_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn max_bin_size(&self) -> usize {
        self.max_bin_size
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn signature(&self, id: usize) -> Option<&Signature> {
        self.signatures.get(id)
    }

    pub fn features(&self, id: usize) -> Option<&[u64]> {
        self.features.get(id).map(Vec::as_slice)
    }

    /// Instance ids stored under `(block, key)`.
    pub fn bucket(&self, block: usize, key: u64) -> Option<&[usize]> {
        self.blocks.get(block).and_then(|b| b.get(key))
    }

    /// Store rows and their signatures under fresh ids, without touching the
    /// buckets yet. Returns the assigned id range.
    pub(crate) fn append(&mut self, rows: Vec<Vec<u64>>, signatures: Vec<Signature>) -> Range<usize> {
        debug_assert_eq!(rows.len(), signatures.len());
        let start = self.signatures.len();
        self.features.extend(rows);
        self.signatures.extend(signatures);
        start..self.signatures.len()
    }

    /// Insert the stored instances `ids` into their buckets.
    ///
    /// Each worker owns whole blocks and walks `ids` in ascending order, so
    /// which ids make it into a full bucket never depends on the worker count.
    pub(crate) fn insert_range(&mut self, ids: Range<usize>, executor: &Executor) {
        let Self {
            blocks,
            signatures,
            max_bin_size,
            low_bit_mask,
            ..
        } = self;
        let signatures = &signatures[ids.clone()];
        let offset = ids.start;
        let cap = *max_bin_size;
        let mask = *low_bit_mask;
        executor.for_each_indexed_mut(blocks, |b, block| {
            for (i, sig) in signatures.iter().enumerate() {
                let Some(key) = sig.block(b) else { continue };
                if mask.map_or(true, |m| key & m != 0) {
                    block.insert(key, offset + i, cap);
                }
            }
        });
    }

    /// Bucket-size histogram and per-block statistics.
    pub fn distribution(&self) -> IndexDistribution {
        let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
        let mut buckets_per_block = Vec::with_capacity(self.blocks.len());
        let mut mean_bucket_size_per_block = Vec::with_capacity(self.blocks.len());
        let mut total_entries = 0;

        for block in &self.blocks {
            let mut entries = 0;
            for size in block.bucket_sizes() {
                *histogram.entry(size).or_insert(0) += 1;
                entries += size;
            }
            total_entries += entries;
            buckets_per_block.push(block.len());
            mean_bucket_size_per_block.push(if block.is_empty() {
                0.0
            } else {
                entries as f64 / block.len() as f64
            });
        }

        let active: Vec<f64> = self
            .blocks
            .iter()
            .filter(|b| !b.is_retired())
            .map(|b| b.len() as f64)
            .collect();
        let (mean, std_dev) = mean_std(&active);

        IndexDistribution {
            histogram,
            buckets_per_block,
            mean_buckets_per_block: mean,
            std_dev_buckets_per_block: std_dev,
            mean_bucket_size_per_block,
            total_entries,
            retired_blocks: self.blocks.iter().filter(|b| b.is_retired()).count(),
        }
    }
}

/// Snapshot of the index shape, used to estimate memory cost externally.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexDistribution {
    /// Bucket size → number of buckets of that size.
    pub histogram: BTreeMap<usize, usize>,
    pub buckets_per_block: Vec<usize>,
    pub mean_buckets_per_block: f64,
    pub std_dev_buckets_per_block: f64,
    pub mean_bucket_size_per_block: Vec<f64>,
    pub total_entries: usize,
    pub retired_blocks: usize,
}

/// Population mean and standard deviation; `(0, 0)` for no values.
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::hash::HashFamily;
    use crate::algo::minhash::SignatureComputer;
    use crate::algo::parallel::Chunking;

    fn build(rows: Vec<Vec<u64>>, max_bin_size: usize) -> InverseIndex {
        build_filtered(rows, max_bin_size, None)
    }

    fn build_filtered(rows: Vec<Vec<u64>>, max_bin_size: usize, bits: Option<u32>) -> InverseIndex {
        let computer = SignatureComputer::new(HashFamily::build(8, 1), 2).unwrap();
        let exec = Executor::new(2, Chunking::Default).unwrap();
        let sigs = computer.compute_all(&rows, &exec);
        let mut index =
            InverseIndex::new(computer.number_of_blocks(), max_bin_size).with_low_bit_filter(bits);
        let ids = index.append(rows, sigs);
        index.insert_range(ids, &exec);
        index
    }

    #[test]
    fn keys_with_zero_low_bits_never_stored() {
        let rows: Vec<Vec<u64>> = (0..200u64).map(|i| vec![i * 3, i * 3 + 1]).collect();
        let index = build_filtered(rows, 1000, Some(2));
        let mut skipped = 0;
        let mut stored = 0;
        for id in 0..index.len() {
            let sig = index.signature(id).unwrap();
            for b in 0..index.number_of_blocks() {
                let key = sig.block(b).unwrap();
                let bucket = index.bucket(b, key);
                if key & 0b11 == 0 {
                    assert!(bucket.is_none(), "key {key:#x} stored in block {b}");
                    assert!(!index.stores_key(key));
                    skipped += 1;
                } else {
                    assert!(bucket.is_some_and(|ids| ids.contains(&id)));
                    stored += 1;
                }
            }
        }
        assert!(skipped > 0 && stored > skipped);
        assert_eq!(index.distribution().total_entries, stored);
    }

    #[test]
    fn filter_disabled_stores_every_key() {
        let index = InverseIndex::new(2, 5).with_low_bit_filter(Some(0));
        assert!(index.stores_key(0));
        assert!(index.stores_key(1 << 40));
    }

    #[test]
    fn identical_rows_share_every_bucket() {
        let index = build(vec![vec![1, 2, 3], vec![1, 2, 3]], 10);
        let sig = index.signature(0).unwrap();
        for b in 0..index.number_of_blocks() {
            assert_eq!(index.bucket(b, sig.block(b).unwrap()), Some(&[0usize, 1][..]));
        }
    }

    #[test]
    fn full_bucket_keeps_first_arrivals() {
        let rows = vec![vec![5u64, 6]; 6];
        let index = build(rows, 4);
        let sig = index.signature(0).unwrap();
        let bucket = index.bucket(0, sig.block(0).unwrap()).unwrap();
        assert_eq!(bucket, &[0, 1, 2, 3]);
    }

    #[test]
    fn empty_rows_not_indexed() {
        let index = build(vec![vec![], vec![]], 10);
        assert_eq!(index.len(), 2);
        assert_eq!(index.distribution().total_entries, 0);
    }

    #[test]
    fn distribution_histogram() {
        let index = build(vec![vec![1, 2], vec![1, 2], vec![900, 901]], 10);
        let dist = index.distribution();
        // Each of the 4 blocks has one bucket of size 2 and one of size 1.
        assert_eq!(dist.histogram.get(&2), Some(&4));
        assert_eq!(dist.histogram.get(&1), Some(&4));
        assert_eq!(dist.total_entries, 12);
        assert_eq!(dist.buckets_per_block, vec![2; 4]);
        assert!((dist.mean_buckets_per_block - 2.0).abs() < 1e-12);
        assert_eq!(dist.retired_blocks, 0);
    }

    #[test]
    fn retired_block_rejects_inserts() {
        let mut block = Block::default();
        assert!(block.insert(1, 0, 5));
        assert_eq!(block.retire(), 1);
        assert!(!block.insert(1, 1, 5));
        assert!(block.is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut block = Block::default();
        assert!(block.insert(9, 3, 5));
        assert!(!block.insert(9, 3, 5));
        assert_eq!(block.entries(), 1);
    }

    #[test]
    fn mean_std_values() {
        assert_eq!(mean_std(&[]), (0.0, 0.0));
        let (m, s) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((m - 5.0).abs() < 1e-12);
        assert!((s - 2.0).abs() < 1e-12);
    }
}
