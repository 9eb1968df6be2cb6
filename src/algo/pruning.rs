//! Index maintenance: retiring blocks that do little to separate instances.
//!
//! Pruning only ever removes entries. A retired block stays empty for the
//! rest of the index's life, so queries simply stop counting it.

use serde::Serialize;

use super::inverse_index::{mean_std, InverseIndex};
use crate::config::{EntryThreshold, MinHashConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub blocks_dropped: usize,
    pub entries_removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PruningPolicy {
    /// Retire blocks with fewer distinct buckets than this.
    pub min_distinct_buckets: Option<usize>,
    /// Retire blocks holding fewer ids than this.
    pub min_entries: Option<EntryThreshold>,
    /// Fraction of a batch after which fitting prunes automatically.
    pub after_fraction: Option<f64>,
}

impl PruningPolicy {
    pub fn from_config(config: &MinHashConfig) -> Self {
        Self {
            min_distinct_buckets: config.prune_inverse_index(),
            min_entries: config.remove_hash_function_with_less_entries_as(),
            after_fraction: config.prune_inverse_index_after_instance(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.min_distinct_buckets.is_some() || self.min_entries.is_some()
    }

    /// Number of instances of a `batch_len` batch to insert before the
    /// automatic pass, or `None` when fitting never prunes.
    pub fn trigger_point(&self, batch_len: usize) -> Option<usize> {
        if !self.is_enabled() || batch_len == 0 {
            return None;
        }
        let fraction = self.after_fraction?;
        let split = (fraction * batch_len as f64).ceil() as usize;
        Some(split.clamp(1, batch_len))
    }

    /// Run one pruning pass over `index`.
    pub fn apply(&self, index: &mut InverseIndex) -> PruneReport {
        let mut report = PruneReport::default();

        if let Some(min_buckets) = self.min_distinct_buckets {
            for block in index.blocks_mut() {
                // Blocks without entries have nothing to remove.
                if !block.is_retired() && !block.is_empty() && block.len() < min_buckets {
                    report.entries_removed += block.retire();
                    report.blocks_dropped += 1;
                }
            }
        }

        if let Some(threshold) = self.min_entries {
            let entries: Vec<f64> = index
                .blocks()
                .iter()
                .filter(|b| !b.is_retired())
                .map(|b| b.entries() as f64)
                .collect();
            let limit = match threshold {
                EntryThreshold::Below(n) => n as f64,
                EntryThreshold::MeanPlusStdDev => {
                    let (mean, std_dev) = mean_std(&entries);
                    mean + std_dev
                }
            };
            for block in index.blocks_mut() {
                if !block.is_retired() && !block.is_empty() && (block.entries() as f64) < limit {
                    report.entries_removed += block.retire();
                    report.blocks_dropped += 1;
                }
            }
        }

        report
    }
}
