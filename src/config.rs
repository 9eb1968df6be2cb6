//! Engine configuration.
//!
//! [`MinHashParams`] is the loose, serde-friendly parameter set (CLI flags,
//! JSON config files). [`MinHashConfig::new`] validates it once and produces an
//! immutable configuration whose typed accessors the engine relies on.

use serde::{Deserialize, Serialize};

use crate::algo::parallel::Chunking;
use crate::error::{MinHashError, Result};

/// Raw index parameters. Negative values keep the historical "disabled"
/// meaning for the pruning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinHashParams {
    /// Number of MinHash functions (H).
    pub number_of_hash_functions: usize,
    /// Maximum number of instance ids kept per bucket.
    pub max_bin_size: usize,
    /// Default neighborhood size for callers that do not pass `k`.
    pub n_neighbors: usize,
    /// Minimum number of colliding blocks for a candidate to be reported.
    pub minimal_blocks_in_common: usize,
    /// Consecutive minima combined into one index key.
    pub block_size: usize,
    /// Candidate pool multiplier for re-ranking.
    pub excess_factor: usize,
    /// Worker threads; 0 uses every available core.
    pub number_of_cores: usize,
    /// 0 = default scheduling, >0 = fixed chunk, <0 = one chunk per worker.
    pub chunk_size: i64,
    /// Drop blocks with fewer distinct buckets than this; -1 disables.
    pub prune_inverse_index: i64,
    /// Fraction of a batch after which automatic pruning runs; -1.0 disables.
    pub prune_inverse_index_after_instance: f64,
    /// Drop blocks holding fewer entries than this; 0 = mean + std dev, -1 disables.
    pub remove_hash_function_with_less_entries_as: i64,
    /// Replace feature ids by hashed windows of consecutive ids before hashing.
    pub shingle: bool,
    pub shingle_size: usize,
    /// Skip inserting block keys whose `n` least significant bits are all
    /// zero; 0 stores every key.
    pub remove_value_with_least_significant_bit: u32,
    /// Seed of the hash function family.
    pub hash_seed: u64,
}

impl Default for MinHashParams {
    fn default() -> Self {
        Self {
            number_of_hash_functions: 400,
            max_bin_size: 50,
            n_neighbors: 5,
            minimal_blocks_in_common: 1,
            block_size: 4,
            excess_factor: 5,
            number_of_cores: 0,
            chunk_size: 0,
            prune_inverse_index: -1,
            prune_inverse_index_after_instance: -1.0,
            remove_hash_function_with_less_entries_as: -1,
            shingle: false,
            shingle_size: 4,
            remove_value_with_least_significant_bit: 0,
            hash_seed: 1,
        }
    }
}

impl MinHashParams {
    /// Load parameters from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &str) -> std::result::Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{path}': {e}"))?;
        serde_json::from_str(&content).map_err(|e| format!("Invalid config JSON in '{path}': {e}"))
    }
}

/// How weak blocks are selected by entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryThreshold {
    /// Blocks below the mean + one standard deviation of entry counts.
    MeanPlusStdDev,
    /// Blocks below a fixed entry count.
    Below(usize),
}

/// Validated, immutable configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MinHashConfig {
    params: MinHashParams,
    number_of_blocks: usize,
}

impl MinHashConfig {
    /// Validate `params` as a whole. Nothing is computed before this succeeds.
    pub fn new(params: MinHashParams) -> Result<Self> {
        let p = &params;
        if p.number_of_hash_functions < 1 {
            return Err(invalid("number_of_hash_functions must be at least 1"));
        }
        if p.block_size < 1 {
            return Err(invalid("block_size must be at least 1"));
        }
        if p.block_size >= p.number_of_hash_functions {
            return Err(invalid(format!(
                "block_size ({}) must be smaller than number_of_hash_functions ({})",
                p.block_size, p.number_of_hash_functions
            )));
        }
        let number_of_blocks = p.number_of_hash_functions.div_ceil(p.block_size);
        if number_of_blocks < 1 {
            return Err(invalid("derived number of blocks is smaller than 1"));
        }
        if p.max_bin_size < 1 {
            return Err(invalid("max_bin_size must be at least 1"));
        }
        if p.n_neighbors < 1 {
            return Err(invalid("n_neighbors must be at least 1"));
        }
        if p.minimal_blocks_in_common > number_of_blocks {
            return Err(invalid(format!(
                "minimal_blocks_in_common ({}) exceeds the number of blocks ({number_of_blocks})",
                p.minimal_blocks_in_common
            )));
        }
        if p.excess_factor < 1 {
            return Err(invalid("excess_factor must be at least 1"));
        }
        if p.prune_inverse_index < -1 {
            return Err(invalid("prune_inverse_index must be -1 (disabled) or non-negative"));
        }
        let fraction = p.prune_inverse_index_after_instance;
        if fraction != -1.0 && !(0.0..=1.0).contains(&fraction) {
            return Err(invalid(
                "prune_inverse_index_after_instance must be -1.0 (disabled) or within [0, 1]",
            ));
        }
        if p.remove_hash_function_with_less_entries_as < -1 {
            return Err(invalid(
                "remove_hash_function_with_less_entries_as must be -1 (disabled) or non-negative",
            ));
        }
        if p.shingle && p.shingle_size < 1 {
            return Err(invalid("shingle_size must be at least 1 when shingling"));
        }
        if p.remove_value_with_least_significant_bit > 63 {
            return Err(invalid(
                "remove_value_with_least_significant_bit must be within 0..=63",
            ));
        }

        Ok(Self {
            params,
            number_of_blocks,
        })
    }

    pub fn params(&self) -> &MinHashParams {
        &self.params
    }

    pub fn number_of_hash_functions(&self) -> usize {
        self.params.number_of_hash_functions
    }

    pub fn block_size(&self) -> usize {
        self.params.block_size
    }

    /// `ceil(number_of_hash_functions / block_size)`.
    pub fn number_of_blocks(&self) -> usize {
        self.number_of_blocks
    }

    pub fn max_bin_size(&self) -> usize {
        self.params.max_bin_size
    }

    pub fn n_neighbors(&self) -> usize {
        self.params.n_neighbors
    }

    pub fn minimal_blocks_in_common(&self) -> usize {
        self.params.minimal_blocks_in_common
    }

    pub fn excess_factor(&self) -> usize {
        self.params.excess_factor
    }

    pub fn number_of_cores(&self) -> usize {
        self.params.number_of_cores
    }

    pub fn chunking(&self) -> Chunking {
        Chunking::from(self.params.chunk_size)
    }

    pub fn hash_seed(&self) -> u64 {
        self.params.hash_seed
    }

    /// Window length when shingling is enabled.
    pub fn shingle_size(&self) -> Option<usize> {
        self.params.shingle.then_some(self.params.shingle_size)
    }

    /// Number of low key bits that must not all be zero for a key to be stored.
    pub fn remove_value_with_least_significant_bit(&self) -> Option<u32> {
        let bits = self.params.remove_value_with_least_significant_bit;
        (bits > 0).then_some(bits)
    }

    /// Minimum number of distinct buckets a block must keep.
    pub fn prune_inverse_index(&self) -> Option<usize> {
        usize::try_from(self.params.prune_inverse_index).ok()
    }

    pub fn prune_inverse_index_after_instance(&self) -> Option<f64> {
        let fraction = self.params.prune_inverse_index_after_instance;
        (fraction >= 0.0).then_some(fraction)
    }

    pub fn remove_hash_function_with_less_entries_as(&self) -> Option<EntryThreshold> {
        match self.params.remove_hash_function_with_less_entries_as {
            0 => Some(EntryThreshold::MeanPlusStdDev),
            n if n > 0 => Some(EntryThreshold::Below(n as usize)),
            _ => None,
        }
    }
}

impl TryFrom<MinHashParams> for MinHashConfig {
    type Error = MinHashError;

    fn try_from(params: MinHashParams) -> Result<Self> {
        Self::new(params)
    }
}

fn invalid(msg: impl Into<String>) -> MinHashError {
    MinHashError::InvalidConfig(msg.into())
}
