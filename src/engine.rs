//! The MinHash nearest-neighbor engine.
//!
//! A [`MinHash`] value owns its configuration, worker pool, and inverse
//! index. Mutating operations (`fit`, `partial_fit`, `prune`) take `&mut self`
//! and queries take `&self`, so queries can run concurrently with each other
//! but never alongside index mutation or pruning.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info};

use crate::algo::inverse_index::{IndexDistribution, InverseIndex};
use crate::algo::minhash::{Signature, SignatureComputer};
use crate::algo::neighborhood::{NeighborhoodQuery, QueryMode, QueryResult};
use crate::algo::parallel::Executor;
use crate::algo::pruning::{PruneReport, PruningPolicy};
use crate::algo::sparse::SparseMatrix;
use crate::config::{MinHashConfig, MinHashParams};
use crate::error::{MinHashError, Result};

/// Upper bound on the number of slots one query result may hold.
pub const MAX_RESULT_SLOTS: usize = 1 << 24;

/// What to look up.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// An already indexed instance; its own id is never returned.
    Indexed(usize),
    /// A feature set, not necessarily sorted.
    Features(&'a [u64]),
    /// A precomputed signature from the same engine configuration.
    Signature(&'a Signature),
}

/// Edge weights of a neighborhood graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    Connectivity,
    Distance,
}

impl GraphMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "connectivity" => Some(Self::Connectivity),
            "distance" => Some(Self::Distance),
            _ => None,
        }
    }
}

/// One edge of a neighborhood graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub row: usize,
    pub col: usize,
    pub weight: f64,
}

pub struct MinHash {
    config: MinHashConfig,
    computer: SignatureComputer,
    pruning: PruningPolicy,
    executor: Executor,
    index: InverseIndex,
}

impl MinHash {
    pub fn new(config: MinHashConfig) -> Result<Self> {
        let computer = SignatureComputer::from_config(&config)?;
        let executor = Executor::new(config.number_of_cores(), config.chunking())?;
        let index = empty_index(&config);
        Ok(Self {
            pruning: PruningPolicy::from_config(&config),
            config,
            computer,
            executor,
            index,
        })
    }

    /// Validate `params` and build an engine.
    pub fn with_params(params: MinHashParams) -> Result<Self> {
        Self::new(MinHashConfig::new(params)?)
    }

    pub fn config(&self) -> &MinHashConfig {
        &self.config
    }

    pub fn index(&self) -> &InverseIndex {
        &self.index
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Number of indexed instances.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Replace the index with one built from `data`. Instance `i` is row `i`.
    ///
    /// The previous index stays in place until the new one is complete.
    pub fn fit(&mut self, data: SparseMatrix) -> Result<()> {
        let mut index = empty_index(&self.config);
        let ids = index_batch(
            &self.computer,
            &self.pruning,
            &self.executor,
            &mut index,
            data.into_rows(),
        );
        self.index = index;
        info!(
            instances = ids.len(),
            blocks = self.index.number_of_blocks(),
            "fitted inverse index"
        );
        Ok(())
    }

    /// Index additional rows under ids continuing from the current count.
    ///
    /// Previously indexed instances are not reprocessed. If this fails midway
    /// the index must be rebuilt with [`MinHash::fit`].
    pub fn partial_fit(&mut self, data: SparseMatrix) -> Result<Range<usize>> {
        let ids = index_batch(
            &self.computer,
            &self.pruning,
            &self.executor,
            &mut self.index,
            data.into_rows(),
        );
        debug!(start = ids.start, end = ids.end, "extended inverse index");
        Ok(ids)
    }

    /// Run the configured pruning pass now.
    pub fn prune(&mut self) -> PruneReport {
        let report = self.pruning.apply(&mut self.index);
        info!(
            blocks_dropped = report.blocks_dropped,
            entries_removed = report.entries_removed,
            "pruned inverse index"
        );
        report
    }

    /// Run an explicit pruning pass regardless of the configured thresholds.
    pub fn prune_with(&mut self, policy: &PruningPolicy) -> PruneReport {
        let report = policy.apply(&mut self.index);
        info!(
            blocks_dropped = report.blocks_dropped,
            entries_removed = report.entries_removed,
            "pruned inverse index"
        );
        report
    }

    /// Bucket-size histogram and per-block statistics.
    pub fn get_distribution_of_inverse_index(&self) -> IndexDistribution {
        self.index.distribution()
    }

    /// Signature of a feature set under this engine's hash family.
    pub fn signature(&self, features: &[u64]) -> Signature {
        self.computer.compute(&normalize(features))
    }

    fn query_view(&self) -> NeighborhoodQuery<'_> {
        NeighborhoodQuery::new(
            &self.index,
            self.config.minimal_blocks_in_common(),
            self.config.excess_factor(),
        )
    }

    /// Reject neighborhoods whose padded result would not fit in memory.
    fn check_result_size(&self, k: usize, mode: QueryMode) -> Result<()> {
        let slots = match mode {
            QueryMode::CandidatePool => k.checked_mul(self.config.excess_factor()),
            QueryMode::Fast | QueryMode::Refined => Some(k),
        };
        match slots {
            Some(n) if n <= MAX_RESULT_SLOTS => Ok(()),
            _ => Err(MinHashError::InvalidInput(format!(
                "k = {k} asks for more than {MAX_RESULT_SLOTS} result slots in {mode:?} mode"
            ))),
        }
    }

    /// The `k` nearest neighbors of `query`, padded with `-1`.
    pub fn neighbors(&self, query: Query<'_>, k: usize, mode: QueryMode) -> Result<QueryResult> {
        self.check_result_size(k, mode)?;
        let view = self.query_view();
        match query {
            Query::Indexed(id) => {
                let sig = self.indexed_signature(id)?;
                Ok(view.run(sig, self.index.features(id), Some(id), k, mode))
            }
            Query::Features(features) => {
                let features = normalize(features);
                let sig = self.computer.compute(&features);
                Ok(view.run(&sig, Some(&features), None, k, mode))
            }
            Query::Signature(sig) => {
                self.check_signature(sig)?;
                Ok(view.run(sig, None, None, k, mode))
            }
        }
    }

    /// Neighbors for many queries, in query order.
    pub fn neighbors_batch(
        &self,
        queries: &[Query<'_>],
        k: usize,
        mode: QueryMode,
    ) -> Result<Vec<QueryResult>> {
        self.check_result_size(k, mode)?;
        self.executor
            .map(queries, |q| self.neighbors(*q, k, mode))
            .into_iter()
            .collect()
    }

    /// Neighbors of every indexed instance, excluding itself.
    pub fn neighbors_of_indexed(&self, k: usize, mode: QueryMode) -> Result<Vec<QueryResult>> {
        self.check_result_size(k, mode)?;
        let view = self.query_view();
        let ids: Vec<usize> = (0..self.index.len()).collect();
        Ok(self.executor.map(&ids, |&id| match self.index.signature(id) {
            Some(sig) => view.run(sig, self.index.features(id), Some(id), k, mode),
            None => QueryResult::empty(k),
        }))
    }

    /// Fit on `data`, then return the neighbors of every instance.
    pub fn fit_neighbors(
        &mut self,
        data: SparseMatrix,
        k: usize,
        mode: QueryMode,
    ) -> Result<Vec<QueryResult>> {
        self.check_result_size(k, mode)?;
        self.fit(data)?;
        self.neighbors_of_indexed(k, mode)
    }

    /// All candidates within distance `radius` (`1 - score`), unpadded.
    pub fn radius_neighbors(
        &self,
        query: Query<'_>,
        radius: f64,
        mode: QueryMode,
    ) -> Result<Vec<(usize, f64)>> {
        let view = self.query_view();
        let refine = mode == QueryMode::Refined;
        match query {
            Query::Indexed(id) => {
                let sig = self.indexed_signature(id)?;
                Ok(view.within_radius(sig, self.index.features(id), Some(id), radius, refine))
            }
            Query::Features(features) => {
                let features = normalize(features);
                let sig = self.computer.compute(&features);
                Ok(view.within_radius(&sig, Some(&features), None, radius, refine))
            }
            Query::Signature(sig) => {
                self.check_signature(sig)?;
                Ok(view.within_radius(sig, None, None, radius, refine))
            }
        }
    }

    /// k-neighbor graph over the indexed instances, sorted by `(row, col)`.
    pub fn kneighbors_graph(
        &self,
        k: usize,
        graph_mode: GraphMode,
        symmetric: bool,
        mode: QueryMode,
    ) -> Result<Vec<Edge>> {
        let mut edges: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (row, result) in self.neighbors_of_indexed(k, mode)?.iter().enumerate() {
            for (col, score) in result.found() {
                let weight = match graph_mode {
                    GraphMode::Connectivity => 1.0,
                    GraphMode::Distance => 1.0 - score,
                };
                edges.insert((row, col), weight);
            }
        }
        if symmetric {
            let forward: Vec<((usize, usize), f64)> = edges.iter().map(|(&e, &w)| (e, w)).collect();
            for ((row, col), weight) in forward {
                edges.entry((col, row)).or_insert(weight);
            }
        }
        Ok(edges
            .into_iter()
            .map(|((row, col), weight)| Edge { row, col, weight })
            .collect())
    }

    fn indexed_signature(&self, id: usize) -> Result<&Signature> {
        self.index
            .signature(id)
            .ok_or(MinHashError::UnknownInstance {
                id,
                len: self.index.len(),
            })
    }

    fn check_signature(&self, sig: &Signature) -> Result<()> {
        if sig.minima().len() != self.config.number_of_hash_functions()
            || sig.number_of_blocks() != self.config.number_of_blocks()
        {
            return Err(MinHashError::InvalidInput(format!(
                "signature has {} minima and {} blocks, engine expects {} and {}",
                sig.minima().len(),
                sig.number_of_blocks(),
                self.config.number_of_hash_functions(),
                self.config.number_of_blocks()
            )));
        }
        Ok(())
    }
}

/// Compute signatures for `rows`, store them, and insert them into the
/// buckets, pruning once midway when the policy asks for it.
fn index_batch(
    computer: &SignatureComputer,
    pruning: &PruningPolicy,
    executor: &Executor,
    index: &mut InverseIndex,
    rows: Vec<Vec<u64>>,
) -> Range<usize> {
    let signatures = computer.compute_all(&rows, executor);
    let ids = index.append(rows, signatures);
    match pruning.trigger_point(ids.len()) {
        Some(split) => {
            let mid = ids.start + split;
            index.insert_range(ids.start..mid, executor);
            let report = pruning.apply(index);
            debug!(
                after = split,
                blocks_dropped = report.blocks_dropped,
                entries_removed = report.entries_removed,
                "automatic pruning"
            );
            index.insert_range(mid..ids.end, executor);
        }
        None => index.insert_range(ids.clone(), executor),
    }
    ids
}

fn empty_index(config: &MinHashConfig) -> InverseIndex {
    InverseIndex::new(config.number_of_blocks(), config.max_bin_size())
        .with_low_bit_filter(config.remove_value_with_least_significant_bit())
}

fn normalize(features: &[u64]) -> Vec<u64> {
    let mut features = features.to_vec();
    features.sort_unstable();
    features.dedup();
    features
}
