use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::Result;

/// How work is split across the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunking {
    /// Let rayon's work stealing decide.
    Default,
    /// Fixed number of items per task.
    Fixed(usize),
    /// One contiguous chunk per worker.
    PerWorker,
}

impl From<i64> for Chunking {
    fn from(chunk_size: i64) -> Self {
        match chunk_size {
            0 => Self::Default,
            n if n > 0 => Self::Fixed(n as usize),
            _ => Self::PerWorker,
        }
    }
}

/// Worker pool owned by an engine.
///
/// Every operation returns exactly what a sequential loop would; the pool
/// size and chunking only change throughput.
pub struct Executor {
    pool: ThreadPool,
    chunking: Chunking,
}

impl Executor {
    /// `workers == 0` uses every available core.
    pub fn new(workers: usize, chunking: Chunking) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("minhash-worker-{i}"))
            .build()?;
        debug!(workers = pool.current_num_threads(), ?chunking, "worker pool ready");
        Ok(Self { pool, chunking })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn chunking(&self) -> Chunking {
        self.chunking
    }

    fn chunk_len(&self, len: usize) -> Option<usize> {
        match self.chunking {
            Chunking::Default => None,
            Chunking::Fixed(n) => Some(n.max(1)),
            Chunking::PerWorker => Some(len.div_ceil(self.workers()).max(1)),
        }
    }

    /// Map every item, preserving input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| match self.chunk_len(items.len()) {
            None => items.par_iter().map(&f).collect(),
            Some(len) => items
                .par_chunks(len)
                .map(|chunk| chunk.iter().map(&f).collect::<Vec<R>>())
                .collect::<Vec<Vec<R>>>()
                .into_iter()
                .flatten()
                .collect(),
        })
    }

    /// Run `f(index, item)` on every slot. Slots are disjoint, so no locking
    /// is needed as long as `f` only touches its own slot.
    pub fn for_each_indexed_mut<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        let chunk_len = self.chunk_len(items.len());
        self.pool.install(|| match chunk_len {
            None => items
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, item)| f(i, item)),
            Some(len) => items
                .par_chunks_mut(len)
                .enumerate()
                .for_each(|(c, chunk)| {
                    for (offset, item) in chunk.iter_mut().enumerate() {
                        f(c * len + offset, item);
                    }
                }),
        })
    }
}
