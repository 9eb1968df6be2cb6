pub mod algo;
pub mod config;
pub mod engine;
pub mod error;
pub mod ops;

pub use algo::inverse_index::IndexDistribution;
pub use algo::minhash::Signature;
pub use algo::neighborhood::{QueryMode, QueryResult, NO_NEIGHBOR};
pub use algo::pruning::{PruneReport, PruningPolicy};
pub use algo::sparse::SparseMatrix;
pub use config::{MinHashConfig, MinHashParams};
pub use engine::{Edge, GraphMode, MinHash, Query};
pub use error::{MinHashError, Result};
