pub mod hash;
pub mod inverse_index;
pub mod minhash;
pub mod neighborhood;
pub mod parallel;
pub mod pruning;
pub mod shingle;
pub mod sparse;
pub mod tokenizer;
