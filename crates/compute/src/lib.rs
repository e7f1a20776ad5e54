pub mod moments;
pub mod parallel;

pub use moments::{MomentAccumulator, Statistics};
pub use parallel::{accumulate_batches, fold_shards, merge_all, FoldError};
