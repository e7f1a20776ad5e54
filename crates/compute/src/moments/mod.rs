//! Streaming moment accumulation and finalization.
//!
//! [`MomentAccumulator`] folds embedding batches one vector at a time and can
//! be merged with siblings built over disjoint inputs. [`Statistics`] is the
//! finalized `(mu, sigma)` pair handed to the store.

pub mod accumulator;
pub mod statistics;


pub use accumulator::{packed_len, MomentAccumulator};
pub use statistics::Statistics;
