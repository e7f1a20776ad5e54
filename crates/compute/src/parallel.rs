//! Fan-out/fan-in over independent accumulators.
//!
//! Each shard is folded into its own [`MomentAccumulator`] on a rayon pool,
//! then the partial states are reduced with pairwise merges. No accumulator
//! is shared between threads; only finished states cross the pool boundary.

use std::time::Instant;

use fidstats_core::StatsError;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::moments::MomentAccumulator;

/// Error from a parallel fold: either a shard callback failed or the pool
/// could not be built.
#[derive(Debug, thiserror::Error)]
pub enum FoldError<E> {
    #[error("shard {index} failed: {source}")]
    Shard {
        index: usize,
        #[source]
        source: E,
    },
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Fold every shard into its own accumulator on `workers` threads, then merge.
///
/// `fold` receives the shard and a fresh accumulator of dimension `dim`. The
/// first failing shard aborts the run; partial results are discarded.
pub fn fold_shards<S, F, E>(
    shards: &[S],
    dim: usize,
    workers: usize,
    fold: F,
) -> Result<MomentAccumulator, FoldError<E>>
where
    S: Sync,
    F: Fn(&S, &mut MomentAccumulator) -> Result<(), E> + Sync,
    E: Send,
{
    // Validate dim up front so an empty shard list still reports it.
    MomentAccumulator::new(dim)?;

    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| FoldError::Pool(e.to_string()))?;

    let partials: Vec<MomentAccumulator> = pool.install(|| {
        shards
            .par_iter()
            .enumerate()
            .map(|(index, shard)| -> Result<MomentAccumulator, FoldError<E>> {
                let mut acc = MomentAccumulator::new(dim)?;
                fold(shard, &mut acc).map_err(|source| FoldError::Shard { index, source })?;
                debug!(shard = index, count = acc.count(), "shard folded");
                Ok(acc)
            })
            .collect::<Result<Vec<_>, FoldError<E>>>()
    })?;

    let merged = merge_all(dim, partials)?;
    info!(
        shards = shards.len(),
        workers = workers.max(1),
        count = merged.count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parallel fold complete"
    );
    Ok(merged)
}

/// Reduce a list of accumulators with a balanced tree of pairwise merges.
///
/// An empty list yields the empty accumulator.
pub fn merge_all(
    dim: usize,
    states: Vec<MomentAccumulator>,
) -> Result<MomentAccumulator, StatsError> {
    let mut level = states;
    if level.is_empty() {
        return MomentAccumulator::new(dim);
    }
    if let Some(bad) = level.iter().find(|s| s.dim() != dim) {
        return Err(StatsError::DimensionMismatch {
            expected: dim,
            got: bad.dim(),
        });
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut iter = level.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => next.push(left.merge(right)?),
                None => next.push(left),
            }
        }
        level = next;
    }

    // Non-empty by the check above.
    level.pop().map_or_else(|| MomentAccumulator::new(dim), Ok)
}

/// Fold in-memory batches in parallel, one accumulator per batch.
pub fn accumulate_batches<V>(
    dim: usize,
    batches: &[Vec<V>],
    workers: usize,
) -> Result<MomentAccumulator, FoldError<StatsError>>
where
    V: AsRef<[f64]> + Sync,
{
    fold_shards(batches, dim, workers, |batch, acc| acc.update(batch))
}
