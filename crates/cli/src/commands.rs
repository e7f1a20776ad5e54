use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fidstats_compute::{fold_shards, merge_all, MomentAccumulator};
use fidstats_core::config::AccumulatorConfig;
use fidstats_core::Config;
use fidstats_ingest::{accumulate_shard, discover_shards};
use fidstats_store::{ArchiveKind, StatsStore};
use tracing::info;

/// Discover shards under `input` and fold them on the configured workers.
fn fold_directory(input: &Path, acc: &AccumulatorConfig) -> Result<MomentAccumulator> {
    let shards = discover_shards(input)
        .with_context(|| format!("failed to list shards in {}", input.display()))?;
    if shards.is_empty() {
        bail!("no embedding shards found in {}", input.display());
    }

    let batch_size = acc.batch_size;
    let state = fold_shards(&shards, acc.dims, acc.resolved_workers(), |path, state| {
        accumulate_shard(path, state, batch_size).map(|_| ())
    })
    .context("failed to accumulate embeddings")?;
    info!(shards = shards.len(), vectors = state.count(), "embeddings accumulated");
    Ok(state)
}

pub fn compute(config: &Config, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let state = fold_directory(input, &config.accumulator)?;
    let stats = state
        .finalize()
        .context("not enough embeddings to estimate a covariance")?;

    let output = output.unwrap_or_else(|| config.store.output_path.clone());
    StatsStore::from_config(&config.store)
        .save(&output, &stats)
        .with_context(|| format!("failed to save statistics to {}", output.display()))?;

    println!("mu shape:    [{}]", stats.dim());
    println!("sigma shape: [{}, {}]", stats.dim(), stats.dim());
    println!("vectors:     {}", state.count());
    println!("saved to {}", output.display());
    Ok(())
}

pub fn accumulate(config: &Config, input: &Path, state_path: &Path) -> Result<()> {
    let state = fold_directory(input, &config.accumulator)?;
    StatsStore::from_config(&config.store)
        .save_state(state_path, &state)
        .with_context(|| format!("failed to save state to {}", state_path.display()))?;

    println!("vectors: {} (dims {})", state.count(), state.dim());
    println!("state saved to {}", state_path.display());
    Ok(())
}

pub fn merge(config: &Config, states: &[PathBuf], output: Option<PathBuf>) -> Result<()> {
    let store = StatsStore::from_config(&config.store);
    let partials = states
        .iter()
        .map(|path| {
            store
                .load_state(path)
                .with_context(|| format!("failed to load state {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let dim = partials.first().map(|s| s.dim()).unwrap_or(config.accumulator.dims);
    let merged = merge_all(dim, partials).context("partial states do not merge")?;
    let stats = merged
        .finalize()
        .context("not enough embeddings to estimate a covariance")?;

    let output = output.unwrap_or_else(|| config.store.output_path.clone());
    store
        .save(&output, &stats)
        .with_context(|| format!("failed to save statistics to {}", output.display()))?;

    println!("merged {} states, {} vectors", states.len(), merged.count());
    println!("mu shape:    [{}]", stats.dim());
    println!("sigma shape: [{}, {}]", stats.dim(), stats.dim());
    println!("saved to {}", output.display());
    Ok(())
}

pub fn inspect(archive: &Path) -> Result<()> {
    let store = StatsStore::default();
    let summary = store
        .describe(archive)
        .with_context(|| format!("failed to read {}", archive.display()))?;

    println!("kind:        {}", summary.kind);
    println!("dims:        {}", summary.dims);
    println!("compression: {}", summary.compression);
    println!("created:     {}", summary.created_at.to_rfc3339());

    let stats = match summary.kind {
        ArchiveKind::Statistics => Some(store.load(archive)?),
        ArchiveKind::Accumulator => {
            let state = store.load_state(archive)?;
            println!("count:       {}", state.count());
            // A state with fewer than two vectors has no covariance yet.
            state.finalize().ok()
        }
    };
    if let Some(stats) = stats {
        println!("trace(sigma): {:.6}", stats.trace_sigma());
    }
    Ok(())
}
