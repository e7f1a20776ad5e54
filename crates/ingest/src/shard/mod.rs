//! Embedding shard files: precomputed embeddings on disk, one file per shard.
//!
//! Two formats are understood, picked by extension:
//! - `.emb`: a zstd stream of `[u32 LE length][MessagePack Vec<f32>]` records
//! - `.jsonl`: one JSON array of numbers per line

pub mod reader;
pub mod writer;

use std::path::{Path, PathBuf};

use fidstats_compute::MomentAccumulator;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingError;

pub use reader::{ShardBatches, ShardReader};
pub use writer::ShardWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardFormat {
    Binary,
    JsonLines,
}

impl ShardFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("emb") => Some(ShardFormat::Binary),
            Some("jsonl") => Some(ShardFormat::JsonLines),
            _ => None,
        }
    }
}

/// List shard files directly inside `dir`, sorted by file name.
pub fn discover_shards(dir: &Path) -> Result<Vec<PathBuf>, EmbeddingError> {
    let entries = std::fs::read_dir(dir).map_err(|e| EmbeddingError::Shard {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut shards: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ShardFormat::from_path(path).is_some())
        .collect();
    shards.sort();

    info!(dir = %dir.display(), shards = shards.len(), "discovered embedding shards");
    Ok(shards)
}

/// Stream one shard file into `acc`, `batch_size` vectors at a time.
///
/// Only one batch is resident at once. Returns the number of vectors folded.
pub fn accumulate_shard(
    path: &Path,
    acc: &mut MomentAccumulator,
    batch_size: usize,
) -> Result<u64, EmbeddingError> {
    let before = acc.count();
    for batch in ShardReader::open(path)?.batches(batch_size) {
        let batch = batch?;
        if let Err(e) = acc.update(&batch) {
            warn!(shard = %path.display(), error = %e, "shard rejected by accumulator");
            return Err(e.into());
        }
    }
    let folded = acc.count() - before;
    debug!(shard = %path.display(), vectors = folded, "shard accumulated");
    Ok(folded)
}
