use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fidstats_core::config::{AccumulatorConfig, Compression};

/// Reference statistics (mu, sigma) for FID evaluation.
///
/// Streams precomputed embedding shards through a mergeable moment
/// accumulator, so the full embedding matrix is never held in memory.
#[derive(Parser, Debug)]
#[command(name = "fid-stats", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fold every shard in a directory and save finalized mu/sigma.
    Compute {
        /// Directory holding `.emb` / `.jsonl` embedding shards
        #[arg(long)]
        input: PathBuf,

        /// Archive to write (defaults to OUTPUT_PATH)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Fold shards and save the partial accumulator state, without finalizing.
    Accumulate {
        #[arg(long)]
        input: PathBuf,

        /// Where to write the partial state
        #[arg(long)]
        state: PathBuf,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Merge partial states from separate runs and save finalized mu/sigma.
    Merge {
        /// Partial state archive; repeat for each run
        #[arg(long = "state", required = true)]
        states: Vec<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,

        /// Archive compression: none or zstd
        #[arg(long)]
        compression: Option<Compression>,
    },

    /// Print what an archive holds.
    Inspect {
        archive: PathBuf,
    },
}

/// Overrides for the accumulator settings loaded from the environment.
#[derive(Args, Debug, Default)]
pub struct Tuning {
    /// Embedding dimensionality
    #[arg(long)]
    pub dims: Option<usize>,

    /// Vectors folded per update
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Worker threads, 0 = one per CPU
    #[arg(long)]
    pub workers: Option<usize>,

    /// Archive compression: none or zstd
    #[arg(long)]
    pub compression: Option<Compression>,
}

impl Tuning {
    pub fn apply(&self, config: &mut AccumulatorConfig) {
        if let Some(dims) = self.dims {
            config.dims = dims;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size.max(1);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}
