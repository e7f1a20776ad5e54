mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use fidstats_core::Config;

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    fidstats_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let mut config = Config::from_env();

    match args.command {
        Command::Compute {
            input,
            output,
            tuning,
        } => {
            tuning.apply(&mut config.accumulator);
            if let Some(compression) = tuning.compression {
                config.store.compression = compression;
            }
            config.log_summary();
            commands::compute(&config, &input, output)
        }
        Command::Accumulate {
            input,
            state,
            tuning,
        } => {
            tuning.apply(&mut config.accumulator);
            if let Some(compression) = tuning.compression {
                config.store.compression = compression;
            }
            config.log_summary();
            commands::accumulate(&config, &input, &state)
        }
        Command::Merge {
            states,
            output,
            compression,
        } => {
            if let Some(compression) = compression {
                config.store.compression = compression;
            }
            config.log_summary();
            commands::merge(&config, &states, output)
        }
        Command::Inspect { archive } => commands::inspect(&archive),
    }
}
