use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub accumulator: AccumulatorConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FIDSTATS_PROFILE`. When set (e.g. `CHILDREN`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FIDSTATS_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            accumulator: AccumulatorConfig::from_env_profiled(p),
            store: StoreConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  accumulator: dims={}, batch_size={}, workers={}",
            self.accumulator.dims,
            self.accumulator.batch_size,
            self.accumulator.resolved_workers()
        );
        tracing::info!(
            "  store:       output={}, compression={}",
            self.store.output_path.display(),
            self.store.compression
        );
    }

    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "accumulator": {
                "dims": self.accumulator.dims,
                "batch_size": self.accumulator.batch_size,
                "workers": self.accumulator.resolved_workers(),
            },
            "store": {
                "output_path": self.store.output_path,
                "compression": self.store.compression,
            },
        })
    }
}

// ── Accumulator ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulatorConfig {
    /// Embedding dimensionality D. Must match the extractor's output.
    pub dims: usize,
    /// Vectors per fold step. Affects throughput only, never the result.
    pub batch_size: usize,
    /// Shard fold threads. 0 = one per CPU.
    pub workers: usize,
}

impl AccumulatorConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            dims: profiled_env_usize(p, "EMBEDDING_DIMS", 2048),
            batch_size: profiled_env_usize(p, "BATCH_SIZE", 50).max(1),
            workers: profiled_env_usize(p, "WORKERS", 0),
        }
    }

    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        }
    }
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            dims: 2048,
            batch_size: 50,
            workers: 0,
        }
    }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub output_path: PathBuf,
    pub compression: Compression,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        let compression = profiled_env_or(p, "ARCHIVE_COMPRESSION", "none");
        let compression = compression.parse().unwrap_or_else(|e| {
            tracing::warn!("{}, falling back to no compression", e);
            Compression::None
        });
        Self {
            output_path: PathBuf::from(profiled_env_or(p, "OUTPUT_PATH", "stats/fid_stats.fidz")),
            compression,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("stats/fid_stats.fidz"),
            compression: Compression::None,
        }
    }
}

/// Payload compression for stored archives. Both settings are lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => f.write_str("none"),
            Compression::Zstd => f.write_str("zstd"),
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "zstd" => Ok(Compression::Zstd),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}
