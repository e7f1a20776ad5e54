use std::path::Path;

use chrono::{DateTime, Utc};
use fidstats_compute::{MomentAccumulator, Statistics};
use fidstats_core::config::{Compression, StoreConfig};
use fidstats_core::StatsError;
use tracing::info;

use crate::archive::{ArchiveKind, ArchiveReader, ArchiveWriter};

pub const MU: &str = "mu";
pub const SIGMA: &str = "sigma";
pub const COUNT: &str = "count";
pub const MEAN: &str = "mean";
pub const M2_UPPER: &str = "m2_upper";

/// Persists finalized statistics and partial accumulator states.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsStore {
    compression: Compression,
}

/// What `describe` reports about an archive without materializing sigma.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSummary {
    pub kind: ArchiveKind,
    pub dims: usize,
    /// Vector count, only known for accumulator archives.
    pub count: Option<u64>,
    pub compression: Compression,
    pub created_at: DateTime<Utc>,
}

impl StatsStore {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.compression)
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Write `mu` and `sigma` as one archive at `path`, overwriting it.
    pub fn save(&self, path: &Path, stats: &Statistics) -> Result<(), StatsError> {
        let dim = stats.dim();
        let mut writer = ArchiveWriter::new(ArchiveKind::Statistics);
        writer
            .add_f64(MU, &[dim], stats.mu())
            .add_f64(SIGMA, &[dim, dim], stats.sigma());
        writer.write(path, self.compression)?;
        info!(path = %path.display(), dim, "statistics saved");
        Ok(())
    }

    /// Read `mu` and `sigma` back. Shapes must agree: `mu` is `[D]` and
    /// `sigma` is `[D, D]`.
    pub fn load(&self, path: &Path) -> Result<Statistics, StatsError> {
        let reader = ArchiveReader::open(path)?;
        let (mu_shape, mu) = reader.read_f64(MU)?;
        let (sigma_shape, sigma) = reader.read_f64(SIGMA)?;

        let dim = match mu_shape.as_slice() {
            [d] if *d > 0 => *d,
            other => {
                return Err(StatsError::format(
                    path,
                    format!("'{}' must be a non-empty 1-D array, found shape {:?}", MU, other),
                ))
            }
        };
        if sigma_shape != [dim, dim] {
            return Err(StatsError::format(
                path,
                format!(
                    "'{}' shape {:?} inconsistent with '{}' length {}",
                    SIGMA, sigma_shape, MU, dim
                ),
            ));
        }

        let stats = Statistics::new(mu, sigma)
            .map_err(|e| StatsError::format(path, e.to_string()))?;
        info!(path = %path.display(), dim, "statistics loaded");
        Ok(stats)
    }

    /// Persist a partial accumulator so it can be merged in another process.
    pub fn save_state(&self, path: &Path, state: &MomentAccumulator) -> Result<(), StatsError> {
        let dim = state.dim();
        let mut writer = ArchiveWriter::new(ArchiveKind::Accumulator);
        writer
            .add_u64(COUNT, &[1], &[state.count()])
            .add_f64(MEAN, &[dim], state.mean())
            .add_f64(M2_UPPER, &[state.packed_m2().len()], state.packed_m2());
        writer.write(path, self.compression)?;
        info!(path = %path.display(), dim, count = state.count(), "accumulator state saved");
        Ok(())
    }

    pub fn load_state(&self, path: &Path) -> Result<MomentAccumulator, StatsError> {
        let reader = ArchiveReader::open(path)?;
        if reader.header().kind != ArchiveKind::Accumulator {
            return Err(StatsError::format(
                path,
                format!("expected accumulator archive, found {}", reader.header().kind),
            ));
        }
        let (_, count) = reader.read_u64(COUNT)?;
        let (mean_shape, mean) = reader.read_f64(MEAN)?;
        let (_, m2) = reader.read_f64(M2_UPPER)?;

        let count = match count.as_slice() {
            [c] => *c,
            _ => return Err(StatsError::format(path, format!("'{}' must hold one value", COUNT))),
        };
        let dim = match mean_shape.as_slice() {
            [d] => *d,
            other => {
                return Err(StatsError::format(
                    path,
                    format!("'{}' must be 1-D, found shape {:?}", MEAN, other),
                ))
            }
        };

        MomentAccumulator::from_parts(dim, count, mean, m2)
            .map_err(|e| StatsError::format(path, e.to_string()))
    }

    /// Summarize an archive's header.
    pub fn describe(&self, path: &Path) -> Result<ArchiveSummary, StatsError> {
        let reader = ArchiveReader::open(path)?;
        let header = reader.header();
        let dims_source = match header.kind {
            ArchiveKind::Statistics => MU,
            ArchiveKind::Accumulator => MEAN,
        };
        let dims = header
            .array(dims_source)
            .and_then(|a| a.shape.first().copied())
            .ok_or_else(|| StatsError::format(path, format!("missing array '{}'", dims_source)))?;
        let count = match header.kind {
            ArchiveKind::Statistics => None,
            ArchiveKind::Accumulator => reader.read_u64(COUNT)?.1.first().copied(),
        };

        Ok(ArchiveSummary {
            kind: header.kind,
            dims,
            count,
            compression: header.compression,
            created_at: header.created_at,
        })
    }
}
