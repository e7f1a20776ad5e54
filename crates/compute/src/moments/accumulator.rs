use fidstats_core::StatsError;
use tracing::debug;

use super::statistics::Statistics;

/// Streaming first- and second-moment accumulator over fixed-length vectors.
///
/// Holds the running sufficient statistic `{count, mean, M2}` where `M2` is the
/// sum of outer products of deviations from the running mean (Welford's
/// scheme, generalized to D dimensions). Memory is O(D²) and independent of
/// how many vectors have been folded in.
///
/// Two accumulators built over disjoint inputs can be combined with
/// [`MomentAccumulator::merge`] without revisiting any vector, which is what
/// makes sharded and parallel folds possible.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentAccumulator {
    dim: usize,
    count: u64,
    mean: Vec<f64>,
    /// Upper triangle of M2, packed row-major: row `i` holds columns `i..dim`.
    m2: Vec<f64>,
}

/// Number of entries in the packed upper triangle of a `dim × dim` matrix.
pub fn packed_len(dim: usize) -> usize {
    dim * (dim + 1) / 2
}

/// Offset of `(i, j)` (with `i <= j`) in the packed upper triangle.
#[inline]
fn packed_index(dim: usize, i: usize, j: usize) -> usize {
    debug_assert!(i <= j && j < dim);
    i * (2 * dim - i + 1) / 2 + (j - i)
}

/// Inverse of [`packed_index`]: the `(i, j)` cell stored at `idx`.
fn unpack_index(dim: usize, mut idx: usize) -> (usize, usize) {
    for i in 0..dim {
        let row_len = dim - i;
        if idx < row_len {
            return (i, i + idx);
        }
        idx -= row_len;
    }
    (dim, dim)
}

impl MomentAccumulator {
    /// Create an empty accumulator for `dim`-dimensional vectors.
    pub fn new(dim: usize) -> Result<Self, StatsError> {
        if dim == 0 {
            return Err(StatsError::ZeroDimension);
        }
        Ok(Self {
            dim,
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; packed_len(dim)],
        })
    }

    /// Rebuild an accumulator from persisted parts.
    ///
    /// `packed_m2` is the upper triangle in the layout returned by
    /// [`MomentAccumulator::packed_m2`]. The parts must describe a state that
    /// folding could have produced: an empty state is all zeros, a single
    /// vector has zero M2, and the M2 diagonal is never negative.
    pub fn from_parts(
        dim: usize,
        count: u64,
        mean: Vec<f64>,
        packed_m2: Vec<f64>,
    ) -> Result<Self, StatsError> {
        if dim == 0 {
            return Err(StatsError::ZeroDimension);
        }
        if mean.len() != dim {
            return Err(StatsError::DimensionMismatch {
                expected: dim,
                got: mean.len(),
            });
        }
        if packed_m2.len() != packed_len(dim) {
            return Err(StatsError::DimensionMismatch {
                expected: packed_len(dim),
                got: packed_m2.len(),
            });
        }
        if let Some(column) = mean.iter().position(|v| !v.is_finite()) {
            return Err(StatsError::NonFinite { row: 0, column });
        }
        if let Some(idx) = packed_m2.iter().position(|v| !v.is_finite()) {
            let (row, column) = unpack_index(dim, idx);
            return Err(StatsError::NonFinite { row, column });
        }

        match count {
            0 if mean.iter().chain(&packed_m2).any(|&v| v != 0.0) => {
                return Err(StatsError::InvalidState(
                    "empty state with non-zero mean or M2".into(),
                ));
            }
            1 if packed_m2.iter().any(|&v| v != 0.0) => {
                return Err(StatsError::InvalidState(
                    "single-vector state with non-zero M2".into(),
                ));
            }
            _ => {}
        }
        if let Some(i) = (0..dim).find(|&i| packed_m2[packed_index(dim, i, i)] < 0.0) {
            return Err(StatsError::InvalidState(format!(
                "negative M2 diagonal at {}",
                i
            )));
        }

        Ok(Self {
            dim,
            count,
            mean,
            m2: packed_m2,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running mean. All zeros while the accumulator is empty.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Packed upper triangle of M2, row-major.
    pub fn packed_m2(&self) -> &[f64] {
        &self.m2
    }

    /// Entry `(i, j)` of the symmetric M2 matrix.
    pub fn m2_at(&self, i: usize, j: usize) -> f64 {
        let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
        self.m2[packed_index(self.dim, lo, hi)]
    }

    /// Fold a batch of vectors into the running state, in batch order.
    ///
    /// The whole batch is validated before anything is applied, so a
    /// mismatched dimension or a NaN anywhere in the batch leaves the
    /// accumulator untouched. An empty batch is a no-op.
    pub fn update<V: AsRef<[f64]>>(&mut self, batch: &[V]) -> Result<(), StatsError> {
        for (row, v) in batch.iter().enumerate() {
            self.validate(row, v.as_ref())?;
        }

        let mut delta = vec![0.0; self.dim];
        let mut delta2 = vec![0.0; self.dim];
        for v in batch {
            self.apply(v.as_ref(), &mut delta, &mut delta2);
        }
        Ok(())
    }

    /// [`MomentAccumulator::update`] for `f32` embeddings. The widening to
    /// `f64` is exact.
    pub fn update_f32<V: AsRef<[f32]>>(&mut self, batch: &[V]) -> Result<(), StatsError> {
        let widened: Vec<Vec<f64>> = batch
            .iter()
            .map(|v| v.as_ref().iter().map(|&x| f64::from(x)).collect())
            .collect();
        self.update(&widened)
    }

    /// Fold a single vector.
    pub fn push(&mut self, x: &[f64]) -> Result<(), StatsError> {
        self.update(&[x])
    }

    fn validate(&self, row: usize, x: &[f64]) -> Result<(), StatsError> {
        if x.len() != self.dim {
            return Err(StatsError::DimensionMismatch {
                expected: self.dim,
                got: x.len(),
            });
        }
        if let Some(column) = x.iter().position(|v| !v.is_finite()) {
            return Err(StatsError::NonFinite { row, column });
        }
        Ok(())
    }

    /// One online step. `delta` and `delta2` are scratch space of length `dim`.
    ///
    /// `delta` uses the mean before the step and `delta2` the mean after it;
    /// swapping either breaks the recurrence.
    fn apply(&mut self, x: &[f64], delta: &mut [f64], delta2: &mut [f64]) {
        self.count += 1;
        let n = self.count as f64;

        for (((d, d2), m), &xi) in delta
            .iter_mut()
            .zip(delta2.iter_mut())
            .zip(self.mean.iter_mut())
            .zip(x)
        {
            *d = xi - *m;
            *m += *d / n;
            *d2 = xi - *m;
        }

        let dim = self.dim;
        let mut offset = 0;
        for i in 0..dim {
            let di = delta[i];
            let row = &mut self.m2[offset..offset + (dim - i)];
            for (cell, &d2) in row.iter_mut().zip(&delta2[i..]) {
                *cell += di * d2;
            }
            offset += dim - i;
        }
    }

    /// Combine another accumulator into this one (parallel-combination identity).
    ///
    /// Merging an empty accumulator is an exact no-op on either side. On a
    /// dimension mismatch `self` is left unchanged.
    pub fn merge_from(&mut self, other: &MomentAccumulator) -> Result<(), StatsError> {
        if self.dim != other.dim {
            return Err(StatsError::DimensionMismatch {
                expected: self.dim,
                got: other.dim,
            });
        }
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            self.count = other.count;
            self.mean.copy_from_slice(&other.mean);
            self.m2.copy_from_slice(&other.m2);
            return Ok(());
        }

        let na = self.count as f64;
        let nb = other.count as f64;
        let total = self.count + other.count;
        let n = total as f64;
        let weight = na * nb / n;

        let delta: Vec<f64> = self
            .mean
            .iter()
            .zip(&other.mean)
            .map(|(ma, mb)| ma - mb)
            .collect();

        for (ma, &mb) in self.mean.iter_mut().zip(&other.mean) {
            *ma = (na * *ma + nb * mb) / n;
        }

        let dim = self.dim;
        let mut offset = 0;
        for i in 0..dim {
            for j in i..dim {
                let idx = offset + (j - i);
                self.m2[idx] = self.m2[idx] + other.m2[idx] + delta[i] * delta[j] * weight;
            }
            offset += dim - i;
        }

        debug!(
            left = self.count,
            right = other.count,
            total,
            dim,
            "merged moment accumulators"
        );
        self.count = total;
        Ok(())
    }

    /// By-value form of [`MomentAccumulator::merge_from`].
    pub fn merge(mut self, other: MomentAccumulator) -> Result<Self, StatsError> {
        self.merge_from(&other)?;
        Ok(self)
    }

    /// Produce the mean vector and the Bessel-corrected sample covariance.
    ///
    /// Fails with [`StatsError::InsufficientData`] below two vectors; no
    /// covariance is ever produced from fewer.
    pub fn finalize(&self) -> Result<Statistics, StatsError> {
        if self.count < 2 {
            return Err(StatsError::InsufficientData { count: self.count });
        }

        let dim = self.dim;
        let denom = (self.count - 1) as f64;
        let mut sigma = vec![0.0; dim * dim];
        let mut offset = 0;
        for i in 0..dim {
            for j in i..dim {
                let v = self.m2[offset + (j - i)] / denom;
                sigma[i * dim + j] = v;
                sigma[j * dim + i] = v;
            }
            offset += dim - i;
        }

        debug!(count = self.count, dim, "finalized statistics");
        Statistics::new(self.mean.clone(), sigma)
    }

    /// Compare two accumulators with a relative tolerance on mean and M2.
    ///
    /// Counts and dimensions must match exactly.
    pub fn approx_eq(&self, other: &MomentAccumulator, rel_tol: f64) -> bool {
        self.dim == other.dim
            && self.count == other.count
            && close_slices(&self.mean, &other.mean, rel_tol)
            && close_slices(&self.m2, &other.m2, rel_tol)
    }
}

/// Element-wise closeness, scaled by the larger magnitude of the two slices.
pub(crate) fn close_slices(a: &[f64], b: &[f64], rel_tol: f64) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let scale = a
        .iter()
        .chain(b)
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= rel_tol * scale)
}
