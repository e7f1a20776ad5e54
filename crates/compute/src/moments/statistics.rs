use fidstats_core::StatsError;

use super::accumulator::close_slices;

/// Finalized population statistics: mean vector `mu` and sample covariance
/// `sigma` (D×D, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    mu: Vec<f64>,
    sigma: Vec<f64>,
}

impl Statistics {
    /// Pair a mean vector with a row-major covariance matrix.
    ///
    /// `sigma` must hold exactly `mu.len()²` values.
    pub fn new(mu: Vec<f64>, sigma: Vec<f64>) -> Result<Self, StatsError> {
        let dim = mu.len();
        if dim == 0 {
            return Err(StatsError::ZeroDimension);
        }
        if sigma.len() != dim * dim {
            return Err(StatsError::DimensionMismatch {
                expected: dim * dim,
                got: sigma.len(),
            });
        }
        Ok(Self { mu, sigma })
    }

    pub fn dim(&self) -> usize {
        self.mu.len()
    }

    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    /// Covariance in row-major order.
    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    pub fn sigma_at(&self, i: usize, j: usize) -> f64 {
        self.sigma[i * self.dim() + j]
    }

    pub fn sigma_rows(&self) -> std::slice::Chunks<'_, f64> {
        self.sigma.chunks(self.dim())
    }

    /// Sum of per-dimension variances.
    pub fn trace_sigma(&self) -> f64 {
        (0..self.dim()).map(|i| self.sigma_at(i, i)).sum()
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.mu, self.sigma)
    }

    /// Relative-tolerance comparison on both arrays.
    pub fn approx_eq(&self, other: &Statistics, rel_tol: f64) -> bool {
        self.dim() == other.dim()
            && close_slices(&self.mu, &other.mu, rel_tol)
            && close_slices(&self.sigma, &other.sigma, rel_tol)
    }
}
