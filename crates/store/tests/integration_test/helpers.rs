use std::path::PathBuf;

use uuid::Uuid;

use fidstats_compute::{MomentAccumulator, Statistics};

/// Create a unique temp directory for each test.
pub fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fidstats-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Deterministic vectors with awkward, non-representable decimals.
pub fn make_vectors(n: usize, dim: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            (0..dim)
                .map(|j| ((i * 7 + j * 13) % 19) as f64 * 0.1 - (j as f64) / 3.0)
                .collect()
        })
        .collect()
}

pub fn make_accumulator(n: usize, dim: usize) -> MomentAccumulator {
    let mut acc = MomentAccumulator::new(dim).unwrap();
    acc.update(&make_vectors(n, dim)).unwrap();
    acc
}

pub fn make_stats(n: usize, dim: usize) -> Statistics {
    make_accumulator(n, dim).finalize().unwrap()
}

/// Bitwise equality, so -0.0 vs 0.0 or NaN payloads would be caught too.
pub fn assert_bits_eq(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert_eq!(x.to_bits(), y.to_bits(), "element {} differs: {} vs {}", i, x, y);
    }
}
