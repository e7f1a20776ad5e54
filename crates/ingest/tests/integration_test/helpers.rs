use std::path::{Path, PathBuf};

use uuid::Uuid;

use fidstats_ingest::ShardWriter;

/// Create a unique temp directory for each test.
pub fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fidstats-ingest-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Deterministic f32 embeddings with a per-dimension offset.
pub fn make_embeddings(start: usize, n: usize, dim: usize) -> Vec<Vec<f32>> {
    (start..start + n)
        .map(|i| {
            (0..dim)
                .map(|j| ((i * 11 + j * 5) % 17) as f32 * 0.25 + j as f32)
                .collect()
        })
        .collect()
}

pub fn write_binary_shard(path: &Path, vectors: &[Vec<f32>]) {
    let mut writer = ShardWriter::create(path).unwrap();
    for v in vectors {
        writer.append(v).unwrap();
    }
    writer.finish().unwrap();
}

pub fn write_jsonl_shard(path: &Path, vectors: &[Vec<f32>]) {
    let lines: Vec<String> = vectors
        .iter()
        .map(|v| serde_json::to_string(v).unwrap())
        .collect();
    std::fs::write(path, lines.join("\n")).unwrap();
}
