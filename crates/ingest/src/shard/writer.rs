use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::embedding::EmbeddingError;

/// Writes embeddings to a `.emb` shard: zstd-compressed, length-prefixed
/// MessagePack records.
pub struct ShardWriter {
    path: PathBuf,
    encoder: zstd::Encoder<'static, BufWriter<fs::File>>,
    count: usize,
}

impl ShardWriter {
    pub fn create(path: &Path) -> Result<Self, EmbeddingError> {
        let wrap = |e: std::io::Error| EmbeddingError::Shard {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        let file = fs::File::create(path).map_err(wrap)?;
        let encoder = zstd::Encoder::new(BufWriter::new(file), 3).map_err(wrap)?;
        Ok(Self {
            path: path.to_path_buf(),
            encoder,
            count: 0,
        })
    }

    /// Append one embedding vector.
    pub fn append(&mut self, embedding: &[f32]) -> Result<(), EmbeddingError> {
        let encoded = rmp_serde::to_vec(embedding).map_err(|e| self.error(e))?;
        let len = encoded.len() as u32;
        self.encoder
            .write_all(&len.to_le_bytes())
            .and_then(|()| self.encoder.write_all(&encoded))
            .map_err(|e| self.error(e))?;
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finish the zstd stream and flush to disk.
    pub fn finish(self) -> Result<usize, EmbeddingError> {
        let path = self.path;
        let wrap = |e: std::io::Error| EmbeddingError::Shard {
            path: path.clone(),
            reason: e.to_string(),
        };
        let buf_writer = self.encoder.finish().map_err(wrap)?;
        let mut inner = buf_writer.into_inner().map_err(|e| wrap(e.into_error()))?;
        inner.flush().map_err(wrap)?;

        info!(shard = %path.display(), vectors = self.count, "shard written");
        Ok(self.count)
    }

    fn error(&self, e: impl std::fmt::Display) -> EmbeddingError {
        EmbeddingError::Shard {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}
