use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::embedding::EmbeddingError;

use super::ShardFormat;

/// Largest embedding a binary record may hold.
pub const MAX_RECORD_DIMS: usize = 1 << 22;

/// MessagePack array header plus one tagged `f32` per dimension.
const MAX_RECORD_BYTES: usize = 5 + 5 * MAX_RECORD_DIMS;

/// Streams embedding vectors out of a shard file, one record at a time.
///
/// Iteration stops after the first error.
///
/// Binary records are stored as `f32` and widened to `f64` on read.
pub struct ShardReader {
    path: PathBuf,
    source: Source,
    record: usize,
    failed: bool,
}

enum Source {
    Binary(zstd::Decoder<'static, BufReader<File>>),
    JsonLines(std::io::Lines<BufReader<File>>),
}

impl ShardReader {
    pub fn open(path: &Path) -> Result<Self, EmbeddingError> {
        let format = ShardFormat::from_path(path).ok_or_else(|| EmbeddingError::Shard {
            path: path.to_path_buf(),
            reason: "unrecognized shard extension, expected .emb or .jsonl".into(),
        })?;
        let wrap = |e: std::io::Error| EmbeddingError::Shard {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let file = File::open(path).map_err(wrap)?;
        let source = match format {
            ShardFormat::Binary => Source::Binary(zstd::Decoder::new(file).map_err(wrap)?),
            ShardFormat::JsonLines => Source::JsonLines(BufReader::new(file).lines()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            source,
            record: 0,
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Group records into batches of at most `size` vectors.
    pub fn batches(self, size: usize) -> ShardBatches {
        ShardBatches {
            reader: self,
            size: size.max(1),
            done: false,
        }
    }

    fn error(&self, reason: impl Into<String>) -> EmbeddingError {
        EmbeddingError::Shard {
            path: self.path.clone(),
            reason: format!("record {}: {}", self.record, reason.into()),
        }
    }

    fn next_binary(&mut self) -> Option<Result<Vec<f64>, EmbeddingError>> {
        let Source::Binary(decoder) = &mut self.source else {
            return None;
        };

        // Only a clean read of zero bytes at a record boundary ends the shard.
        // The decoder reports a cut-off zstd frame as an error, never as Ok(0).
        let mut len_buf = [0u8; 4];
        let first = loop {
            match decoder.read(&mut len_buf[..1]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(self.error(format!("truncated shard: {}", e)))),
            }
        };
        if first == 0 {
            return None;
        }
        if let Err(e) = decoder.read_exact(&mut len_buf[1..]) {
            return Some(Err(self.error(format!("truncated shard: {}", e))));
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_RECORD_BYTES {
            return Some(Err(self.error(format!(
                "record length {} exceeds limit of {} bytes",
                len, MAX_RECORD_BYTES
            ))));
        }
        let mut buf = vec![0u8; len];
        if let Err(e) = decoder.read_exact(&mut buf) {
            return Some(Err(self.error(format!("truncated shard: {}", e))));
        }
        Some(
            rmp_serde::from_slice::<Vec<f32>>(&buf)
                .map(|v| v.into_iter().map(f64::from).collect())
                .map_err(|e| self.error(e.to_string())),
        )
    }

    fn next_json(&mut self) -> Option<Result<Vec<f64>, EmbeddingError>> {
        loop {
            let Source::JsonLines(lines) = &mut self.source else {
                return None;
            };
            let line = match lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(self.error(e.to_string()))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str::<Vec<f64>>(&line).map_err(|e| self.error(e.to_string())),
            );
        }
    }
}

impl Iterator for ShardReader {
    type Item = Result<Vec<f64>, EmbeddingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = match self.source {
            Source::Binary(_) => self.next_binary(),
            Source::JsonLines(_) => self.next_json(),
        };
        match &item {
            Some(Ok(_)) => self.record += 1,
            // A damaged stream cannot be resynchronized.
            Some(Err(_)) => self.failed = true,
            None => {}
        }
        item
    }
}

/// Batches of vectors from a [`ShardReader`]. Stops after the first error.
pub struct ShardBatches {
    reader: ShardReader,
    size: usize,
    done: bool,
}

impl Iterator for ShardBatches {
    type Item = Result<Vec<Vec<f64>>, EmbeddingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.size);
        while batch.len() < self.size {
            match self.reader.next() {
                Some(Ok(v)) => batch.push(v),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}
