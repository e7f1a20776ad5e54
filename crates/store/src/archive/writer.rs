use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fidstats_core::config::Compression;
use fidstats_core::StatsError;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{ArchiveHeader, ArchiveKind, ArrayEntry, DType, FORMAT_VERSION, MAGIC};

/// Collects named arrays in memory, then writes them as one archive.
pub struct ArchiveWriter {
    kind: ArchiveKind,
    arrays: Vec<ArrayEntry>,
    payload: Vec<u8>,
}

impl ArchiveWriter {
    pub fn new(kind: ArchiveKind) -> Self {
        Self {
            kind,
            arrays: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// Append an `f64` array. `values.len()` must equal the product of `shape`.
    pub fn add_f64(&mut self, name: &str, shape: &[usize], values: &[f64]) -> &mut Self {
        debug_assert_eq!(shape.iter().product::<usize>(), values.len());
        let offset = self.payload.len() as u64;
        self.payload.reserve(values.len() * 8);
        for v in values {
            self.payload.extend_from_slice(&v.to_le_bytes());
        }
        self.push_entry(name, DType::F64, shape, offset);
        self
    }

    /// Append a `u64` array.
    pub fn add_u64(&mut self, name: &str, shape: &[usize], values: &[u64]) -> &mut Self {
        debug_assert_eq!(shape.iter().product::<usize>(), values.len());
        let offset = self.payload.len() as u64;
        for v in values {
            self.payload.extend_from_slice(&v.to_le_bytes());
        }
        self.push_entry(name, DType::U64, shape, offset);
        self
    }

    fn push_entry(&mut self, name: &str, dtype: DType, shape: &[usize], offset: u64) {
        self.arrays.push(ArrayEntry {
            name: name.to_string(),
            dtype,
            shape: shape.to_vec(),
            offset,
            nbytes: self.payload.len() as u64 - offset,
        });
    }

    /// Write the archive to `path`, replacing any existing file.
    ///
    /// Parent directories are created as needed. The bytes go to a temporary
    /// sibling first and are renamed into place, so a failed write never
    /// leaves a truncated archive at `path`.
    pub fn write(&self, path: &Path, compression: Compression) -> Result<ArchiveHeader, StatsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StatsError::io(parent, e))?;
        }

        let digest = Sha256::digest(&self.payload);
        let header = ArchiveHeader {
            version: FORMAT_VERSION,
            kind: self.kind,
            created_at: Utc::now(),
            compression,
            payload_sha256: format!("{digest:x}"),
            arrays: self.arrays.clone(),
        };
        let header_json = serde_json::to_vec(&header)
            .map_err(|e| StatsError::format(path, format!("header encode: {}", e)))?;

        let body = match compression {
            Compression::None => None,
            Compression::Zstd => Some(
                zstd::encode_all(self.payload.as_slice(), 3).map_err(|e| StatsError::io(path, e))?,
            ),
        };
        let body: &[u8] = body.as_deref().unwrap_or(&self.payload);

        let tmp_path = temp_sibling(path)?;
        let result = write_file(&tmp_path, &header_json, body)
            .and_then(|()| fs::rename(&tmp_path, path));
        if let Err(e) = result {
            fs::remove_file(&tmp_path).ok();
            return Err(StatsError::io(path, e));
        }

        info!(
            path = %path.display(),
            kind = %self.kind,
            arrays = self.arrays.len(),
            raw_bytes = self.payload.len(),
            stored_bytes = body.len(),
            compression = %compression,
            "archive written"
        );
        Ok(header)
    }
}

fn temp_sibling(path: &Path) -> Result<PathBuf, StatsError> {
    let file_name = path.file_name().ok_or_else(|| {
        StatsError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "archive path has no file name"),
        )
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

fn write_file(path: &Path, header_json: &[u8], body: &[u8]) -> std::io::Result<()> {
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    out.write_all(MAGIC)?;
    out.write_all(&(header_json.len() as u32).to_le_bytes())?;
    out.write_all(header_json)?;
    out.write_all(body)?;
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
