use std::path::{Path, PathBuf};

use fidstats_core::config::Compression;
use fidstats_core::StatsError;
use memmap2::Mmap;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ArchiveHeader, ArrayEntry, DType, FORMAT_VERSION, MAGIC, PREAMBLE_LEN};

pub struct ArchiveReader {
    path: PathBuf,
    header: ArchiveHeader,
    payload: Payload,
}

enum Payload {
    /// Uncompressed archive: payload read straight from the mapping.
    Mapped { mmap: Mmap, start: usize },
    Decompressed(Vec<u8>),
}

impl Payload {
    fn as_slice(&self) -> &[u8] {
        match self {
            Payload::Mapped { mmap, start } => &mmap[*start..],
            Payload::Decompressed(buf) => buf,
        }
    }
}

impl ArchiveReader {
    /// Open and verify an archive: magic, header, checksum, array bounds.
    pub fn open(path: &Path) -> Result<Self, StatsError> {
        let file = std::fs::File::open(path).map_err(|e| StatsError::io(path, e))?;
        let file_len = file.metadata().map_err(|e| StatsError::io(path, e))?.len() as usize;
        if file_len < PREAMBLE_LEN {
            return Err(StatsError::format(path, "file too short for archive preamble"));
        }

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| StatsError::io(path, e))?;

        if &mmap[..MAGIC.len()] != MAGIC {
            return Err(StatsError::format(path, "bad magic, not a statistics archive"));
        }
        let header_len = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]) as usize;
        let header_end = PREAMBLE_LEN + header_len;
        if header_end > mmap.len() {
            return Err(StatsError::format(path, "truncated header"));
        }

        let header: ArchiveHeader = serde_json::from_slice(&mmap[PREAMBLE_LEN..header_end])
            .map_err(|e| StatsError::format(path, format!("invalid header: {}", e)))?;
        if header.version != FORMAT_VERSION {
            return Err(StatsError::format(
                path,
                format!("unsupported archive version {}", header.version),
            ));
        }

        let payload = match header.compression {
            Compression::None => Payload::Mapped {
                mmap,
                start: header_end,
            },
            Compression::Zstd => {
                let decompressed = zstd::decode_all(&mmap[header_end..])
                    .map_err(|e| StatsError::format(path, format!("zstd payload: {}", e)))?;
                Payload::Decompressed(decompressed)
            }
        };

        let reader = Self {
            path: path.to_path_buf(),
            header,
            payload,
        };
        reader.verify()?;
        debug!(
            path = %path.display(),
            kind = %reader.header.kind,
            arrays = reader.header.arrays.len(),
            "archive opened"
        );
        Ok(reader)
    }

    fn verify(&self) -> Result<(), StatsError> {
        let data = self.payload.as_slice();
        let digest = format!("{:x}", Sha256::digest(data));
        if digest != self.header.payload_sha256 {
            return Err(StatsError::format(&self.path, "payload checksum mismatch"));
        }

        for entry in &self.header.arrays {
            let expected = entry
                .element_count()
                .and_then(|n| n.checked_mul(entry.dtype.size()));
            if expected != Some(entry.nbytes as usize) {
                return Err(StatsError::format(
                    &self.path,
                    format!(
                        "array '{}' has {} bytes, which does not fit shape {:?}",
                        entry.name, entry.nbytes, entry.shape
                    ),
                ));
            }
            let end = entry.offset.checked_add(entry.nbytes);
            if !matches!(end, Some(end) if end as usize <= data.len()) {
                return Err(StatsError::format(
                    &self.path,
                    format!("array '{}' extends past end of payload", entry.name),
                ));
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    fn entry(&self, name: &str, dtype: DType) -> Result<&ArrayEntry, StatsError> {
        let entry = self
            .header
            .array(name)
            .ok_or_else(|| StatsError::format(&self.path, format!("missing array '{}'", name)))?;
        if entry.dtype != dtype {
            return Err(StatsError::format(
                &self.path,
                format!("array '{}' has dtype {:?}, expected {:?}", name, entry.dtype, dtype),
            ));
        }
        Ok(entry)
    }

    fn raw(&self, entry: &ArrayEntry) -> &[u8] {
        let start = entry.offset as usize;
        &self.payload.as_slice()[start..start + entry.nbytes as usize]
    }

    /// Read an `f64` array by name, returning its shape and values.
    pub fn read_f64(&self, name: &str) -> Result<(Vec<usize>, Vec<f64>), StatsError> {
        let entry = self.entry(name, DType::F64)?;
        let values = self
            .raw(entry)
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                f64::from_le_bytes(bytes)
            })
            .collect();
        Ok((entry.shape.clone(), values))
    }

    /// Read a `u64` array by name, returning its shape and values.
    pub fn read_u64(&self, name: &str) -> Result<(Vec<usize>, Vec<u64>), StatsError> {
        let entry = self.entry(name, DType::U64)?;
        let values = self
            .raw(entry)
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                u64::from_le_bytes(bytes)
            })
            .collect();
        Ok((entry.shape.clone(), values))
    }
}
