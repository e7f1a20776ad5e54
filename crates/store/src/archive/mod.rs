//! Self-describing array archive.
//!
//! ```text
//! magic      8 bytes   b"FIDSTAT\x01"
//! header_len u32 LE
//! header     JSON ArchiveHeader
//! payload    little-endian array bytes (optionally one zstd frame)
//! ```
//!
//! Array offsets in the header index into the uncompressed payload. The
//! SHA-256 of the uncompressed payload is stored in the header and checked
//! on open.

pub mod reader;
pub mod writer;

use chrono::{DateTime, Utc};
use fidstats_core::config::Compression;
use serde::{Deserialize, Serialize};

pub use reader::ArchiveReader;
pub use writer::ArchiveWriter;

pub const MAGIC: &[u8; 8] = b"FIDSTAT\x01";
pub const FORMAT_VERSION: u32 = 1;

/// Bytes before the JSON header: magic + header length.
pub(crate) const PREAMBLE_LEN: usize = MAGIC.len() + 4;

/// What an archive holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Finalized `mu` / `sigma`.
    Statistics,
    /// Partial accumulator state: `count`, `mean`, `m2_upper`.
    Accumulator,
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveKind::Statistics => f.write_str("statistics"),
            ArchiveKind::Accumulator => f.write_str("accumulator"),
        }
    }
}

/// Element type, named with numpy-style type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "<f8")]
    F64,
    #[serde(rename = "<u8")]
    U64,
}

impl DType {
    pub fn size(self) -> usize {
        match self {
            DType::F64 | DType::U64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<usize>,
    /// Byte offset into the uncompressed payload.
    pub offset: u64,
    pub nbytes: u64,
}

impl ArrayEntry {
    /// Number of elements implied by `shape`, `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub version: u32,
    pub kind: ArchiveKind,
    pub created_at: DateTime<Utc>,
    pub compression: Compression,
    pub payload_sha256: String,
    pub arrays: Vec<ArrayEntry>,
}

impl ArchiveHeader {
    pub fn array(&self, name: &str) -> Option<&ArrayEntry> {
        self.arrays.iter().find(|a| a.name == name)
    }
}
