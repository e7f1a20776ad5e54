pub mod archive;
pub mod stats_store;

// Re-export key types
pub use archive::{ArchiveHeader, ArchiveKind, ArchiveReader, ArchiveWriter, ArrayEntry, DType};
pub use stats_store::{ArchiveSummary, StatsStore};
