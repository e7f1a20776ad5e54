pub mod embedding;
pub mod shard;

pub use embedding::{
    AccumulatingBatcher, Embedder, EmbeddingError, FeatureExtractor, FeatureMap, ImageTensor,
    PooledEmbedder,
};
pub use shard::{accumulate_shard, discover_shards, ShardFormat, ShardReader, ShardWriter};
