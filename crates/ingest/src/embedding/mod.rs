pub mod batcher;
pub mod pooling;
pub mod traits;

pub use batcher::AccumulatingBatcher;
pub use pooling::{FeatureExtractor, FeatureMap, PooledEmbedder};
pub use traits::{Embedder, EmbeddingError, ImageTensor};
