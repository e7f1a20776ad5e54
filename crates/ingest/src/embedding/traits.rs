use std::path::PathBuf;

use async_trait::async_trait;
use fidstats_core::StatsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Extractor failed: {0}")]
    Extractor(String),

    #[error("Embedder returned {got} vectors for {expected} images")]
    CountMismatch { expected: usize, got: usize },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Shard error in {}: {reason}", path.display())]
    Shard { path: PathBuf, reason: String },

    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// One decoded, resized and normalized RGB image, laid out H×W×3.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn new(height: usize, width: usize, data: Vec<f32>) -> Result<Self, EmbeddingError> {
        if height == 0 || width == 0 {
            return Err(EmbeddingError::InvalidImage(format!(
                "empty image {}x{}",
                height, width
            )));
        }
        let expected = height * width * 3;
        if data.len() != expected {
            return Err(EmbeddingError::InvalidImage(format!(
                "{}x{}x3 image needs {} values, got {}",
                height,
                width,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Trait for embedding backends (a pretrained CNN behind an inference
/// runtime, a remote service, ...).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of images, returning one vector per input image (in order).
    async fn embed_batch(&self, images: &[ImageTensor]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The dimensionality of the output vectors. Fixed for the embedder's lifetime.
    fn dimensions(&self) -> usize;
}
