use async_trait::async_trait;
use fidstats_core::StatsError;

use super::traits::{Embedder, EmbeddingError, ImageTensor};

/// Raw backbone output for one image, channel-major (C×H×W).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl FeatureMap {
    pub fn new(
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
    ) -> Result<Self, EmbeddingError> {
        let expected = channels * height * width;
        if expected == 0 || data.len() != expected {
            return Err(EmbeddingError::Extractor(format!(
                "feature map {}x{}x{} needs {} values, got {}",
                channels,
                height,
                width,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Collapse each channel to its spatial mean, one value per channel.
    ///
    /// A 1×1 map is returned as-is.
    pub fn global_average_pool(&self) -> Vec<f32> {
        let spatial = self.height * self.width;
        if spatial == 1 {
            return self.data.clone();
        }
        self.data
            .chunks_exact(spatial)
            .map(|plane| {
                let sum: f64 = plane.iter().map(|&v| f64::from(v)).sum();
                (sum / spatial as f64) as f32
            })
            .collect()
    }
}

/// A backbone that emits spatial feature maps rather than flat vectors.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn extract(&self, images: &[ImageTensor]) -> Result<Vec<FeatureMap>, EmbeddingError>;

    /// Channel count of every emitted map.
    fn channels(&self) -> usize;
}

/// Adapts a [`FeatureExtractor`] into an [`Embedder`] by global average
/// pooling, so every image yields exactly one `channels`-long vector.
pub struct PooledEmbedder<X> {
    extractor: X,
}

impl<X: FeatureExtractor> PooledEmbedder<X> {
    pub fn new(extractor: X) -> Self {
        Self { extractor }
    }

    pub fn into_inner(self) -> X {
        self.extractor
    }
}

#[async_trait]
impl<X: FeatureExtractor> Embedder for PooledEmbedder<X> {
    async fn embed_batch(&self, images: &[ImageTensor]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let maps = self.extractor.extract(images).await?;
        if maps.len() != images.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: images.len(),
                got: maps.len(),
            });
        }

        let channels = self.extractor.channels();
        maps.iter()
            .map(|map| {
                if map.channels() != channels {
                    return Err(EmbeddingError::from(StatsError::DimensionMismatch {
                        expected: channels,
                        got: map.channels(),
                    }));
                }
                Ok(map.global_average_pool())
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.extractor.channels()
    }
}
