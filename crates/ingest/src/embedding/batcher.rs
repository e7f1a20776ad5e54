use std::sync::Arc;

use fidstats_compute::MomentAccumulator;
use fidstats_core::StatsError;
use tracing::debug;

use super::traits::{Embedder, EmbeddingError, ImageTensor};

/// Collects images, embeds them in batches, and folds the embeddings into a
/// [`MomentAccumulator`] as each batch completes.
///
/// Only the current batch of images is held in memory; embeddings are
/// dropped once folded.
pub struct AccumulatingBatcher {
    buffer: Vec<ImageTensor>,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
    accumulator: MomentAccumulator,
    batches_flushed: usize,
}

impl AccumulatingBatcher {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self, EmbeddingError> {
        let accumulator = MomentAccumulator::new(embedder.dimensions())?;
        Self::with_accumulator(embedder, batch_size, accumulator)
    }

    /// Resume folding into an existing accumulator (e.g. loaded from disk).
    pub fn with_accumulator(
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        accumulator: MomentAccumulator,
    ) -> Result<Self, EmbeddingError> {
        if embedder.dimensions() != accumulator.dim() {
            return Err(StatsError::DimensionMismatch {
                expected: accumulator.dim(),
                got: embedder.dimensions(),
            }
            .into());
        }
        let batch_size = batch_size.max(1);
        Ok(Self {
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            embedder,
            accumulator,
            batches_flushed: 0,
        })
    }

    /// Add an image to the batch. Returns the number of vectors folded if a
    /// full batch was flushed.
    ///
    /// A batch left full by an earlier failed flush is retried first, so the
    /// embedder never sees more than `batch_size` images. If that retry fails
    /// the new image is not buffered.
    pub async fn add(&mut self, image: ImageTensor) -> Result<Option<usize>, EmbeddingError> {
        let mut folded = None;
        if self.buffer.len() >= self.batch_size {
            folded = Some(self.flush().await?);
        }
        self.buffer.push(image);
        if self.buffer.len() >= self.batch_size {
            let flushed = self.flush().await?;
            folded = Some(folded.unwrap_or(0) + flushed);
        }
        Ok(folded)
    }

    /// Embed and fold whatever is buffered.
    ///
    /// The buffer is only cleared once the batch has been folded, so a failed
    /// flush can be retried without losing or double-counting images.
    pub async fn flush(&mut self) -> Result<usize, EmbeddingError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let embeddings = self.embedder.embed_batch(&self.buffer).await?;
        if embeddings.len() != self.buffer.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: self.buffer.len(),
                got: embeddings.len(),
            });
        }
        self.accumulator.update_f32(&embeddings)?;

        let folded = self.buffer.len();
        self.buffer.clear();
        self.batches_flushed += 1;
        debug!(
            batch = self.batches_flushed,
            vectors = folded,
            total = self.accumulator.count(),
            "embedding batch folded"
        );
        Ok(folded)
    }

    /// Number of images currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn accumulator(&self) -> &MomentAccumulator {
        &self.accumulator
    }

    /// Flush the remainder and hand back the accumulated state.
    pub async fn finish(mut self) -> Result<MomentAccumulator, EmbeddingError> {
        self.flush().await?;
        Ok(self.accumulator)
    }
}
