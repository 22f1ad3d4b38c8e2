//! Resilient batch writes.
//!
//! The store accepts at most 25 items per batch call and its batch
//! primitive has no conditional form, so batch writes bypass optimistic
//! locking entirely; callers that need conflict detection must go
//! through the single-item update path instead.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use cubedb_core::config::BatchConfig;
use cubedb_core::error::{Error, Result};
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::{StoreClient, Writer};
use cubedb_core::types::WriteRequest;

/// Chunks write sets under the store's batch limit, retries transient
/// connection failures with exponential backoff, and fails fast on the
/// first chunk that cannot be written.
pub struct BatchWriter {
    store: Arc<dyn StoreClient>,
    config: BatchConfig,
    metrics: Metrics,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn StoreClient>, config: BatchConfig, metrics: Metrics) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Write all items, chunked.
    ///
    /// Per chunk: up to `max_attempts` tries, backing off 1s/2s/4s on the
    /// transient connection-error class only. A chunk that cannot be
    /// written raises `BatchWrite` carrying the chunk index and size;
    /// subsequent chunks are not attempted. Earlier chunks stay written;
    /// there is no rollback, the caller infers completion from the index.
    pub async fn batch_write(&self, writes: Vec<WriteRequest>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let chunks: Vec<&[WriteRequest]> = writes.chunks(self.config.chunk_size).collect();
        let chunk_count = chunks.len();

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            self.write_chunk(chunk_index, chunk).await?;
            self.metrics.record_batch_chunk();

            if !self.config.inter_chunk_delay.is_zero() && chunk_index + 1 < chunk_count {
                sleep(self.config.inter_chunk_delay).await;
            }
        }

        Ok(())
    }

    async fn write_chunk(&self, chunk_index: usize, chunk: &[WriteRequest]) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.store.batch_write(chunk.to_vec()).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt + 1 < self.config.max_attempts => {
                    let backoff = self.config.base_backoff * 2u32.pow(attempt);
                    attempt += 1;
                    self.metrics.record_batch_retry();
                    warn!(
                        chunk_index,
                        chunk_size = chunk.len(),
                        attempt,
                        max_attempts = self.config.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        %error,
                        "transient batch write failure, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(error) => {
                    return Err(Error::BatchWrite {
                        chunk_index,
                        chunk_size: chunk.len(),
                        source: Box::new(error),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Writer for BatchWriter {
    async fn write(&self, writes: Vec<WriteRequest>) -> Result<()> {
        self.batch_write(writes).await
    }
}
