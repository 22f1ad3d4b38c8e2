//! Precomputed cube analytics.
//!
//! Analytics are produced by offline jobs and read back as one opaque
//! JSON document per cube, so they live in the blob store next to the
//! card lists, addressed by cube id.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use tracing::debug;

use cubedb_core::config::BlobConfig;
use cubedb_core::error::{Error, Result};
use cubedb_core::traits::BlobStore;

/// Analytics persistence in the blob store.
pub struct AnalyticsStorage {
    blobs: Arc<dyn BlobStore>,
    config: BlobConfig,
}

impl AnalyticsStorage {
    pub fn new(blobs: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self { blobs, config }
    }

    fn blob_key(cube_id: &str) -> String {
        format!("cube_analytic/{cube_id}.json")
    }

    /// Fetch a cube's analytics. A cube that has none reads as an empty
    /// object, not an error.
    pub async fn get(&self, cube_id: &str) -> Result<serde_json::Value> {
        match self
            .blobs
            .get(&self.config.bucket, &Self::blob_key(cube_id))
            .await
        {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Serialization {
                message: format!("analytics blob for cube {cube_id}: {e}"),
            }),
            Err(Error::BlobNotFound { .. }) => {
                debug!(cube_id, "no analytics blob, returning empty object");
                Ok(serde_json::Value::Object(serde_json::Map::new()))
            }
            Err(error) => Err(error),
        }
    }

    pub async fn put(&self, cube_id: &str, analytics: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_vec(analytics)?;
        self.blobs
            .put(
                &self.config.bucket,
                &Self::blob_key(cube_id),
                Bytes::from(payload),
            )
            .await
    }

    /// Write many cubes' analytics concurrently; the recompute job calls
    /// this once per processed batch.
    pub async fn batch_put(&self, entries: &[(String, serde_json::Value)]) -> Result<()> {
        try_join_all(
            entries
                .iter()
                .map(|(cube_id, analytics)| self.put(cube_id, analytics)),
        )
        .await?;
        Ok(())
    }

    /// Delete a cube's analytics. Deleting absent analytics is not an
    /// error.
    pub async fn delete(&self, cube_id: &str) -> Result<()> {
        self.blobs
            .delete(&self.config.bucket, &Self::blob_key(cube_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubedb_store::MemoryBlobStore;
    use serde_json::json;

    fn storage() -> (Arc<MemoryBlobStore>, AnalyticsStorage) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let storage = AnalyticsStorage::new(blobs.clone(), BlobConfig::default());
        (blobs, storage)
    }

    #[tokio::test]
    async fn missing_analytics_read_as_an_empty_object() {
        let (_, storage) = storage();
        assert_eq!(storage.get("nope").await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn analytics_round_trip_under_their_own_key() {
        let (blobs, storage) = storage();
        let analytics = json!({ "elo": { "black-lotus": 1780 }, "picks": 42 });
        storage.put("abc", &analytics).await.unwrap();

        assert!(blobs.contains("cubedb-data", "cube_analytic/abc.json"));
        assert_eq!(storage.get("abc").await.unwrap(), analytics);

        storage.delete("abc").await.unwrap();
        assert_eq!(storage.get("abc").await.unwrap(), json!({}));
        // A second delete is a no-op.
        storage.delete("abc").await.unwrap();
    }

    #[tokio::test]
    async fn batch_put_writes_every_entry() {
        let (_, storage) = storage();
        let entries: Vec<(String, serde_json::Value)> = (0..3)
            .map(|i| (format!("c{i}"), json!({ "picks": i })))
            .collect();
        storage.batch_put(&entries).await.unwrap();

        for (cube_id, analytics) in &entries {
            assert_eq!(&storage.get(cube_id).await.unwrap(), analytics);
        }
    }
}
