//! Generic entity persistence: the hydration base.
//!
//! One [`EntityStore`] instance exclusively owns the physical rows of its
//! entity type. Behavior specific to the entity (payload translation,
//! reference resolution, key derivation) comes from the injected codec
//! and key spec; this engine never branches on entity type.
//!
//! Concurrency model: the physical row is the unit of mutual exclusion.
//! Updates are version-checked conditional writes; a stale read produces
//! `Conflict` rather than a silent overwrite, and the caller retries from
//! a fresh read.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use cubedb_core::config::StoreConfig;
use cubedb_core::error::{Error, Result};
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::{EntityCodec, KeySpec, StoreClient};
use cubedb_core::types::{LastKey, PutCondition, QueryOutput, QueryRequest, Row, RowKey};

/// Generic CRUD over one entity type, with hydration and optimistic
/// locking.
pub struct EntityStore<C>
where
    C: EntityCodec + KeySpec<Entity = <C as EntityCodec>::Hydrated>,
{
    store: Arc<dyn StoreClient>,
    codec: C,
    config: StoreConfig,
    metrics: Metrics,
}

impl<C> EntityStore<C>
where
    C: EntityCodec + KeySpec<Entity = <C as EntityCodec>::Hydrated>,
{
    pub fn new(store: Arc<dyn StoreClient>, codec: C, config: StoreConfig, metrics: Metrics) -> Self {
        Self {
            store,
            codec,
            config,
            metrics,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn client(&self) -> &Arc<dyn StoreClient> {
        &self.store
    }

    /// Base-table key of an entity.
    pub fn key_for(&self, entity: &C::Hydrated) -> RowKey {
        RowKey::new(self.codec.partition_key(entity), self.codec.sort_key(entity))
    }

    /// Base-table key of the entity row owning `partition_key`.
    pub fn key_for_partition(&self, partition_key: &str) -> RowKey {
        self.codec.key_for_partition(partition_key)
    }

    /// Row Codec projection: keys, GSI keys, initial version, dehydrated
    /// payload. Pure; no I/O.
    pub fn to_row(&self, entity: &C::Hydrated) -> Result<Row> {
        let stored = self.codec.dehydrate(entity);
        let mut row = Row::new(self.key_for(entity), serde_json::to_value(&stored)?);
        row.gsi = self.codec.gsi_keys(entity);
        Ok(row)
    }

    fn decode(&self, row: Row) -> Result<<C as EntityCodec>::Stored> {
        serde_json::from_value(row.item).map_err(|e| Error::Serialization {
            message: format!("{} row {}: {e}", self.codec.item_type(), row.key),
        })
    }

    /// Point read. `NotFound` when the row is absent.
    pub async fn get(&self, key: &RowKey) -> Result<C::Hydrated> {
        self.get_opt(key)
            .await?
            .ok_or_else(|| Error::not_found(key))
    }

    /// Point read returning `None` for an absent row.
    pub async fn get_opt(&self, key: &RowKey) -> Result<Option<C::Hydrated>> {
        self.metrics.record_store_read();
        let row = self
            .store
            .get(key)
            .await
            .map_err(|e| with_key_context(e, "get", key))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let stored = self.decode(row)?;
                Ok(Some(self.codec.hydrate(stored).await?))
            }
        }
    }

    /// Version of the stored row, or `None` when absent.
    pub async fn current_version(&self, key: &RowKey) -> Result<Option<u64>> {
        self.metrics.record_store_read();
        let row = self
            .store
            .get(key)
            .await
            .map_err(|e| with_key_context(e, "get", key))?;
        Ok(row.map(|r| r.version))
    }

    /// Create the entity row. Fails with `AlreadyExists` when the key is
    /// taken.
    pub async fn put_new(&self, entity: &C::Hydrated) -> Result<()> {
        let row = self.to_row(entity)?;
        self.metrics.record_store_write();
        self.store.put(row, PutCondition::NotExists).await
    }

    /// Optimistically-locked replace.
    ///
    /// When `expected_version` is `None`, the current version is read
    /// first. The write requires "row exists AND version == expected" and
    /// sets `version = expected + 1`; a mismatch surfaces as `Conflict`,
    /// an absent row as `NotFound`; the caller is expected to fall back
    /// to [`put_new`](Self::put_new) in the latter case.
    pub async fn update(&self, entity: &C::Hydrated, expected_version: Option<u64>) -> Result<()> {
        let key = self.key_for(entity);
        let expected = match expected_version {
            Some(version) => version,
            None => self
                .current_version(&key)
                .await?
                .ok_or_else(|| Error::not_found(&key))?,
        };

        let mut row = self.to_row(entity)?;
        row.version = expected + 1;
        self.metrics.record_store_write();
        self.store.put(row, PutCondition::VersionIs(expected)).await
    }

    /// Unconditional delete by the entity's key.
    pub async fn delete(&self, entity: &C::Hydrated) -> Result<()> {
        self.delete_key(&self.key_for(entity)).await
    }

    /// Unconditional delete by key.
    pub async fn delete_key(&self, key: &RowKey) -> Result<()> {
        self.metrics.record_store_write();
        self.store
            .delete(key)
            .await
            .map_err(|e| with_key_context(e, "delete", key))
    }

    /// Query one partition (base table or GSI), decode and batch-hydrate
    /// the page.
    pub async fn query(
        &self,
        request: QueryRequest,
    ) -> Result<(Vec<C::Hydrated>, Option<LastKey>)> {
        let output = self.query_raw(request).await?;
        let stored = output
            .rows
            .into_iter()
            .map(|row| self.decode(row))
            .collect::<Result<Vec<_>>>()?;
        let hydrated = self.codec.hydrate_batch(stored).await?;
        Ok((hydrated, output.last_key))
    }

    /// Query without decoding or hydration. Used by index scans that only
    /// need key material.
    pub async fn query_raw(&self, request: QueryRequest) -> Result<QueryOutput> {
        self.metrics.record_store_query();
        self.store.query(request).await
    }

    /// Batched point reads.
    ///
    /// Keys are deduplicated, reads are chunked under the store's batch
    /// limit and issued concurrently, and the whole result set is hydrated
    /// with one batched auxiliary fetch. Missing items are silently
    /// omitted; the returned order follows the (deduplicated) input keys.
    pub async fn batch_get(&self, keys: &[RowKey]) -> Result<Vec<C::Hydrated>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashMap::new();
        let mut unique: Vec<RowKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.insert(key.clone(), ()).is_none() {
                unique.push(key.clone());
            }
        }
        debug!(
            item_type = self.codec.item_type(),
            requested = keys.len(),
            unique = unique.len(),
            "batch get"
        );

        let chunks: Vec<Vec<RowKey>> = unique
            .chunks(self.config.batch_get_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        let fetched = try_join_all(chunks.into_iter().map(|chunk| {
            let store = Arc::clone(&self.store);
            async move { store.batch_get(&chunk).await }
        }))
        .await?;
        self.metrics.record_store_read();

        // The store returns rows in unspecified order; restore input order.
        let mut by_key: HashMap<RowKey, <C as EntityCodec>::Stored> = HashMap::new();
        for row in fetched.into_iter().flatten() {
            let key = row.key.clone();
            by_key.insert(key, self.decode(row)?);
        }
        let stored: Vec<_> = unique
            .iter()
            .filter_map(|key| by_key.remove(key))
            .collect();

        self.codec.hydrate_batch(stored).await
    }
}

/// Attach the failing operation and key to store-level errors so callers
/// can log something actionable.
fn with_key_context(error: Error, operation: &str, key: &RowKey) -> Error {
    match error {
        Error::TransientStore { message, .. } => Error::TransientStore {
            operation: operation.to_string(),
            message: format!("{key}: {message}"),
        },
        Error::FatalStore { message, .. } => Error::FatalStore {
            operation: operation.to_string(),
            message: format!("{key}: {message}"),
        },
        other => other,
    }
}
