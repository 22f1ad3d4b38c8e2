//! The cube DAO surface.
//!
//! Composes the generic entity layer, the hash index, and the blob
//! payloads (cards, analytics) into the operations callers actually
//! use. Metadata writes go through optimistic locking; the hash rows
//! and the blobs follow the metadata write and are eventually
//! consistent with it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::info;

use cubedb_core::config::{BatchConfig, BlobConfig, SearchConfig, StoreConfig, MAX_BATCH_GET};
use cubedb_core::error::{Error, Result};
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::{BlobStore, StoreClient};
use cubedb_core::types::{
    IndexKey, LastKey, QueryRequest, RangeFilter, RowKey, SecondaryIndex, SortOrder, SortRange,
};
use cubedb_core::{new_id, now_ms};
use cubedb_index::{search_hash, Criterion, HashIndexEngine, IndexDiff, SearchCoordinator};
use cubedb_store::{BatchWriter, EntityStore};

use crate::analytics::AnalyticsStorage;
use crate::cards::{CardStorage, CubeCards};
use crate::cube::{cube_pk, Cube, CubeCodec, Visibility, CUBE_ITEM_TYPE};
use crate::user::UserStore;

/// Configuration bundle for a [`CubeStore`].
#[derive(Debug, Clone, Default)]
pub struct CubeConfig {
    pub store: StoreConfig,
    pub batch: BatchConfig,
    pub blob: BlobConfig,
    pub search: SearchConfig,
}

/// Cube persistence, indexing, and search.
pub struct CubeStore {
    entities: Arc<EntityStore<CubeCodec>>,
    engine: HashIndexEngine,
    coordinator: SearchCoordinator<CubeCodec>,
    cards: CardStorage,
    analytics: AnalyticsStorage,
}

impl CubeStore {
    pub fn new(
        client: Arc<dyn StoreClient>,
        blobs: Arc<dyn BlobStore>,
        users: Arc<UserStore>,
        config: CubeConfig,
        metrics: Metrics,
    ) -> Self {
        let entities = Arc::new(EntityStore::new(
            client.clone(),
            CubeCodec::new(users),
            config.store,
            metrics.clone(),
        ));
        let writer = Arc::new(BatchWriter::new(client, config.batch, metrics.clone()));
        let engine = HashIndexEngine::new(writer, metrics.clone());
        let coordinator = SearchCoordinator::new(entities.clone(), config.search, metrics);
        let cards = CardStorage::new(blobs.clone(), config.blob.clone());
        let analytics = AnalyticsStorage::new(blobs, config.blob);
        Self {
            entities,
            engine,
            coordinator,
            cards,
            analytics,
        }
    }

    fn key(id: &str) -> RowKey {
        RowKey::new(cube_pk(id), CUBE_ITEM_TYPE)
    }

    fn criterion_hash(criterion: &Criterion) -> String {
        search_hash(CUBE_ITEM_TYPE, std::slice::from_ref(criterion))
    }

    /// Fetch by full id, falling back to short-id lookup through the
    /// hash index when no row matches.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Cube>> {
        if let Some(cube) = self.entities.get_opt(&Self::key(id)).await? {
            return Ok(Some(cube));
        }

        let hash = Self::criterion_hash(&Criterion::new("shortid", id.to_lowercase()));
        let output = self
            .entities
            .query_raw(QueryRequest::partition(hash).with_limit(1))
            .await?;
        match output.rows.first() {
            // The hash row's sort key is the owning cube's partition key.
            Some(row) => {
                self.entities
                    .get_opt(&self.entities.key_for_partition(&row.key.sk))
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn batch_get(&self, ids: &[String]) -> Result<Vec<Cube>> {
        let keys: Vec<RowKey> = ids.iter().map(|id| Self::key(id)).collect();
        self.entities.batch_get(&keys).await
    }

    /// Create a cube: metadata row, cards blob, and all hash rows.
    ///
    /// An absent id gets a fresh one; timestamps are stamped here. The
    /// returned cube carries everything that was assigned.
    pub async fn put_new_cube(&self, mut cube: Cube, cards: &CubeCards) -> Result<Cube> {
        if cube.id.is_empty() {
            cube.id = new_id();
        }
        let now = now_ms();
        if cube.date_created == 0 {
            cube.date_created = now;
        }
        cube.date_last_updated = now;
        cube.card_count = cards.card_count();

        self.entities.put_new(&cube).await?;
        self.cards.put(&cube.id, cards).await?;
        self.engine
            .insert(&cube.partition_key(), &cube.search_doc_with_cards(cards))
            .await?;
        info!(cube_id = %cube.id, "cube created");
        Ok(cube)
    }

    /// Optimistically-locked metadata update with incremental index
    /// maintenance.
    ///
    /// Hash rows are touched only for criteria that changed; retained
    /// rows are rewritten when a sort attribute changed (the update
    /// timestamp always does, here). A stale `expected_version` surfaces
    /// as `Conflict`; an absent cube as `NotFound`, letting the caller
    /// fall back to [`put_new_cube`](Self::put_new_cube).
    pub async fn update(&self, cube: &mut Cube, expected_version: Option<u64>) -> Result<()> {
        let old = self.entities.get(&Self::key(&cube.id)).await?;
        let cards = self.cards.get(&cube.id).await?;
        cube.date_last_updated = now_ms();

        // The boards are unchanged here, but their criteria still belong
        // to both documents so retained card rows pick up sort refreshes.
        let new_doc = cube.search_doc_with_cards(&cards);
        let diff = HashIndexEngine::diff(&old.search_doc_with_cards(&cards), &new_doc);
        self.entities.update(cube, expected_version).await?;
        self.engine
            .apply(&cube.partition_key(), &diff, &new_doc.sort)
            .await
    }

    /// Replace a cube's boards: blob write, the metadata refresh the
    /// changed card count implies, and the card-membership row delta.
    pub async fn update_cards(&self, id: &str, cards: &CubeCards) -> Result<Cube> {
        let mut cube = self
            .entities
            .get_opt(&Self::key(id))
            .await?
            .ok_or_else(|| Error::not_found(&Self::key(id)))?;

        // The outgoing boards must be read before the blob is replaced.
        let old_cards = self.cards.get(id).await?;
        let old_doc = cube.search_doc_with_cards(&old_cards);

        self.cards.put(id, cards).await?;

        cube.card_count = cards.card_count();
        cube.date_last_updated = now_ms();
        let new_doc = cube.search_doc_with_cards(cards);
        let diff = HashIndexEngine::diff(&old_doc, &new_doc);

        self.entities.update(&cube, None).await?;
        self.engine
            .apply(&cube.partition_key(), &diff, &new_doc.sort)
            .await?;
        Ok(cube)
    }

    pub async fn get_cards(&self, id: &str) -> Result<CubeCards> {
        self.cards.get(id).await
    }

    /// A cube's precomputed analytics; an empty object when none exist.
    pub async fn get_analytics(&self, id: &str) -> Result<serde_json::Value> {
        self.analytics.get(id).await
    }

    pub async fn put_analytics(&self, id: &str, analytics: &serde_json::Value) -> Result<()> {
        self.analytics.put(id, analytics).await
    }

    pub async fn batch_put_analytics(
        &self,
        entries: &[(String, serde_json::Value)],
    ) -> Result<()> {
        self.analytics.batch_put(entries).await
    }

    pub async fn delete_analytics(&self, id: &str) -> Result<()> {
        self.analytics.delete(id).await
    }

    /// Remove the cube entirely: hash rows, metadata row, cards blob,
    /// and analytics blob.
    pub async fn delete_by_id(&self, id: &str) -> Result<()> {
        let key = Self::key(id);
        let cube = self
            .entities
            .get_opt(&key)
            .await?
            .ok_or_else(|| Error::not_found(&key))?;
        let cards = self.cards.get(id).await?;

        self.engine
            .remove(&cube.partition_key(), &cube.search_doc_with_cards(&cards))
            .await?;
        self.entities.delete_key(&key).await?;
        self.cards.delete(id).await?;
        self.analytics.delete(id).await?;
        info!(cube_id = id, "cube deleted");
        Ok(())
    }

    /// Rebuild a cube's hash rows in place.
    ///
    /// Recomputes the expected document from the metadata row and the
    /// cards blob, fetches which expected rows already exist, and writes
    /// the delta: rows that are missing plus rows whose embedded sort
    /// keys went stale. Hash rows are partitioned by hash, so rows under
    /// criteria the cube no longer matches cannot be enumerated here;
    /// those are retired by the update paths that observe the change.
    pub async fn repair_index(&self, id: &str) -> Result<IndexDiff> {
        let key = Self::key(id);
        let cube = self
            .entities
            .get_opt(&key)
            .await?
            .ok_or_else(|| Error::not_found(&key))?;
        let cards = self.cards.get(id).await?;

        let doc = cube.search_doc_with_cards(&cards);
        let entity_pk = cube.partition_key();
        let expected = doc.hashes();

        let keys: Vec<RowKey> = expected
            .iter()
            .map(|hash| RowKey::new(hash.clone(), entity_pk.clone()))
            .collect();
        let chunks: Vec<Vec<RowKey>> = keys
            .chunks(MAX_BATCH_GET)
            .map(|chunk| chunk.to_vec())
            .collect();
        let fetched = try_join_all(chunks.into_iter().map(|chunk| {
            let client = Arc::clone(self.entities.client());
            async move { client.batch_get(&chunk).await }
        }))
        .await?;
        let current: HashMap<String, [Option<IndexKey>; 4]> = fetched
            .into_iter()
            .flatten()
            .map(|row| (row.key.pk, row.gsi))
            .collect();

        let mut diff = IndexDiff::default();
        for hash in &expected {
            match current.get(hash) {
                None => {
                    diff.added.insert(hash.clone());
                }
                Some(gsi) => {
                    let fresh = HashIndexEngine::hash_row(hash, &entity_pk, &doc.sort);
                    if *gsi != fresh.gsi {
                        diff.refreshed.insert(hash.clone());
                    }
                }
            }
        }

        self.engine.apply(&entity_pk, &diff, &doc.sort).await?;
        if !diff.is_empty() {
            info!(
                cube_id = id,
                restored = diff.added.len(),
                refreshed = diff.refreshed.len(),
                "repaired hash index rows"
            );
        }
        Ok(diff)
    }

    /// A user's cubes, by last-update date.
    pub async fn query_by_owner(
        &self,
        owner_id: &str,
        ascending: bool,
        last_key: Option<LastKey>,
    ) -> Result<(Vec<Cube>, Option<LastKey>)> {
        self.entities
            .query(
                QueryRequest::index(SecondaryIndex::Gsi1, format!("CUBE#OWNER#{owner_id}"))
                    .forward(ascending)
                    .with_start_key(last_key),
            )
            .await
    }

    /// Cubes of one visibility, newest first, optionally only those
    /// updated strictly before `before` (epoch milliseconds). This is
    /// the plain-scan path used when no search criteria are given.
    pub async fn query_by_visibility(
        &self,
        visibility: Visibility,
        before: Option<u64>,
        last_key: Option<LastKey>,
    ) -> Result<(Vec<Cube>, Option<LastKey>)> {
        let mut request = QueryRequest::index(
            SecondaryIndex::Gsi2,
            format!("CUBE#VIS#{}", visibility.code()),
        )
        .descending()
        .with_start_key(last_key);
        if let Some(before) = before {
            request = request.with_range(SortRange::Lt(format!("DATE#{before:015}")));
        }
        self.entities.query(request).await
    }

    /// One shard of the scan-all index, ordered by cube id.
    pub async fn query_shard(
        &self,
        shard: u64,
        last_key: Option<LastKey>,
    ) -> Result<(Vec<Cube>, Option<LastKey>)> {
        self.entities
            .query(
                QueryRequest::index(SecondaryIndex::Gsi3, format!("CUBE#SHARD#{shard}"))
                    .with_start_key(last_key),
            )
            .await
    }

    pub async fn query_by_tag(
        &self,
        tag: &str,
        sort_by: SortOrder,
        ascending: bool,
    ) -> Result<Vec<Cube>> {
        self.search(
            &[Criterion::new("tag", tag.to_lowercase())],
            sort_by,
            ascending,
            None,
        )
        .await
    }

    pub async fn query_by_keyword(
        &self,
        phrase: &str,
        sort_by: SortOrder,
        ascending: bool,
    ) -> Result<Vec<Cube>> {
        self.search(
            &[Criterion::new(
                "keywords",
                cubedb_index::normalize_phrase(phrase),
            )],
            sort_by,
            ascending,
            None,
        )
        .await
    }

    /// Cubes whose mainboard contains the card.
    pub async fn query_by_card(
        &self,
        card_id: &str,
        sort_by: SortOrder,
        ascending: bool,
    ) -> Result<Vec<Cube>> {
        self.search(
            &[Criterion::new("card", card_id.to_lowercase())],
            sort_by,
            ascending,
            None,
        )
        .await
    }

    pub async fn query_by_category(
        &self,
        category: &str,
        sort_by: SortOrder,
        ascending: bool,
    ) -> Result<Vec<Cube>> {
        self.search(
            &[Criterion::new("category", category.to_lowercase())],
            sort_by,
            ascending,
            None,
        )
        .await
    }

    pub async fn query_featured(&self, sort_by: SortOrder, ascending: bool) -> Result<Vec<Cube>> {
        self.search(&[Criterion::new("featured", "true")], sort_by, ascending, None)
            .await
    }

    pub async fn query_all(&self, sort_by: SortOrder, ascending: bool) -> Result<Vec<Cube>> {
        self.search(&[Criterion::new("cube", "all")], sort_by, ascending, None)
            .await
    }

    /// Multi-criteria search: the conjunction of every criterion, with
    /// an optional card-count range filter.
    ///
    /// An empty criteria set is not a hash search at all; it routes to
    /// the public-visibility scan and returns its first page.
    pub async fn search(
        &self,
        criteria: &[Criterion],
        sort_by: SortOrder,
        ascending: bool,
        range_filter: Option<RangeFilter>,
    ) -> Result<Vec<Cube>> {
        if criteria.is_empty() {
            let (cubes, _) = self
                .query_by_visibility(Visibility::Public, None, None)
                .await?;
            return Ok(cubes);
        }

        let hashes: Vec<String> = criteria.iter().map(Self::criterion_hash).collect();
        self.coordinator
            .search(&hashes, sort_by, ascending, range_filter)
            .await
    }
}
