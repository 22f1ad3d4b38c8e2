//! Entity store integration tests over the in-memory store client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cubedb_core::config::StoreConfig;
use cubedb_core::error::{Error, Result};
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::{EntityCodec, KeySpec};
use cubedb_core::types::{IndexKey, QueryRequest, RowKey, SecondaryIndex};
use cubedb_store::{EntityStore, MemoryStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    id: String,
    author: String,
    body: String,
    updated_at: u64,
}

struct NoteCodec;

#[async_trait]
impl EntityCodec for NoteCodec {
    type Hydrated = Note;
    type Stored = Note;

    fn item_type(&self) -> &'static str {
        "NOTE"
    }

    fn dehydrate(&self, entity: &Note) -> Note {
        entity.clone()
    }

    async fn hydrate_batch(&self, stored: Vec<Note>) -> Result<Vec<Note>> {
        Ok(stored)
    }
}

impl KeySpec for NoteCodec {
    type Entity = Note;

    fn partition_key(&self, note: &Note) -> String {
        format!("NOTE#{}", note.id)
    }

    fn sort_key(&self, _note: &Note) -> String {
        "NOTE".to_string()
    }

    fn gsi_keys(&self, note: &Note) -> [Option<IndexKey>; 4] {
        [
            Some(IndexKey::new(
                format!("NOTE#AUTHOR#{}", note.author),
                format!("DATE#{:015}", note.updated_at),
            )),
            None,
            None,
            None,
        ]
    }
}

fn note(id: &str, author: &str, updated_at: u64) -> Note {
    Note {
        id: id.to_string(),
        author: author.to_string(),
        body: format!("body of {id}"),
        updated_at,
    }
}

fn new_store() -> (Arc<MemoryStore>, EntityStore<NoteCodec>) {
    let client = Arc::new(MemoryStore::new());
    let store = EntityStore::new(
        client.clone(),
        NoteCodec,
        StoreConfig::default(),
        Metrics::new(),
    );
    (client, store)
}

#[tokio::test]
async fn put_new_then_get_roundtrips() {
    let (_, store) = new_store();
    let n = note("1", "ada", 100);

    store.put_new(&n).await.unwrap();
    let key = store.key_for(&n);
    let loaded = store.get(&key).await.unwrap();
    assert_eq!(loaded, n);

    // Creating again collides.
    let err = store.put_new(&n).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let (_, store) = new_store();
    let key = RowKey::new("NOTE#nope", "NOTE");
    assert!(matches!(
        store.get(&key).await.unwrap_err(),
        Error::NotFound { .. }
    ));
    assert!(store.get_opt(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn update_increments_version_by_one() {
    let (_, store) = new_store();
    let mut n = note("1", "ada", 100);
    store.put_new(&n).await.unwrap();
    let key = store.key_for(&n);
    assert_eq!(store.current_version(&key).await.unwrap(), Some(1));

    n.body = "edited".into();
    store.update(&n, None).await.unwrap();
    assert_eq!(store.current_version(&key).await.unwrap(), Some(2));

    n.body = "edited again".into();
    store.update(&n, Some(2)).await.unwrap();
    assert_eq!(store.current_version(&key).await.unwrap(), Some(3));
}

#[tokio::test]
async fn stale_version_conflicts_and_leaves_row_unchanged() {
    let (_, store) = new_store();
    let mut n = note("1", "ada", 100);
    store.put_new(&n).await.unwrap();

    n.body = "first writer".into();
    store.update(&n, Some(1)).await.unwrap();

    // Second writer read version 1 before the first write landed.
    let mut stale = note("1", "ada", 100);
    stale.body = "second writer".into();
    let err = store.update(&stale, Some(1)).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { expected: 1, .. }));

    let key = store.key_for(&n);
    let current = store.get(&key).await.unwrap();
    assert_eq!(current.body, "first writer");
    assert_eq!(store.current_version(&key).await.unwrap(), Some(2));
}

#[tokio::test]
async fn update_missing_row_is_not_found() {
    let (_, store) = new_store();
    let n = note("ghost", "ada", 100);
    assert!(matches!(
        store.update(&n, None).await.unwrap_err(),
        Error::NotFound { .. }
    ));
    // Supplied version on an absent row also reports NotFound, so callers
    // can fall back to put_new.
    assert!(matches!(
        store.update(&n, Some(1)).await.unwrap_err(),
        Error::NotFound { .. }
    ));
}

#[tokio::test]
async fn delete_removes_row() {
    let (_, store) = new_store();
    let n = note("1", "ada", 100);
    store.put_new(&n).await.unwrap();
    store.delete(&n).await.unwrap();
    let key = store.key_for(&n);
    assert!(store.get_opt(&key).await.unwrap().is_none());
    // Deleting again is a no-op, not an error.
    store.delete(&n).await.unwrap();
}

#[tokio::test]
async fn batch_get_dedupes_and_omits_missing() {
    let (_, store) = new_store();
    for id in ["1", "2", "3"] {
        store.put_new(&note(id, "ada", 100)).await.unwrap();
    }

    let keys = vec![
        RowKey::new("NOTE#2", "NOTE"),
        RowKey::new("NOTE#1", "NOTE"),
        RowKey::new("NOTE#2", "NOTE"),
        RowKey::new("NOTE#missing", "NOTE"),
        RowKey::new("NOTE#3", "NOTE"),
    ];
    let notes = store.batch_get(&keys).await.unwrap();
    let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
    // Deduplicated, input order preserved, missing key omitted.
    assert_eq!(ids, vec!["2", "1", "3"]);
}

#[tokio::test]
async fn batch_get_chunks_past_store_limit() {
    let (_, store) = new_store();
    for i in 0..120 {
        store.put_new(&note(&format!("{i}"), "ada", 100)).await.unwrap();
    }
    let keys: Vec<RowKey> = (0..120)
        .map(|i| RowKey::new(format!("NOTE#{i}"), "NOTE"))
        .collect();
    let notes = store.batch_get(&keys).await.unwrap();
    assert_eq!(notes.len(), 120);
}

#[tokio::test]
async fn query_by_gsi_orders_by_date() {
    let (_, store) = new_store();
    store.put_new(&note("a", "ada", 300)).await.unwrap();
    store.put_new(&note("b", "ada", 100)).await.unwrap();
    store.put_new(&note("c", "grace", 200)).await.unwrap();

    let (notes, last_key) = store
        .query(QueryRequest::index(SecondaryIndex::Gsi1, "NOTE#AUTHOR#ada"))
        .await
        .unwrap();
    assert!(last_key.is_none());
    let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);

    let (notes, _) = store
        .query(QueryRequest::index(SecondaryIndex::Gsi1, "NOTE#AUTHOR#ada").descending())
        .await
        .unwrap();
    let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn query_paginates_through_small_pages() {
    let client = Arc::new(MemoryStore::with_max_page_size(2));
    let store = EntityStore::new(
        client,
        NoteCodec,
        StoreConfig::default(),
        Metrics::new(),
    );
    for i in 0..5 {
        store.put_new(&note(&format!("{i}"), "ada", i)).await.unwrap();
    }

    let mut ids = Vec::new();
    let mut last_key = None;
    loop {
        let (notes, next) = store
            .query(
                QueryRequest::index(SecondaryIndex::Gsi1, "NOTE#AUTHOR#ada")
                    .with_start_key(last_key.take()),
            )
            .await
            .unwrap();
        ids.extend(notes.into_iter().map(|n| n.id));
        match next {
            Some(key) => last_key = Some(key),
            None => break,
        }
    }
    assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
}
