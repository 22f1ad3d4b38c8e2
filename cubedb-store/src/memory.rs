//! In-memory store and blob implementations.
//!
//! Used by tests and local development. The store honors the same
//! contracts as the real service: conditional puts, per-partition sort
//! ordering on the base table and every GSI, bounded batch calls, and
//! pagination with opaque continuation tokens. Transient failures can be
//! injected to exercise retry paths.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use cubedb_core::config::{MAX_BATCH_GET, MAX_BATCH_WRITE};
use cubedb_core::error::{Error, Result};
use cubedb_core::traits::{BlobStore, StoreClient};
use cubedb_core::types::{
    LastKey, PutCondition, QueryOutput, QueryRequest, Row, RowKey, WriteRequest,
};

/// Separator inside continuation tokens; never appears in key material.
const TOKEN_SEP: char = '\u{1f}';

/// In-process [`StoreClient`].
pub struct MemoryStore {
    rows: RwLock<BTreeMap<(String, String), Row>>,
    batch_write_script: Mutex<VecDeque<Result<()>>>,
    max_page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            batch_write_script: Mutex::new(VecDeque::new()),
            max_page_size: 100,
        }
    }

    /// Store that returns at most `max_page_size` rows per query page,
    /// regardless of the request limit. Exercises pagination paths.
    pub fn with_max_page_size(max_page_size: usize) -> Self {
        Self {
            max_page_size,
            ..Self::new()
        }
    }

    /// Queue an error to be returned by the next `batch_write` call.
    /// Each scripted outcome consumes exactly one call.
    pub fn inject_failure(&self, error: Error) {
        self.batch_write_script.lock().push_back(Err(error));
    }

    /// Queue `count` transient connection errors for `batch_write`.
    pub fn inject_transient_failures(&self, count: usize) {
        let mut queue = self.batch_write_script.lock();
        for _ in 0..count {
            queue.push_back(Err(Error::TransientStore {
                operation: "batch_write".into(),
                message: "connection reset".into(),
            }));
        }
    }

    /// Let the next `batch_write` call through. Used to target injected
    /// failures at a later call.
    pub fn inject_batch_success(&self) {
        self.batch_write_script.lock().push_back(Ok(()));
    }

    /// Number of rows currently stored (for test assertions).
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// All rows whose partition key equals `pk` (for test assertions).
    pub fn rows_in_partition(&self, pk: &str) -> Vec<Row> {
        self.rows
            .read()
            .range((pk.to_string(), String::new())..)
            .take_while(|((p, _), _)| p == pk)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Rows in one partition of the base table or a GSI, ordered by the
    /// relevant sort value, each paired with that sort value.
    fn partition_rows(&self, request: &QueryRequest) -> Vec<(String, Row)> {
        let rows = self.rows.read();
        let mut matched: Vec<(String, Row)> = match request.index {
            None => rows
                .range((request.partition.clone(), String::new())..)
                .take_while(|((pk, _), _)| *pk == request.partition)
                .map(|(_, row)| (row.key.sk.clone(), row.clone()))
                .collect(),
            Some(index) => rows
                .values()
                .filter_map(|row| {
                    let key = row.index_key(index)?;
                    (key.pk == request.partition).then(|| (key.sk.clone(), row.clone()))
                })
                .collect(),
        };
        // Index order: sort value, then base key as tiebreaker.
        matched.sort_by(|(a_sort, a), (b_sort, b)| {
            (a_sort, &a.key).cmp(&(b_sort, &b.key))
        });
        matched
    }
}

fn encode_token(sort: &str, key: &RowKey) -> LastKey {
    LastKey(format!(
        "{sort}{TOKEN_SEP}{}{TOKEN_SEP}{}",
        key.pk, key.sk
    ))
}

fn decode_token(token: &LastKey) -> Result<(String, String, String)> {
    let mut parts = token.0.split(TOKEN_SEP);
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(sort), Some(pk), Some(sk), None) => {
            Ok((sort.to_string(), pk.to_string(), sk.to_string()))
        }
        _ => Err(Error::Validation {
            message: "malformed continuation token".into(),
        }),
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get(&self, key: &RowKey) -> Result<Option<Row>> {
        Ok(self
            .rows
            .read()
            .get(&(key.pk.clone(), key.sk.clone()))
            .cloned())
    }

    async fn put(&self, row: Row, condition: PutCondition) -> Result<()> {
        let mut rows = self.rows.write();
        let map_key = (row.key.pk.clone(), row.key.sk.clone());
        let existing = rows.get(&map_key);

        match condition {
            PutCondition::None => {}
            PutCondition::NotExists => {
                if existing.is_some() {
                    return Err(Error::AlreadyExists {
                        pk: row.key.pk.clone(),
                        sk: row.key.sk.clone(),
                    });
                }
            }
            PutCondition::VersionIs(expected) => match existing {
                None => return Err(Error::not_found(&row.key)),
                Some(current) if current.version != expected => {
                    return Err(Error::Conflict {
                        pk: row.key.pk.clone(),
                        sk: row.key.sk.clone(),
                        expected,
                    });
                }
                Some(_) => {}
            },
        }

        rows.insert(map_key, row);
        Ok(())
    }

    async fn delete(&self, key: &RowKey) -> Result<()> {
        self.rows.write().remove(&(key.pk.clone(), key.sk.clone()));
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutput> {
        let mut matched = self.partition_rows(&request);

        if let Some(range) = &request.sort_range {
            matched.retain(|(sort, _)| range.matches(sort));
        }

        if !request.scan_forward {
            matched.reverse();
        }

        let start = match &request.start_key {
            None => 0,
            Some(token) => {
                let (sort, pk, sk) = decode_token(token)?;
                let resume_at = (sort, RowKey::new(pk, sk));
                match matched
                    .iter()
                    .position(|(s, row)| (s.clone(), row.key.clone()) == resume_at)
                {
                    // Token row may have been deleted between pages; in that
                    // case resume from the beginning of the remainder.
                    None => 0,
                    Some(idx) => idx + 1,
                }
            }
        };

        let page_size = request
            .limit
            .map(|limit| limit as usize)
            .unwrap_or(self.max_page_size)
            .min(self.max_page_size);

        let page: Vec<(String, Row)> = matched
            .into_iter()
            .skip(start)
            .take(page_size + 1)
            .collect();

        let has_more = page.len() > page_size;
        let page: Vec<(String, Row)> = page.into_iter().take(page_size).collect();

        let last_key = if has_more {
            page.last()
                .map(|(sort, row)| encode_token(sort, &row.key))
        } else {
            None
        };

        Ok(QueryOutput {
            rows: page.into_iter().map(|(_, row)| row).collect(),
            last_key,
        })
    }

    async fn batch_get(&self, keys: &[RowKey]) -> Result<Vec<Row>> {
        if keys.len() > MAX_BATCH_GET {
            return Err(Error::Validation {
                message: format!(
                    "batch_get called with {} keys (limit {MAX_BATCH_GET})",
                    keys.len()
                ),
            });
        }

        let rows = self.rows.read();
        Ok(keys
            .iter()
            .filter_map(|key| rows.get(&(key.pk.clone(), key.sk.clone())).cloned())
            .collect())
    }

    async fn batch_write(&self, writes: Vec<WriteRequest>) -> Result<()> {
        if writes.len() > MAX_BATCH_WRITE {
            return Err(Error::Validation {
                message: format!(
                    "batch_write called with {} items (limit {MAX_BATCH_WRITE})",
                    writes.len()
                ),
            });
        }

        if let Some(outcome) = self.batch_write_script.lock().pop_front() {
            outcome?;
        }

        let mut rows = self.rows.write();
        for write in writes {
            match write {
                WriteRequest::Put(row) => {
                    rows.insert((row.key.pk.clone(), row.key.sk.clone()), row);
                }
                WriteRequest::Delete(key) => {
                    rows.remove(&(key.pk, key.sk));
                }
            }
        }
        Ok(())
    }
}

/// In-process [`BlobStore`].
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(String, String), Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.blobs
            .read()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.blobs
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| Error::BlobNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        self.blobs
            .write()
            .insert((bucket.to_string(), key.to_string()), data);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.blobs
            .write()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubedb_core::types::{IndexKey, SecondaryIndex, SortRange};
    use serde_json::json;

    fn row(pk: &str, sk: &str, gsi1: Option<(&str, &str)>) -> Row {
        let mut row = Row::new(RowKey::new(pk, sk), json!({ "pk": pk }));
        row.gsi[0] = gsi1.map(|(p, s)| IndexKey::new(p, s));
        row
    }

    #[tokio::test]
    async fn conditional_put_not_exists() {
        let store = MemoryStore::new();
        let r = row("A", "X", None);
        store.put(r.clone(), PutCondition::NotExists).await.unwrap();
        let err = store.put(r, PutCondition::NotExists).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn conditional_put_version() {
        let store = MemoryStore::new();
        let mut r = row("A", "X", None);
        store
            .put(r.clone(), PutCondition::NotExists)
            .await
            .unwrap();

        r.version = 2;
        store.put(r.clone(), PutCondition::VersionIs(1)).await.unwrap();

        // Stale expectation now conflicts.
        let err = store
            .put(r.clone(), PutCondition::VersionIs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { expected: 1, .. }));

        let missing = row("B", "X", None);
        let err = store
            .put(missing, PutCondition::VersionIs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn gsi_query_orders_by_index_sort() {
        let store = MemoryStore::new();
        for (pk, sort) in [("A", "N#03"), ("B", "N#01"), ("C", "N#02")] {
            store
                .put(row(pk, "T", Some(("hash", sort))), PutCondition::None)
                .await
                .unwrap();
        }

        let out = store
            .query(QueryRequest::index(SecondaryIndex::Gsi1, "hash"))
            .await
            .unwrap();
        let pks: Vec<&str> = out.rows.iter().map(|r| r.key.pk.as_str()).collect();
        assert_eq!(pks, vec!["B", "C", "A"]);

        let out = store
            .query(QueryRequest::index(SecondaryIndex::Gsi1, "hash").descending())
            .await
            .unwrap();
        let pks: Vec<&str> = out.rows.iter().map(|r| r.key.pk.as_str()).collect();
        assert_eq!(pks, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn query_paginates_with_token() {
        let store = MemoryStore::with_max_page_size(2);
        for i in 0..5 {
            store
                .put(
                    row("P", &format!("S{i}"), Some(("h", &format!("S{i}")))),
                    PutCondition::None,
                )
                .await
                .unwrap();
        }

        let mut collected = Vec::new();
        let mut last_key = None;
        loop {
            let out = store
                .query(QueryRequest::partition("P").with_start_key(last_key.take()))
                .await
                .unwrap();
            collected.extend(out.rows.iter().map(|r| r.key.sk.clone()));
            match out.last_key {
                Some(key) => last_key = Some(key),
                None => break,
            }
        }
        assert_eq!(collected, vec!["S0", "S1", "S2", "S3", "S4"]);
    }

    #[tokio::test]
    async fn sort_range_applies_at_store() {
        let store = MemoryStore::new();
        for (pk, sort) in [("A", "C#10"), ("B", "C#20"), ("C", "C#30")] {
            store
                .put(row(pk, "T", Some(("h", sort))), PutCondition::None)
                .await
                .unwrap();
        }
        let out = store
            .query(
                QueryRequest::index(SecondaryIndex::Gsi1, "h")
                    .with_range(SortRange::Gt("C#15".into())),
            )
            .await
            .unwrap();
        let pks: Vec<&str> = out.rows.iter().map(|r| r.key.pk.as_str()).collect();
        assert_eq!(pks, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn batch_limits_enforced() {
        let store = MemoryStore::new();
        let keys: Vec<RowKey> = (0..101).map(|i| RowKey::new(format!("{i}"), "T")).collect();
        assert!(matches!(
            store.batch_get(&keys).await.unwrap_err(),
            Error::Validation { .. }
        ));

        let writes: Vec<WriteRequest> = (0..26)
            .map(|i| WriteRequest::Delete(RowKey::new(format!("{i}"), "T")))
            .collect();
        assert!(matches!(
            store.batch_write(writes).await.unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn blob_roundtrip_and_missing() {
        let blobs = MemoryBlobStore::new();
        blobs
            .put("data", "cube/1.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(&blobs.get("data", "cube/1.json").await.unwrap()[..], b"{}");
        blobs.delete("data", "cube/1.json").await.unwrap();
        assert!(matches!(
            blobs.get("data", "cube/1.json").await.unwrap_err(),
            Error::BlobNotFound { .. }
        ));
    }
}
