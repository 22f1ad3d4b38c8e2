//! Hash row materialization and incremental maintenance.
//!
//! The engine never touches entity rows. It turns a [`SearchDoc`] into
//! the hash rows it implies, diffs two documents into the minimal row
//! delta, and pushes that delta through a [`Writer`] so the batch
//! chunking and retry policy apply uniformly.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use cubedb_core::error::Result;
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::Writer;
use cubedb_core::types::{IndexKey, Row, RowKey, SortOrder, WriteRequest};

use crate::hash::{SearchDoc, SortAttributes};

/// Row-level delta between two index documents.
///
/// `refreshed` holds hashes present in both documents whose rows must be
/// rewritten anyway because a sort attribute changed; it is disjoint
/// from `added`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub refreshed: BTreeSet<String>,
}

impl IndexDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.refreshed.is_empty()
    }
}

/// Maintains the inverted hash index for one entity type.
pub struct HashIndexEngine {
    writer: Arc<dyn Writer>,
    metrics: Metrics,
}

impl HashIndexEngine {
    pub fn new(writer: Arc<dyn Writer>, metrics: Metrics) -> Self {
        Self { writer, metrics }
    }

    /// One hash row: partition = hash, sort = owning entity pk, and the
    /// same hash partition on all four GSIs with the per-dimension sort.
    pub fn hash_row(hash: &str, entity_pk: &str, sort: &SortAttributes) -> Row {
        let mut row = Row::new(
            RowKey::new(hash, entity_pk),
            json!({ "entity": entity_pk, "name": sort.name }),
        );
        for order in [
            SortOrder::Popularity,
            SortOrder::Alphabetical,
            SortOrder::Cards,
            SortOrder::Date,
        ] {
            row.gsi[order.index().slot()] = Some(IndexKey::new(hash, sort.gsi_sort(order)));
        }
        row
    }

    /// Minimal delta between two documents of the same entity.
    ///
    /// Hash membership and sort attributes are independent triggers: an
    /// unchanged hash set with changed sort attributes still refreshes
    /// every retained row, because each row embeds the sort values in
    /// its GSI keys.
    pub fn diff(old: &SearchDoc, new: &SearchDoc) -> IndexDiff {
        let old_hashes = old.hashes();
        let new_hashes = new.hashes();

        let added: BTreeSet<String> = new_hashes.difference(&old_hashes).cloned().collect();
        let removed: BTreeSet<String> = old_hashes.difference(&new_hashes).cloned().collect();
        let refreshed = if old.sort == new.sort {
            BTreeSet::new()
        } else {
            old_hashes.intersection(&new_hashes).cloned().collect()
        };

        IndexDiff {
            added,
            removed,
            refreshed,
        }
    }

    /// Write every hash row of a fresh document.
    pub async fn insert(&self, entity_pk: &str, doc: &SearchDoc) -> Result<()> {
        self.write_rows(entity_pk, &doc.hashes(), &doc.sort).await
    }

    /// Delete every hash row of a document being removed.
    pub async fn remove(&self, entity_pk: &str, doc: &SearchDoc) -> Result<()> {
        self.delete_rows(entity_pk, &doc.hashes()).await
    }

    /// Apply a diff as one write set: deletes for `removed`, puts for
    /// `added` and `refreshed`, all carrying the new sort attributes.
    pub async fn apply(&self, entity_pk: &str, diff: &IndexDiff, sort: &SortAttributes) -> Result<()> {
        if diff.is_empty() {
            return Ok(());
        }

        let mut writes: Vec<WriteRequest> = Vec::with_capacity(
            diff.removed.len() + diff.added.len() + diff.refreshed.len(),
        );
        for hash in &diff.removed {
            writes.push(WriteRequest::Delete(RowKey::new(hash.clone(), entity_pk)));
        }
        for hash in diff.added.iter().chain(&diff.refreshed) {
            writes.push(WriteRequest::Put(Self::hash_row(hash, entity_pk, sort)));
        }

        debug!(
            entity_pk,
            added = diff.added.len(),
            removed = diff.removed.len(),
            refreshed = diff.refreshed.len(),
            "applying hash index diff"
        );
        self.metrics
            .record_hash_rows_written((diff.added.len() + diff.refreshed.len()) as u64);
        self.metrics.record_hash_rows_deleted(diff.removed.len() as u64);
        self.writer.write(writes).await
    }

    pub async fn write_rows(
        &self,
        entity_pk: &str,
        hashes: &BTreeSet<String>,
        sort: &SortAttributes,
    ) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let writes: Vec<WriteRequest> = hashes
            .iter()
            .map(|hash| WriteRequest::Put(Self::hash_row(hash, entity_pk, sort)))
            .collect();
        self.metrics.record_hash_rows_written(writes.len() as u64);
        self.writer.write(writes).await
    }

    pub async fn delete_rows(&self, entity_pk: &str, hashes: &BTreeSet<String>) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let writes: Vec<WriteRequest> = hashes
            .iter()
            .map(|hash| WriteRequest::Delete(RowKey::new(hash.clone(), entity_pk)))
            .collect();
        self.metrics.record_hash_rows_deleted(writes.len() as u64);
        self.writer.write(writes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Criterion;
    use cubedb_core::types::SecondaryIndex;

    fn doc(tags: &[&str], sort: SortAttributes) -> SearchDoc {
        SearchDoc {
            item_type: "CUBE",
            criteria: tags.iter().map(|t| Criterion::new("tag", *t)).collect(),
            sort,
        }
    }

    fn sort(size: u64) -> SortAttributes {
        SortAttributes {
            popularity: 5,
            name: "Test Cube".into(),
            size,
            updated_at_ms: 1_000,
        }
    }

    #[test]
    fn unchanged_doc_diffs_to_empty() {
        let old = doc(&["vintage", "legacy"], sort(360));
        let diff = HashIndexEngine::diff(&old, &old.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn criteria_change_touches_only_the_delta() {
        let old = doc(&["vintage", "legacy"], sort(360));
        let new = doc(&["vintage", "pauper"], sort(360));
        let diff = HashIndexEngine::diff(&old, &new);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
        assert!(diff.refreshed.is_empty());
        assert!(diff
            .added
            .contains(&crate::hash::search_hash("CUBE", &[Criterion::new("tag", "pauper")])));
    }

    #[test]
    fn sort_change_refreshes_retained_rows() {
        let old = doc(&["vintage", "legacy"], sort(360));
        let new = doc(&["vintage", "legacy"], sort(450));
        let diff = HashIndexEngine::diff(&old, &new);

        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.refreshed.len(), 2);
    }

    #[test]
    fn combined_change_keeps_added_and_refreshed_disjoint() {
        let old = doc(&["vintage", "legacy"], sort(360));
        let new = doc(&["vintage", "pauper"], sort(450));
        let diff = HashIndexEngine::diff(&old, &new);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.refreshed.len(), 1);
        assert!(diff.added.is_disjoint(&diff.refreshed));
    }

    #[test]
    fn hash_row_materializes_all_four_dimensions() {
        let row = HashIndexEngine::hash_row("abc123", "CUBE#1", &sort(360));
        assert_eq!(row.key, RowKey::new("abc123", "CUBE#1"));
        assert_eq!(row.version, 1);
        for index in SecondaryIndex::all() {
            let key = row.index_key(index).expect("gsi key");
            assert_eq!(key.pk, "abc123");
        }
        assert_eq!(
            row.index_key(SecondaryIndex::Gsi3).unwrap().sk,
            "CARDS#0000000360"
        );
        assert_eq!(
            row.index_key(SecondaryIndex::Gsi2).unwrap().sk,
            "NAME#test cube"
        );
    }
}
