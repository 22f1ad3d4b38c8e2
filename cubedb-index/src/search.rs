//! Bounded multi-criteria search.
//!
//! Each criterion hash is one partition scan; the scans run fork-join
//! and their key sets are intersected before anything is hydrated.
//! Every scan drains its partition to exhaustion, so cost is
//! proportional to the most popular criterion in the conjunction, not
//! to the result size. That is acceptable at current partition sizes;
//! a cheapest-first streaming intersection is the known followup if a
//! criterion partition ever grows hot.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use cubedb_core::config::SearchConfig;
use cubedb_core::error::{Error, Result};
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::{EntityCodec, KeySpec};
use cubedb_core::types::{
    QueryRequest, RangeFilter, RangeOp, RowKey, SecondaryIndex, SortOrder, SortRange,
};
use cubedb_store::EntityStore;

use crate::hash::{cards_sort, SortAttributes};

/// Entities that contribute sort attributes, for in-memory re-sorting.
pub trait Searchable {
    fn sort_attributes(&self) -> SortAttributes;
}

/// Intersects hash partitions and hydrates the survivors.
pub struct SearchCoordinator<C>
where
    C: EntityCodec + KeySpec<Entity = <C as EntityCodec>::Hydrated>,
{
    entities: Arc<EntityStore<C>>,
    config: SearchConfig,
    metrics: Metrics,
}

impl<C> SearchCoordinator<C>
where
    C: EntityCodec + KeySpec<Entity = <C as EntityCodec>::Hydrated>,
{
    pub fn new(entities: Arc<EntityStore<C>>, config: SearchConfig, metrics: Metrics) -> Self {
        Self {
            entities,
            config,
            metrics,
        }
    }

    /// Find the entities matching every hash, ordered by `sort_by`.
    ///
    /// A range filter forces every scan onto the card-count index so the
    /// store applies the range natively; when that index is not the
    /// requested order the final page is re-sorted in memory. Without a
    /// range filter the store-side order is returned as-is.
    ///
    /// Fails with `Validation` before any I/O when the hash list is
    /// empty or longer than the configured bound.
    pub async fn search(
        &self,
        hashes: &[String],
        sort_by: SortOrder,
        ascending: bool,
        range_filter: Option<RangeFilter>,
    ) -> Result<Vec<C::Hydrated>>
    where
        C::Hydrated: Searchable,
    {
        if hashes.is_empty() {
            return Err(Error::Validation {
                message: "search requires at least one hash".into(),
            });
        }
        if hashes.len() > self.config.max_hashes {
            return Err(Error::Validation {
                message: format!(
                    "search with {} hashes exceeds the {}-hash bound",
                    hashes.len(),
                    self.config.max_hashes
                ),
            });
        }
        self.metrics.record_search();

        let (index, range) = match range_filter {
            Some(filter) => (SortOrder::Cards.index(), Some(range_for(filter))),
            None => (sort_by.index(), None),
        };

        let per_hash = try_join_all(
            hashes
                .iter()
                .map(|hash| self.scan_hash(hash, index, range.clone(), ascending)),
        )
        .await?;

        let survivors = intersect(per_hash);
        debug!(
            hashes = hashes.len(),
            index = index.name(),
            survivors = survivors.len(),
            "hash intersection complete"
        );
        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = self.entities.batch_get(&survivors).await?;

        if range_filter.is_some() && sort_by != SortOrder::Cards {
            results.sort_by_cached_key(|entity| entity.sort_attributes().gsi_sort(sort_by));
            if !ascending {
                results.reverse();
            }
        }
        Ok(results)
    }

    /// Drain one hash partition on `index`, returning owning-entity keys
    /// in scan order.
    async fn scan_hash(
        &self,
        hash: &str,
        index: SecondaryIndex,
        range: Option<SortRange>,
        ascending: bool,
    ) -> Result<Vec<RowKey>> {
        self.metrics.record_hash_scan();
        let mut keys = Vec::new();
        let mut start_key = None;
        loop {
            let mut request = QueryRequest::index(index, hash)
                .forward(ascending)
                .with_limit(self.config.scan_page_size)
                .with_start_key(start_key.take());
            if let Some(range) = range.clone() {
                request = request.with_range(range);
            }

            let output = self.entities.query_raw(request).await?;
            // A hash row's sort key is the owning entity's partition key.
            keys.extend(
                output
                    .rows
                    .into_iter()
                    .map(|row| self.entities.key_for_partition(&row.key.sk)),
            );
            match output.last_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(keys)
    }
}

/// Keys present in every scan, in the first scan's order. Short-circuits
/// to empty as soon as any intersection empties out.
fn intersect(mut per_hash: Vec<Vec<RowKey>>) -> Vec<RowKey> {
    if per_hash.is_empty() {
        return Vec::new();
    }
    let mut survivors = per_hash.remove(0);
    for scan in per_hash {
        if survivors.is_empty() {
            break;
        }
        let members: HashSet<&RowKey> = scan.iter().collect();
        survivors.retain(|key| members.contains(key));
    }
    survivors
}

fn range_for(filter: RangeFilter) -> SortRange {
    let bound = cards_sort(filter.value);
    match filter.op {
        RangeOp::Eq => SortRange::Eq(bound),
        RangeOp::Gt => SortRange::Gt(bound),
        RangeOp::Lt => SortRange::Lt(bound),
    }
}
