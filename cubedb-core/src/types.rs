//! # Core Types
//!
//! Row and query types shared by every CubeDB component.
//!
//! The underlying store is a partitioned key-value service: each row is
//! addressed by a `(partition key, sort key)` pair and may additionally be
//! materialized onto up to four global secondary indexes (GSIs), each an
//! alternate key pair. That five-key-pair bound is load-bearing: the hash
//! index uses one GSI per sort dimension.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The base-table primary key of a row. Globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub pk: String,
    pub sk: String,
}

impl RowKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// One secondary-index key pair on a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub pk: String,
    pub sk: String,
}

impl IndexKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

/// The four global secondary indexes every table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryIndex {
    Gsi1,
    Gsi2,
    Gsi3,
    Gsi4,
}

impl SecondaryIndex {
    pub fn name(&self) -> &'static str {
        match self {
            SecondaryIndex::Gsi1 => "GSI1",
            SecondaryIndex::Gsi2 => "GSI2",
            SecondaryIndex::Gsi3 => "GSI3",
            SecondaryIndex::Gsi4 => "GSI4",
        }
    }

    /// Position of this index in a row's GSI key array.
    pub fn slot(&self) -> usize {
        match self {
            SecondaryIndex::Gsi1 => 0,
            SecondaryIndex::Gsi2 => 1,
            SecondaryIndex::Gsi3 => 2,
            SecondaryIndex::Gsi4 => 3,
        }
    }

    pub fn all() -> [SecondaryIndex; 4] {
        [
            SecondaryIndex::Gsi1,
            SecondaryIndex::Gsi2,
            SecondaryIndex::Gsi3,
            SecondaryIndex::Gsi4,
        ]
    }
}

/// The physical unit stored in the table.
///
/// `version` starts at 1 and increases by exactly 1 on every successful
/// conditional update. The entity payload is embedded as a schemaless JSON
/// document; typed codecs translate it to and from stored entity shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub key: RowKey,
    pub gsi: [Option<IndexKey>; 4],
    pub version: u64,
    pub item: serde_json::Value,
}

impl Row {
    /// Row with no secondary-index presence.
    pub fn new(key: RowKey, item: serde_json::Value) -> Self {
        Self {
            key,
            gsi: [None, None, None, None],
            version: 1,
            item,
        }
    }

    pub fn index_key(&self, index: SecondaryIndex) -> Option<&IndexKey> {
        self.gsi[index.slot()].as_ref()
    }
}

/// Range condition on the sort key of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortRange {
    Eq(String),
    Lt(String),
    Gt(String),
    Between(String, String),
    BeginsWith(String),
}

impl SortRange {
    pub fn matches(&self, sort: &str) -> bool {
        match self {
            SortRange::Eq(v) => sort == v,
            SortRange::Lt(v) => sort < v.as_str(),
            SortRange::Gt(v) => sort > v.as_str(),
            SortRange::Between(lo, hi) => sort >= lo.as_str() && sort <= hi.as_str(),
            SortRange::BeginsWith(prefix) => sort.starts_with(prefix),
        }
    }
}

/// Opaque continuation token returned by paginated queries.
///
/// Pass it back unmodified on the next request; its contents are an
/// implementation detail of the store client that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastKey(pub String);

/// A query against the base table or one named secondary index.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index: Option<SecondaryIndex>,
    pub partition: String,
    pub sort_range: Option<SortRange>,
    pub scan_forward: bool,
    pub limit: Option<u32>,
    pub start_key: Option<LastKey>,
}

impl QueryRequest {
    /// Query the base table partition, ascending, no range.
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            index: None,
            partition: partition.into(),
            sort_range: None,
            scan_forward: true,
            limit: None,
            start_key: None,
        }
    }

    /// Query one secondary index partition, ascending, no range.
    pub fn index(index: SecondaryIndex, partition: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            partition: partition.into(),
            sort_range: None,
            scan_forward: true,
            limit: None,
            start_key: None,
        }
    }

    pub fn with_range(mut self, range: SortRange) -> Self {
        self.sort_range = Some(range);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start_key(mut self, start_key: Option<LastKey>) -> Self {
        self.start_key = start_key;
        self
    }

    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }

    pub fn forward(mut self, scan_forward: bool) -> Self {
        self.scan_forward = scan_forward;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub last_key: Option<LastKey>,
}

/// A single element of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Row),
    Delete(RowKey),
}

impl WriteRequest {
    pub fn key(&self) -> &RowKey {
        match self {
            WriteRequest::Put(row) => &row.key,
            WriteRequest::Delete(key) => key,
        }
    }
}

/// Condition attached to a single-item put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// Unconditional write.
    None,
    /// The row must not already exist.
    NotExists,
    /// The row must exist and carry exactly this version.
    VersionIs(u64),
}

/// The sort dimensions the hash index materializes, one per GSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Follower count.
    Popularity,
    /// Lowercased name.
    Alphabetical,
    /// Card count.
    Cards,
    /// Last-updated timestamp.
    Date,
}

impl SortOrder {
    /// The secondary index whose sort attribute is this dimension.
    pub fn index(&self) -> SecondaryIndex {
        match self {
            SortOrder::Popularity => SecondaryIndex::Gsi1,
            SortOrder::Alphabetical => SecondaryIndex::Gsi2,
            SortOrder::Cards => SecondaryIndex::Gsi3,
            SortOrder::Date => SecondaryIndex::Gsi4,
        }
    }
}

/// Comparison operator of a numeric range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeOp {
    Eq,
    Gt,
    Lt,
}

/// Numeric filter applied store-side on the card-count dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub op: RangeOp,
    pub value: u64,
}
