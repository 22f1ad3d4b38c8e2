//! # Core Traits
//!
//! The seams between CubeDB components.
//!
//! ## Design Philosophy
//!
//! 1. **Async-First**: every store and blob call is a suspension point
//! 2. **Error Propagation**: all operations return `Result`
//! 3. **Testability**: traits enable in-memory implementations
//! 4. **Composition over inheritance**: entity behavior is supplied by a
//!    codec and a key spec injected into one generic engine, not by
//!    subclass overrides

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::types::{IndexKey, PutCondition, QueryOutput, QueryRequest, Row, RowKey, WriteRequest};

/// The underlying partitioned key-value service.
///
/// Point operations address rows by `(partition key, sort key)`; queries
/// scan one partition of the base table or a named secondary index with an
/// optional sort-key range. Batch calls are bounded (25 writes, 100 gets)
/// and the batch write primitive has no conditional form.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Point read. `Ok(None)` when the row is absent.
    async fn get(&self, key: &RowKey) -> Result<Option<Row>>;

    /// Write one row, optionally guarded by a condition.
    ///
    /// Condition violations surface as `AlreadyExists` (for
    /// [`PutCondition::NotExists`]), or `Conflict` / `NotFound` (for
    /// [`PutCondition::VersionIs`]).
    async fn put(&self, row: Row, condition: PutCondition) -> Result<()>;

    /// Unconditional point delete. Deleting an absent row is not an error.
    async fn delete(&self, key: &RowKey) -> Result<()>;

    /// Scan one partition, ordered by sort key, with pagination.
    async fn query(&self, request: QueryRequest) -> Result<QueryOutput>;

    /// Bounded batch point read. Missing keys are silently omitted; the
    /// returned order is unspecified.
    async fn batch_get(&self, keys: &[RowKey]) -> Result<Vec<Row>>;

    /// Bounded batch write. Bypasses conditions entirely.
    async fn batch_write(&self, writes: Vec<WriteRequest>) -> Result<()>;
}

/// Opaque byte store for payloads the indexed row should not carry
/// (large documents, card lists).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob. Absent keys surface as `BlobNotFound`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Translation between a hydrated entity and its stored shape.
///
/// The stored shape holds only foreign-key scalars plus entity-local
/// fields; hydration resolves those references into embedded objects.
/// `dehydrate` is pure; `hydrate_batch` may issue auxiliary lookups and
/// must batch them across the whole input rather than resolving items
/// one-by-one; callers depend on that being one round trip.
#[async_trait]
pub trait EntityCodec: Send + Sync {
    /// Caller-visible entity with resolved references.
    type Hydrated: Send + Sync;
    /// Row payload shape with foreign-key scalars only.
    type Stored: Serialize + DeserializeOwned + Send + Sync;

    /// Scoping discriminator; also the constant sort key of entity rows.
    fn item_type(&self) -> &'static str;

    /// Project the hydrated entity down to its stored shape.
    fn dehydrate(&self, entity: &Self::Hydrated) -> Self::Stored;

    /// Resolve references for a whole batch, preserving input order.
    async fn hydrate_batch(&self, stored: Vec<Self::Stored>) -> Result<Vec<Self::Hydrated>>;

    /// Resolve references for one item.
    async fn hydrate(&self, stored: Self::Stored) -> Result<Self::Hydrated> {
        let mut hydrated = self.hydrate_batch(vec![stored]).await?;
        hydrated.pop().ok_or_else(|| crate::error::Error::Serialization {
            message: format!("{}: hydrate_batch dropped its only item", self.item_type()),
        })
    }

    /// Base-table key of the entity row owning `partition_key`.
    fn key_for_partition(&self, partition_key: &str) -> RowKey {
        RowKey::new(partition_key, self.item_type())
    }
}

/// Physical key derivation for one entity type.
pub trait KeySpec: Send + Sync {
    type Entity;

    fn partition_key(&self, entity: &Self::Entity) -> String;

    fn sort_key(&self, entity: &Self::Entity) -> String;

    /// Secondary-index key pairs, one slot per GSI. `None` slots keep the
    /// row off that index.
    fn gsi_keys(&self, entity: &Self::Entity) -> [Option<IndexKey>; 4];
}

/// Write capability for row sets.
///
/// Normal code paths depend only on this trait; fan-out to a legacy table
/// during migration is a decorator, never a flag branch.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, writes: Vec<WriteRequest>) -> Result<()>;
}
