//! # Configuration
//!
//! Explicit configuration structs passed to component constructors at
//! startup. Components never read resource names from the environment
//! themselves.

use std::time::Duration;

/// Hard store limit on items per batch write call.
pub const MAX_BATCH_WRITE: usize = 25;

/// Hard store limit on keys per batch get call.
pub const MAX_BATCH_GET: usize = 100;

/// Configuration for an entity store. The physical table is owned by
/// the store client; entity stores only tune how they talk to it.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Chunk size for batched point reads.
    pub batch_get_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            batch_get_size: MAX_BATCH_GET,
        }
    }
}

/// Configuration for the batch write engine.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items per chunk; the store rejects anything above [`MAX_BATCH_WRITE`].
    pub chunk_size: usize,
    /// Total attempts per chunk, including the first.
    pub max_attempts: u32,
    /// First retry delay; doubles per subsequent attempt (1s, 2s, 4s).
    pub base_backoff: Duration,
    /// Optional pause between chunks to throttle store-side rate limits.
    pub inter_chunk_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_BATCH_WRITE,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            inter_chunk_delay: Duration::ZERO,
        }
    }
}

/// Configuration for blob-backed payload storage.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub bucket: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            bucket: "cubedb-data".to_string(),
        }
    }
}

impl BlobConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

/// Configuration for the multi-criteria search coordinator.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Bounded intersection: at most this many hash predicates per search.
    pub max_hashes: usize,
    /// Page size used while draining each per-hash scan.
    pub scan_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_hashes: 10,
            scan_page_size: 100,
        }
    }
}
