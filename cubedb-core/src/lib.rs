//! # CubeDB Core
//!
//! This crate provides the fundamental building blocks for CubeDB:
//! - Row and key types for the partitioned key-value store
//! - Traits for store clients, blob stores, codecs and writers
//! - Error types
//! - Configuration
//! - Metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   cubedb-core                   │
//! ├─────────────────────────────────────────────────┤
//! │  • types    - Rows, keys, queries, sort orders  │
//! │  • traits   - Store/blob/codec/writer seams     │
//! │  • error    - Error taxonomy                    │
//! │  • config   - Component configuration           │
//! │  • metrics  - Operation counters                │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BatchConfig, BlobConfig, SearchConfig, StoreConfig};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use traits::{BlobStore, EntityCodec, KeySpec, StoreClient, Writer};
pub use types::{
    IndexKey, LastKey, PutCondition, QueryOutput, QueryRequest, RangeFilter, RangeOp, Row, RowKey,
    SecondaryIndex, SortOrder, SortRange, WriteRequest,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current timestamp in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Generate a fresh entity identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
