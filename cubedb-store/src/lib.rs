//! # CubeDB Store
//!
//! Generic entity persistence over the partitioned key-value store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       cubedb-store                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Write Path:                                                │
//! │  ┌─────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ Entity  │───>│ EntityStore │───>│ StoreClient │          │
//! │  └─────────┘    │ (codec+keys)│    └─────────────┘          │
//! │                 └─────────────┘                             │
//! │                                                             │
//! │  Bulk Path:                                                 │
//! │  ┌─────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ Rows    │───>│ BatchWriter │───>│ StoreClient │          │
//! │  └─────────┘    │ chunk+retry │    └─────────────┘          │
//! │                 └─────────────┘                             │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `entity`: generic CRUD with hydration and optimistic locking
//! - `batch`: chunked batch writes with bounded retry and backoff
//! - `writer`: write strategies (primary, dual-write decorator)
//! - `memory`: in-process store/blob implementations for tests and
//!   local development

pub mod batch;
pub mod entity;
pub mod memory;
pub mod writer;

pub use batch::BatchWriter;
pub use entity::EntityStore;
pub use memory::{MemoryBlobStore, MemoryStore};
pub use writer::DualWriter;
