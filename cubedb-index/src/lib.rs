//! # CubeDB Index
//!
//! Hash-based inverted index and multi-criteria search.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       cubedb-index                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Index Path:                                                │
//! │  ┌───────────┐    ┌─────────────────┐    ┌──────────┐       │
//! │  │ SearchDoc │───>│ HashIndexEngine │───>│ Writer   │       │
//! │  └───────────┘    │ diff + apply    │    └──────────┘       │
//! │                   └─────────────────┘                       │
//! │                                                             │
//! │  Query Path:                                                │
//! │  ┌─────────┐    ┌───────────────────┐    ┌─────────────┐    │
//! │  │ Hashes  │───>│ SearchCoordinator │───>│ EntityStore │    │
//! │  └─────────┘    │ scan ∩ hydrate    │    └─────────────┘    │
//! │                 └───────────────────┘                       │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each search criterion a row matches becomes one hash row whose
//! partition is the criterion hash and whose sort key is the owning
//! entity's partition key. The four GSIs on a hash row carry the same
//! hash partition with a padded sort attribute per dimension, so any
//! criterion can be scanned in any of the four orders directly at the
//! store.
//!
//! ## Modules
//!
//! - `hash`: pure criterion hashing, keyword slicing, sort attributes
//! - `engine`: hash row materialization, diffing, batched maintenance
//! - `search`: bounded multi-criteria intersection with hydration

pub mod engine;
pub mod hash;
pub mod search;

pub use engine::{HashIndexEngine, IndexDiff};
pub use hash::{keyword_slices, normalize_phrase, search_hash, Criterion, SearchDoc, SortAttributes};
pub use search::{SearchCoordinator, Searchable};
