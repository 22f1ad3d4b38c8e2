//! # CubeDB Entities
//!
//! The concrete entity layer: users, cubes, and their card lists.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      cubedb-entities                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌───────────┐     ┌──────────────────────────────────┐     │
//! │  │ CubeStore │────>│ EntityStore<CubeCodec>           │     │
//! │  │           │     │  hydration joins UserStore       │     │
//! │  │           │     ├──────────────────────────────────┤     │
//! │  │           │────>│ HashIndexEngine / Coordinator    │     │
//! │  │           │     ├──────────────────────────────────┤     │
//! │  │           │────>│ Card + analytics blob storage    │     │
//! │  └───────────┘     └──────────────────────────────────┘     │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cube metadata lives in indexed rows; the card lists are large enough
//! that they live as JSON blobs addressed by cube id. The cube codec
//! stores only the owner's id and resolves it to a full [`User`] with
//! one batched lookup per page.
//!
//! ## Modules
//!
//! - `user`: auxiliary user entity resolved during cube hydration
//! - `cube`: cube entity, stored shape, keys, and search document
//! - `cards`: card list payloads in the blob store
//! - `analytics`: precomputed analytics payloads in the blob store
//! - `store`: the cube DAO surface callers use

pub mod analytics;
pub mod cards;
pub mod cube;
pub mod store;
pub mod user;

pub use analytics::AnalyticsStorage;
pub use cards::{CardEntry, CardStorage, CubeCards, CARD_LIMIT};
pub use cube::{Cube, CubeCodec, StoredCube, Visibility};
pub use store::{CubeConfig, CubeStore};
pub use user::{User, UserStore};
