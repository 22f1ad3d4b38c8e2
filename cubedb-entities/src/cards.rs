//! Card list payloads.
//!
//! A cube's card list is far larger than its metadata and never needs
//! indexing, so it lives in the blob store as one JSON document per
//! cube, addressed by cube id.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cubedb_core::config::BlobConfig;
use cubedb_core::error::{Error, Result};
use cubedb_core::traits::BlobStore;

/// Maximum cards across both boards.
pub const CARD_LIMIT: usize = 10_000;

/// One card in a board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardEntry {
    pub card_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    /// Catalog data attached at read time; never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CardEntry {
    /// The persistable projection: everything except attached catalog
    /// details.
    pub fn strip_details(&self) -> CardEntry {
        CardEntry {
            details: None,
            ..self.clone()
        }
    }
}

/// A cube's boards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CubeCards {
    #[serde(default)]
    pub mainboard: Vec<CardEntry>,
    #[serde(default)]
    pub maybeboard: Vec<CardEntry>,
}

impl CubeCards {
    /// The card count cube metadata tracks: mainboard only.
    pub fn card_count(&self) -> u64 {
        self.mainboard.len() as u64
    }

    pub fn total(&self) -> usize {
        self.mainboard.len() + self.maybeboard.len()
    }

    fn stripped(&self) -> CubeCards {
        CubeCards {
            mainboard: self.mainboard.iter().map(CardEntry::strip_details).collect(),
            maybeboard: self.maybeboard.iter().map(CardEntry::strip_details).collect(),
        }
    }
}

/// Card list persistence in the blob store.
pub struct CardStorage {
    blobs: Arc<dyn BlobStore>,
    config: BlobConfig,
}

impl CardStorage {
    pub fn new(blobs: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self { blobs, config }
    }

    fn blob_key(cube_id: &str) -> String {
        format!("cube/{cube_id}.json")
    }

    /// Fetch a cube's boards. A cube that has never saved cards reads as
    /// empty boards, not an error.
    pub async fn get(&self, cube_id: &str) -> Result<CubeCards> {
        match self.blobs.get(&self.config.bucket, &Self::blob_key(cube_id)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Serialization {
                message: format!("cards blob for cube {cube_id}: {e}"),
            }),
            Err(Error::BlobNotFound { .. }) => {
                debug!(cube_id, "no cards blob, returning empty boards");
                Ok(CubeCards::default())
            }
            Err(error) => Err(error),
        }
    }

    /// Persist a cube's boards, stripped of attached catalog details.
    pub async fn put(&self, cube_id: &str, cards: &CubeCards) -> Result<()> {
        if cards.total() > CARD_LIMIT {
            return Err(Error::Validation {
                message: format!(
                    "cube {cube_id} has {} cards (limit {CARD_LIMIT})",
                    cards.total()
                ),
            });
        }
        let payload = serde_json::to_vec(&cards.stripped())?;
        self.blobs
            .put(&self.config.bucket, &Self::blob_key(cube_id), Bytes::from(payload))
            .await
    }

    pub async fn delete(&self, cube_id: &str) -> Result<()> {
        self.blobs
            .delete(&self.config.bucket, &Self::blob_key(cube_id))
            .await
    }
}
