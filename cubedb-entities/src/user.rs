//! Auxiliary user entity.
//!
//! Users are stored as-is (no references to resolve) and exist here
//! mainly so cube hydration has something to join against.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cubedb_core::config::StoreConfig;
use cubedb_core::error::Result;
use cubedb_core::metrics::Metrics;
use cubedb_core::traits::{EntityCodec, KeySpec, StoreClient};
use cubedb_core::types::{IndexKey, RowKey};
use cubedb_store::EntityStore;

pub const USER_ITEM_TYPE: &str = "USER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

impl User {
    /// Stand-in for an owner whose account no longer resolves. Cube
    /// pages keep rendering instead of failing the whole hydration.
    pub fn deleted_placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: "[deleted]".to_string(),
            image_name: None,
        }
    }
}

pub struct UserCodec;

#[async_trait]
impl EntityCodec for UserCodec {
    type Hydrated = User;
    type Stored = User;

    fn item_type(&self) -> &'static str {
        USER_ITEM_TYPE
    }

    fn dehydrate(&self, user: &User) -> User {
        user.clone()
    }

    async fn hydrate_batch(&self, stored: Vec<User>) -> Result<Vec<User>> {
        Ok(stored)
    }
}

impl KeySpec for UserCodec {
    type Entity = User;

    fn partition_key(&self, user: &User) -> String {
        format!("USER#{}", user.id)
    }

    fn sort_key(&self, _user: &User) -> String {
        USER_ITEM_TYPE.to_string()
    }

    fn gsi_keys(&self, _user: &User) -> [Option<IndexKey>; 4] {
        [None, None, None, None]
    }
}

/// User persistence over the generic entity layer.
pub struct UserStore {
    inner: EntityStore<UserCodec>,
}

impl UserStore {
    pub fn new(client: Arc<dyn StoreClient>, config: StoreConfig, metrics: Metrics) -> Self {
        Self {
            inner: EntityStore::new(client, UserCodec, config, metrics),
        }
    }

    fn key(id: &str) -> RowKey {
        RowKey::new(format!("USER#{id}"), USER_ITEM_TYPE)
    }

    pub async fn put_new(&self, user: &User) -> Result<()> {
        self.inner.put_new(user).await
    }

    pub async fn update(&self, user: &User) -> Result<()> {
        self.inner.update(user, None).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        self.inner.get_opt(&Self::key(id)).await
    }

    /// Batched lookup by id; missing users are omitted, not substituted.
    pub async fn batch_get(&self, ids: &[String]) -> Result<Vec<User>> {
        let keys: Vec<RowKey> = ids.iter().map(|id| Self::key(id)).collect();
        self.inner.batch_get(&keys).await
    }
}
