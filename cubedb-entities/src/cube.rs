//! The cube entity: hydrated and stored shapes, physical keys, and the
//! search document a cube contributes to the hash index.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use cubedb_core::error::Result;
use cubedb_core::traits::{EntityCodec, KeySpec};
use cubedb_core::types::IndexKey;
use cubedb_index::{keyword_slices, Criterion, SearchDoc, Searchable, SortAttributes};

use crate::cards::{CardEntry, CubeCards};
use crate::user::{User, UserStore};

pub const CUBE_ITEM_TYPE: &str = "CUBE";

/// Partitions for the scan-all index; one partition per shard keeps any
/// single GSI partition bounded.
pub const SHARD_COUNT: u64 = 4;

/// Who can see a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[serde(rename = "pu")]
    Public,
    #[serde(rename = "pr")]
    Private,
    #[serde(rename = "un")]
    Unlisted,
}

impl Visibility {
    pub fn code(&self) -> &'static str {
        match self {
            Visibility::Public => "pu",
            Visibility::Private => "pr",
            Visibility::Unlisted => "un",
        }
    }
}

/// A cube with its owner resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
    pub name: String,
    pub owner: User,
    pub visibility: Visibility,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_override: Option<String>,
    #[serde(default)]
    pub category_prefixes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// Ids of users following this cube.
    #[serde(default)]
    pub following: Vec<String>,
    pub card_count: u64,
    pub date_created: u64,
    pub date_last_updated: u64,
}

/// The row payload: identical to [`Cube`] except the owner is a bare id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCube {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
    pub name: String,
    pub owner: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_override: Option<String>,
    #[serde(default)]
    pub category_prefixes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub card_count: u64,
    pub date_created: u64,
    pub date_last_updated: u64,
}

impl Cube {
    pub fn partition_key(&self) -> String {
        cube_pk(&self.id)
    }

    /// Every criterion this cube is findable under.
    pub fn search_doc(&self) -> SearchDoc {
        let mut criteria = vec![Criterion::new("cube", "all")];
        if let Some(short_id) = &self.short_id {
            criteria.push(Criterion::new("shortid", short_id.to_lowercase()));
        }
        if self.featured {
            criteria.push(Criterion::new("featured", "true"));
        }
        if let Some(category) = &self.category_override {
            criteria.push(Criterion::new("category", category.to_lowercase()));
        }
        for prefix in &self.category_prefixes {
            criteria.push(Criterion::new("category", prefix.to_lowercase()));
        }
        for tag in &self.tags {
            criteria.push(Criterion::new("tag", tag.to_lowercase()));
        }
        for slice in keyword_slices(&self.name) {
            criteria.push(Criterion::new("keywords", slice));
        }

        SearchDoc {
            item_type: CUBE_ITEM_TYPE,
            criteria,
            sort: self.sort_attributes(),
        }
    }

    /// [`search_doc`](Self::search_doc) extended with card membership:
    /// one `card` criterion per distinct mainboard card and one `maybe`
    /// criterion per distinct maybeboard card.
    pub fn search_doc_with_cards(&self, cards: &CubeCards) -> SearchDoc {
        let mut doc = self.search_doc();
        for card_id in distinct_card_ids(&cards.mainboard) {
            doc.criteria.push(Criterion::new("card", card_id));
        }
        for card_id in distinct_card_ids(&cards.maybeboard) {
            doc.criteria.push(Criterion::new("maybe", card_id));
        }
        doc
    }
}

fn distinct_card_ids(board: &[CardEntry]) -> BTreeSet<String> {
    board.iter().map(|card| card.card_id.to_lowercase()).collect()
}

impl Searchable for Cube {
    fn sort_attributes(&self) -> SortAttributes {
        SortAttributes {
            popularity: self.following.len() as u64,
            name: self.name.clone(),
            size: self.card_count,
            updated_at_ms: self.date_last_updated,
        }
    }
}

pub fn cube_pk(id: &str) -> String {
    format!("CUBE#{id}")
}

/// Stable shard for the scan-all index.
pub fn shard_of(id: &str) -> u64 {
    id.bytes().map(u64::from).sum::<u64>() % SHARD_COUNT
}

/// Codec for cubes: dehydration projects the owner down to an id, and
/// hydration resolves all owners of a page with one batched user fetch.
pub struct CubeCodec {
    users: Arc<UserStore>,
}

impl CubeCodec {
    pub fn new(users: Arc<UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl EntityCodec for CubeCodec {
    type Hydrated = Cube;
    type Stored = StoredCube;

    fn item_type(&self) -> &'static str {
        CUBE_ITEM_TYPE
    }

    fn dehydrate(&self, cube: &Cube) -> StoredCube {
        StoredCube {
            id: cube.id.clone(),
            short_id: cube.short_id.clone(),
            name: cube.name.clone(),
            owner: cube.owner.id.clone(),
            visibility: cube.visibility,
            featured: cube.featured,
            category_override: cube.category_override.clone(),
            category_prefixes: cube.category_prefixes.clone(),
            tags: cube.tags.clone(),
            description: cube.description.clone(),
            image_name: cube.image_name.clone(),
            following: cube.following.clone(),
            card_count: cube.card_count,
            date_created: cube.date_created,
            date_last_updated: cube.date_last_updated,
        }
    }

    async fn hydrate_batch(&self, stored: Vec<StoredCube>) -> Result<Vec<Cube>> {
        if stored.is_empty() {
            return Ok(Vec::new());
        }

        let owner_ids: Vec<String> = stored
            .iter()
            .map(|cube| cube.owner.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let owners: HashMap<String, User> = self
            .users
            .batch_get(&owner_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        Ok(stored
            .into_iter()
            .map(|cube| {
                let owner = match owners.get(&cube.owner) {
                    Some(user) => user.clone(),
                    None => {
                        warn!(cube_id = %cube.id, owner_id = %cube.owner, "cube owner not found");
                        User::deleted_placeholder(&cube.owner)
                    }
                };
                Cube {
                    id: cube.id,
                    short_id: cube.short_id,
                    name: cube.name,
                    owner,
                    visibility: cube.visibility,
                    featured: cube.featured,
                    category_override: cube.category_override,
                    category_prefixes: cube.category_prefixes,
                    tags: cube.tags,
                    description: cube.description,
                    image_name: cube.image_name,
                    following: cube.following,
                    card_count: cube.card_count,
                    date_created: cube.date_created,
                    date_last_updated: cube.date_last_updated,
                }
            })
            .collect())
    }
}

impl KeySpec for CubeCodec {
    type Entity = Cube;

    fn partition_key(&self, cube: &Cube) -> String {
        cube_pk(&cube.id)
    }

    fn sort_key(&self, _cube: &Cube) -> String {
        CUBE_ITEM_TYPE.to_string()
    }

    fn gsi_keys(&self, cube: &Cube) -> [Option<IndexKey>; 4] {
        let date = format!("DATE#{:015}", cube.date_last_updated);
        [
            Some(IndexKey::new(
                format!("CUBE#OWNER#{}", cube.owner.id),
                date.clone(),
            )),
            Some(IndexKey::new(
                format!("CUBE#VIS#{}", cube.visibility.code()),
                date,
            )),
            Some(IndexKey::new(
                format!("CUBE#SHARD#{}", shard_of(&cube.id)),
                cube_pk(&cube.id),
            )),
            None,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Cube {
        Cube {
            id: "abc".into(),
            short_id: Some("MyCube".into()),
            name: "Vintage Cube Redux".into(),
            owner: User {
                id: "u1".into(),
                username: "ada".into(),
                image_name: None,
            },
            visibility: Visibility::Public,
            featured: true,
            category_override: Some("Vintage".into()),
            category_prefixes: vec!["Powered".into()],
            tags: vec!["Legacy".into(), "vintage".into()],
            description: String::new(),
            image_name: None,
            following: vec!["u2".into(), "u3".into()],
            card_count: 540,
            date_created: 1_000,
            date_last_updated: 2_000,
        }
    }

    #[test]
    fn search_doc_lowercases_and_covers_all_categories() {
        let doc = sample().search_doc();
        let has = |category: &str, value: &str| {
            doc.criteria
                .iter()
                .any(|c| c.category == category && c.value == value)
        };

        assert!(has("cube", "all"));
        assert!(has("shortid", "mycube"));
        assert!(has("featured", "true"));
        assert!(has("category", "vintage"));
        assert!(has("category", "powered"));
        assert!(has("tag", "legacy"));
        assert!(has("tag", "vintage"));
        assert!(has("keywords", "vintage cube redux"));
        assert!(has("keywords", "cube redux"));
        assert!(has("keywords", "redux"));

        assert_eq!(doc.sort.popularity, 2);
        assert_eq!(doc.sort.size, 540);
        assert_eq!(doc.sort.updated_at_ms, 2_000);
    }

    #[test]
    fn card_criteria_cover_both_boards_and_deduplicate() {
        let entry = |card_id: &str| CardEntry {
            card_id: card_id.to_string(),
            ..Default::default()
        };
        let cards = CubeCards {
            mainboard: vec![
                entry("Black-Lotus"),
                entry("black-lotus"),
                entry("ancestral-recall"),
            ],
            maybeboard: vec![entry("timetwister")],
        };

        let doc = sample().search_doc_with_cards(&cards);
        let values = |category: &str| -> Vec<&str> {
            doc.criteria
                .iter()
                .filter(|c| c.category == category)
                .map(|c| c.value.as_str())
                .collect()
        };

        assert_eq!(values("card"), vec!["ancestral-recall", "black-lotus"]);
        assert_eq!(values("maybe"), vec!["timetwister"]);
        // Metadata criteria are still present alongside the card ones.
        assert_eq!(values("cube"), vec!["all"]);
        assert_eq!(doc.sort, sample().sort_attributes());
    }

    #[test]
    fn visibility_codes_round_trip_through_serde() {
        for (visibility, code) in [
            (Visibility::Public, "\"pu\""),
            (Visibility::Private, "\"pr\""),
            (Visibility::Unlisted, "\"un\""),
        ] {
            assert_eq!(serde_json::to_string(&visibility).unwrap(), code);
            let parsed: Visibility = serde_json::from_str(code).unwrap();
            assert_eq!(parsed, visibility);
        }
    }

    #[test]
    fn shard_is_stable_and_bounded() {
        for id in ["abc", "xyz", "", "a-very-long-cube-identifier"] {
            assert!(shard_of(id) < SHARD_COUNT);
            assert_eq!(shard_of(id), shard_of(id));
        }
    }
}
