//! Pure hash computation and sort-attribute encoding.
//!
//! Everything here is deterministic and I/O-free: the same criteria
//! always hash to the same partition regardless of input order, and the
//! padded sort encodings compare lexicographically exactly as their
//! numeric values compare.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use cubedb_core::types::SortOrder;

/// One search predicate: a category and a value within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Criterion {
    pub category: String,
    pub value: String,
}

impl Criterion {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

/// Hash of a criteria set, scoped to one entity type.
///
/// The criteria are rendered as `category:value` strings, the item-type
/// discriminator is appended, the list is sorted and joined, and the
/// result is SHA-256 hex. Sorting makes the hash independent of input
/// order; the discriminator keeps identical criteria of different entity
/// types in different partitions.
pub fn search_hash(item_type: &str, criteria: &[Criterion]) -> String {
    let mut parts: Vec<String> = criteria
        .iter()
        .map(|c| format!("{}:{}", c.category, c.value))
        .collect();
    parts.push(format!("itemtype:{item_type}"));
    parts.sort();

    let mut hasher = Sha256::new();
    hasher.update(parts.join(",").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Every contiguous token slice of a name, for phrase search.
///
/// The name is lowercased, punctuation becomes whitespace, and each
/// `(i, j)` token window is emitted joined by single spaces. Quadratic
/// fan-out in token count buys O(1) lookup of any phrase at query time;
/// names are short enough that the write amplification stays modest.
pub fn keyword_slices(name: &str) -> Vec<String> {
    let normalized = name.to_lowercase();
    let tokens: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut slices = BTreeSet::new();
    for i in 0..tokens.len() {
        for j in i + 1..=tokens.len() {
            slices.insert(tokens[i..j].join(" "));
        }
    }
    slices.into_iter().collect()
}

/// A query phrase in the same normal form [`keyword_slices`] writes:
/// lowercased tokens joined by single spaces.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The per-dimension sort values a hash row carries on its GSIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortAttributes {
    /// Follower count.
    pub popularity: u64,
    /// Display name; lowercased for the alphabetical dimension.
    pub name: String,
    /// Card count.
    pub size: u64,
    /// Last-updated timestamp, epoch milliseconds.
    pub updated_at_ms: u64,
}

impl SortAttributes {
    /// GSI sort key for one dimension. Numeric dimensions are
    /// zero-padded so string order equals numeric order.
    pub fn gsi_sort(&self, order: SortOrder) -> String {
        match order {
            SortOrder::Popularity => format!("FOLLOWERS#{:010}", self.popularity),
            SortOrder::Alphabetical => format!("NAME#{}", self.name.to_lowercase()),
            SortOrder::Cards => cards_sort(self.size),
            SortOrder::Date => format!("DATE#{:015}", self.updated_at_ms),
        }
    }
}

/// Card-count sort encoding, shared with range-filter construction.
pub fn cards_sort(count: u64) -> String {
    format!("CARDS#{:010}", count)
}

/// What one entity contributes to the index: its criteria and the sort
/// attributes every resulting hash row carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDoc {
    pub item_type: &'static str,
    pub criteria: Vec<Criterion>,
    pub sort: SortAttributes,
}

impl SearchDoc {
    /// The hash partitions this document occupies, one per criterion.
    pub fn hashes(&self) -> BTreeSet<String> {
        self.criteria
            .iter()
            .map(|c| search_hash(self.item_type, std::slice::from_ref(c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_order_independent() {
        let a = Criterion::new("tag", "vintage");
        let b = Criterion::new("category", "legacy");
        let forward = search_hash("CUBE", &[a.clone(), b.clone()]);
        let reverse = search_hash("CUBE", &[b, a]);
        assert_eq!(forward, reverse);
        assert_eq!(forward.len(), 64);
        assert!(forward.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_discriminates_item_type_and_value() {
        let tag = Criterion::new("tag", "vintage");
        assert_ne!(
            search_hash("CUBE", std::slice::from_ref(&tag)),
            search_hash("DECK", std::slice::from_ref(&tag))
        );
        assert_ne!(
            search_hash("CUBE", &[Criterion::new("tag", "vintage")]),
            search_hash("CUBE", &[Criterion::new("tag", "legacy")])
        );
        // category:value is positional, not concatenative
        assert_ne!(
            search_hash("CUBE", &[Criterion::new("tag", "x")]),
            search_hash("CUBE", &[Criterion::new("ta", "gx")])
        );
    }

    #[test]
    fn keyword_slices_cover_every_contiguous_phrase() {
        let slices = keyword_slices("Vintage Cube Redux");
        assert_eq!(
            slices,
            vec![
                "cube",
                "cube redux",
                "redux",
                "vintage",
                "vintage cube",
                "vintage cube redux",
            ]
        );
    }

    #[test]
    fn keyword_slices_normalize_case_and_punctuation() {
        assert_eq!(
            keyword_slices("Peasant-Cube!"),
            vec!["cube", "peasant", "peasant cube"]
        );
        assert!(keyword_slices("").is_empty());
        assert!(keyword_slices("  --  ").is_empty());
    }

    #[test]
    fn padded_sorts_order_numerically() {
        let small = SortAttributes {
            popularity: 9,
            name: "Alpha".into(),
            size: 360,
            updated_at_ms: 1_000,
        };
        let large = SortAttributes {
            popularity: 10,
            name: "beta".into(),
            size: 720,
            updated_at_ms: 20_000,
        };
        for order in [
            SortOrder::Popularity,
            SortOrder::Alphabetical,
            SortOrder::Cards,
            SortOrder::Date,
        ] {
            assert!(small.gsi_sort(order) < large.gsi_sort(order), "{order:?}");
        }
        assert_eq!(small.gsi_sort(SortOrder::Cards), "CARDS#0000000360");
        assert_eq!(small.gsi_sort(SortOrder::Alphabetical), "NAME#alpha");
    }

    #[test]
    fn doc_hashes_dedupe_repeated_criteria() {
        let doc = SearchDoc {
            item_type: "CUBE",
            criteria: vec![
                Criterion::new("tag", "vintage"),
                Criterion::new("tag", "vintage"),
                Criterion::new("keywords", "vintage"),
            ],
            sort: SortAttributes::default(),
        };
        assert_eq!(doc.hashes().len(), 2);
    }
}
