//! Full-text search mirror.
//!
//! Postgres is authoritative. Every searchable write records an outbox event in
//! its own transaction; [`sync`] turns those events into index upserts/deletes,
//! right after commit and again from the background relay until they stick.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod elastic;
#[cfg(test)]
pub mod memory;
pub mod outbox;
pub mod sync;

pub use elastic::ElasticSearch;
pub use outbox::OutboxOp;

/// One logical index per searchable entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexName {
    Recipes,
    Ingredients,
    Tools,
    Pantries,
    Products,
}

impl IndexName {
    pub const ALL: [IndexName; 5] = [
        IndexName::Recipes,
        IndexName::Ingredients,
        IndexName::Tools,
        IndexName::Pantries,
        IndexName::Products,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexName::Recipes => "recipes",
            IndexName::Ingredients => "ingredients",
            IndexName::Tools => "tools",
            IndexName::Pantries => "pantries",
            IndexName::Products => "products",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Engine-default `match` on one text field.
    Match { field: &'static str, text: String },
    /// Documents whose (possibly nested) field equals any of the values.
    Terms { field: &'static str, values: Vec<i64> },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchHits {
    pub total: u64,
    pub documents: Vec<Value>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Creates or replaces the document stored under `id`.
    async fn upsert(&self, index: IndexName, id: i64, document: &Value) -> anyhow::Result<()>;
    /// Removes the document; a document that is already gone is not an error.
    async fn delete(&self, index: IndexName, id: i64) -> anyhow::Result<()>;
    async fn search(&self, index: IndexName, query: &SearchQuery) -> anyhow::Result<SearchHits>;
    /// Connectivity check run once at startup.
    async fn ping(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_round_trip_through_strings() {
        for index in IndexName::ALL {
            assert_eq!(IndexName::parse(index.as_str()), Some(index));
        }
        assert_eq!(IndexName::parse("categories"), None);
    }

    #[test]
    fn index_names_key_ordered_maps() {
        let mut docs = std::collections::BTreeMap::new();
        docs.insert((IndexName::Products, 1), "jam");
        docs.insert((IndexName::Recipes, 2), "pho");
        docs.insert((IndexName::Recipes, 1), "caprese");
        let order: Vec<_> = docs.values().copied().collect();
        assert_eq!(order, ["caprese", "pho", "jam"]);
    }
}
