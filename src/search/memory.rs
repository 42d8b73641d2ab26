use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{IndexName, SearchHits, SearchIndex, SearchQuery};

/// In-process index used by tests in place of Elasticsearch.
#[derive(Default)]
pub struct MemoryIndex {
    docs: Mutex<BTreeMap<(IndexName, i64), Value>>,
    fail_writes: Mutex<bool>,
}

impl MemoryIndex {
    pub fn get(&self, index: IndexName, id: i64) -> Option<Value> {
        self.docs.lock().unwrap().get(&(index, id)).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if *self.fail_writes.lock().unwrap() {
            anyhow::bail!("index unavailable");
        }
        Ok(())
    }
}

/// Collects every scalar reachable through a dotted path, flattening arrays.
fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .flat_map(|v| match v {
                Value::Array(items) => items.iter().filter_map(|i| i.get(segment)).collect(),
                other => other.get(segment).into_iter().collect::<Vec<_>>(),
            })
            .collect();
    }
    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .collect()
}

fn matches(doc: &Value, query: &SearchQuery) -> bool {
    match query {
        SearchQuery::Match { field, text } => {
            let wanted: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
            values_at(doc, field).into_iter().any(|v| {
                v.as_str().is_some_and(|s| {
                    s.split_whitespace()
                        .map(str::to_lowercase)
                        .any(|token| wanted.contains(&token))
                })
            })
        }
        SearchQuery::Terms { field, values } => values_at(doc, field)
            .into_iter()
            .any(|v| v.as_i64().is_some_and(|n| values.contains(&n))),
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn upsert(&self, index: IndexName, id: i64, document: &Value) -> anyhow::Result<()> {
        self.check_writable()?;
        self.docs
            .lock()
            .unwrap()
            .insert((index, id), document.clone());
        Ok(())
    }

    async fn delete(&self, index: IndexName, id: i64) -> anyhow::Result<()> {
        self.check_writable()?;
        self.docs.lock().unwrap().remove(&(index, id));
        Ok(())
    }

    async fn search(&self, index: IndexName, query: &SearchQuery) -> anyhow::Result<SearchHits> {
        let documents: Vec<Value> = self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((i, _), doc)| *i == index && matches(doc, query))
            .map(|(_, doc)| doc.clone())
            .collect();
        Ok(SearchHits {
            total: documents.len() as u64,
            documents,
        })
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn match_is_token_based_and_case_insensitive() {
        let idx = MemoryIndex::default();
        idx.upsert(IndexName::Tools, 1, &json!({ "name": "Cast Iron Pan" }))
            .await
            .unwrap();
        idx.upsert(IndexName::Tools, 2, &json!({ "name": "Whisk" }))
            .await
            .unwrap();
        let q = SearchQuery::Match {
            field: "name",
            text: "pan".into(),
        };
        let hits = idx.search(IndexName::Tools, &q).await.unwrap();
        assert_eq!(hits.total, 1);
        assert_eq!(hits.documents[0]["name"], "Cast Iron Pan");
        assert_eq!(idx.search(IndexName::Recipes, &q).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn terms_walk_nested_arrays() {
        let idx = MemoryIndex::default();
        let doc = json!({ "ingredients": [ { "ingredient_id": 4 }, { "ingredient_id": 8 } ] });
        idx.upsert(IndexName::Recipes, 1, &doc).await.unwrap();
        let hit = SearchQuery::Terms {
            field: "ingredients.ingredient_id",
            values: vec![8, 100],
        };
        let miss = SearchQuery::Terms {
            field: "ingredients.ingredient_id",
            values: vec![5],
        };
        assert_eq!(idx.search(IndexName::Recipes, &hit).await.unwrap().total, 1);
        assert_eq!(idx.search(IndexName::Recipes, &miss).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn failing_writes_leave_documents_untouched() {
        let idx = MemoryIndex::default();
        idx.upsert(IndexName::Products, 3, &json!({ "title": "jam" }))
            .await
            .unwrap();
        idx.set_fail_writes(true);
        assert!(idx.delete(IndexName::Products, 3).await.is_err());
        assert!(idx.get(IndexName::Products, 3).is_some());
    }
}
