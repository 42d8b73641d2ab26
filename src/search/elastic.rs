use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{IndexName, SearchHits, SearchIndex, SearchQuery};
use crate::config::SearchConfig;

/// Elasticsearch over its REST API, one API key per logical index.
#[derive(Clone)]
pub struct ElasticSearch {
    client: Client,
    config: SearchConfig,
}

impl ElasticSearch {
    pub fn new(config: SearchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("build search http client")?;
        Ok(Self { client, config })
    }

    fn authed(&self, req: RequestBuilder, index: Option<IndexName>) -> RequestBuilder {
        let key = match index {
            Some(index) => self.config.api_key(index),
            None => self.config.default_api_key.as_deref(),
        };
        match key {
            Some(key) => req.header(reqwest::header::AUTHORIZATION, format!("ApiKey {key}")),
            None => req,
        }
    }

    fn doc_url(&self, index: IndexName, id: i64) -> String {
        format!("{}/{}/_doc/{}", self.config.endpoint, index.as_str(), id)
    }
}

async fn ensure_success(resp: Response, what: &str) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("{what} returned {status}: {body}")
}

pub(crate) fn query_body(query: &SearchQuery) -> Value {
    match query {
        SearchQuery::Match { field, text } => json!({
            "query": { "match": { (*field): text } },
            "track_total_hits": true
        }),
        SearchQuery::Terms { field, values } => json!({
            "query": { "bool": { "must": [ { "terms": { (*field): values } } ] } },
            "track_total_hits": true
        }),
    }
}

pub(crate) fn parse_hits(body: &Value) -> anyhow::Result<SearchHits> {
    let hits = body.get("hits").context("search response without hits")?;
    let documents: Vec<Value> = hits
        .get("hits")
        .and_then(Value::as_array)
        .context("search response without hits.hits")?
        .iter()
        .filter_map(|hit| hit.get("_source").cloned())
        .collect();
    // `total` is an object on 7.x+, a bare number on older clusters
    let total = match hits.get("total") {
        Some(Value::Object(t)) => t.get("value").and_then(Value::as_u64),
        Some(v) => v.as_u64(),
        None => None,
    }
    .unwrap_or(documents.len() as u64);
    Ok(SearchHits { total, documents })
}

#[async_trait]
impl SearchIndex for ElasticSearch {
    async fn upsert(&self, index: IndexName, id: i64, document: &Value) -> anyhow::Result<()> {
        let req = self.client.put(self.doc_url(index, id)).json(document);
        let resp = self
            .authed(req, Some(index))
            .send()
            .await
            .with_context(|| format!("index {}/{}", index.as_str(), id))?;
        ensure_success(resp, "index document").await?;
        debug!(index = index.as_str(), id, "document indexed");
        Ok(())
    }

    async fn delete(&self, index: IndexName, id: i64) -> anyhow::Result<()> {
        let req = self.client.delete(self.doc_url(index, id));
        let resp = self
            .authed(req, Some(index))
            .send()
            .await
            .with_context(|| format!("delete {}/{}", index.as_str(), id))?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(index = index.as_str(), id, "document already absent");
            return Ok(());
        }
        ensure_success(resp, "delete document").await?;
        debug!(index = index.as_str(), id, "document deleted");
        Ok(())
    }

    async fn search(&self, index: IndexName, query: &SearchQuery) -> anyhow::Result<SearchHits> {
        let url = format!("{}/{}/_search", self.config.endpoint, index.as_str());
        let req = self.client.post(url).json(&query_body(query));
        let resp = self
            .authed(req, Some(index))
            .send()
            .await
            .with_context(|| format!("search {}", index.as_str()))?;
        let body: Value = ensure_success(resp, "search")
            .await?
            .json()
            .await
            .context("decode search response")?;
        parse_hits(&body)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let req = self.client.get(format!("{}/", self.config.endpoint));
        let resp = self
            .authed(req, None)
            .send()
            .await
            .context("connect to search cluster")?;
        ensure_success(resp, "search cluster info").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_query_shape() {
        let body = query_body(&SearchQuery::Match {
            field: "name",
            text: "pho".into(),
        });
        assert_eq!(body["query"]["match"]["name"], "pho");
        assert_eq!(body["track_total_hits"], true);
    }

    #[test]
    fn terms_query_targets_nested_ingredient_ids() {
        let body = query_body(&SearchQuery::Terms {
            field: "ingredients.ingredient_id",
            values: vec![3, 9],
        });
        assert_eq!(
            body["query"]["bool"]["must"][0]["terms"]["ingredients.ingredient_id"],
            json!([3, 9])
        );
    }

    #[test]
    fn parses_modern_and_legacy_totals() {
        let modern = json!({
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_id": "1", "_source": { "id": 1, "name": "bun bo" } },
                    { "_id": "2", "_source": { "id": 2, "name": "bun cha" } }
                ]
            }
        });
        let hits = parse_hits(&modern).unwrap();
        assert_eq!(hits.total, 2);
        assert_eq!(hits.documents[1]["name"], "bun cha");

        let legacy = json!({ "hits": { "total": 5, "hits": [] } });
        assert_eq!(parse_hits(&legacy).unwrap().total, 5);
    }

    #[test]
    fn error_body_without_hits_is_rejected() {
        assert!(parse_hits(&json!({ "error": "index_not_found" })).is_err());
    }

    #[test]
    fn document_urls() {
        let es = ElasticSearch::new(SearchConfig {
            endpoint: "http://es:9200".into(),
            default_api_key: None,
            api_keys: Default::default(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(es.doc_url(IndexName::Pantries, 14), "http://es:9200/pantries/_doc/14");
    }
}
