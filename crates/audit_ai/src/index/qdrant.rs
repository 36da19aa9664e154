use std::time::Duration;

use audit_core::config::{QdrantConfig, RetryConfig};
use audit_core::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{EvidenceIndex, IndexHit, SearchFilter};
use crate::http::HttpClient;
use crate::retry::RetryPolicy;

/// Qdrant collection queried over its REST API.
///
/// Points carry `source_type` and `source_id` payload fields written at
/// ingestion time; filters are expressed against those.
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    client: HttpClient,
    collection: String,
}

impl QdrantIndex {
    pub fn new(client: HttpClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    pub fn from_config(qdrant: &QdrantConfig, retry: &RetryConfig) -> Result<Self, AppError> {
        let mut client = HttpClient::new(&qdrant.url)?
            .with_timeout(Duration::from_secs(10))
            .with_retry(RetryPolicy::from_config(retry));
        if let Some(key) = qdrant.api_key.as_deref() {
            client = client.with_header("api-key", key);
        }
        Ok(Self::new(client, qdrant.collection.clone()))
    }

    fn search_body(vector: &[f32], limit: usize, min_score: f32, filter: &SearchFilter) -> Value {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": false,
        });
        if let Some(f) = payload_filter(filter) {
            body["filter"] = f;
        }
        body
    }
}

fn payload_filter(filter: &SearchFilter) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(category) = filter.category {
        must.push(json!({"key": "source_type", "match": {"value": category.as_str()}}));
    }
    if let Some(doc) = filter.document_id.as_deref() {
        must.push(json!({"key": "source_id", "match": {"value": doc}}));
    }
    (!must.is_empty()).then(|| json!({ "must": must }))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
}

/// Qdrant ids are either UUID strings or unsigned integers.
fn point_id(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_u64().map(|n| n.to_string()),
        _ => None,
    }
}

impl EvidenceIndex for QdrantIndex {
    fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<IndexHit>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let body = Self::search_body(vector, limit, min_score, filter);
        let path = format!("/collections/{}/points/search", self.collection);
        let raw = self.client.post_json("AI_INDEX_QUERY_FAILED", &path, &body)?;
        let resp: SearchResponse = serde_json::from_value(raw).map_err(|e| {
            AppError::new("AI_INDEX_QUERY_FAILED", "Failed to decode Qdrant search response")
                .with_details(e.to_string())
        })?;

        let mut hits = Vec::with_capacity(resp.result.len());
        for p in resp.result {
            let chunk_id = point_id(&p.id).ok_or_else(|| {
                AppError::new("AI_INDEX_QUERY_FAILED", "Qdrant returned an unsupported point id")
                    .with_details(format!("id={}", p.id))
            })?;
            hits.push(IndexHit {
                chunk_id,
                score: p.score,
            });
        }
        hits.truncate(limit);
        Ok(hits)
    }
}
