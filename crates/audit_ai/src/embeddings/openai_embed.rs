use std::time::Duration;

use audit_core::config::{OpenAiConfig, RetryConfig};
use audit_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::http::HttpClient;
use crate::retry::RetryPolicy;

// Keep requests bounded; chunking already produces paragraph-sized inputs.
const MAX_INPUT_CHARS: usize = 12_000;

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: HttpClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: HttpClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(openai: &OpenAiConfig, retry: &RetryConfig) -> Result<Self, AppError> {
        let client = HttpClient::new(&openai.base_url)?
            .with_bearer(&openai.api_key)
            .with_timeout(Duration::from_secs(openai.timeout_secs))
            .with_retry(RetryPolicy::from_config(retry));
        Ok(Self::new(client, openai.embedding_model.clone()))
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

fn prepare_input(text: &str) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => flat[..idx].to_string(),
        None => flat,
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        let mut out = self.embed_batch(&[input.to_string()])?;
        out.pop().ok_or_else(|| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Embeddings response was empty")
        })
    }

    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let req = EmbeddingsRequest {
            model: &self.model,
            input: inputs.iter().map(|s| prepare_input(s)).collect(),
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to encode embeddings request")
                .with_details(e.to_string())
        })?;

        let raw = self.client.post_json("AI_EMBEDDINGS_FAILED", "/embeddings", &body)?;
        let mut resp: EmbeddingsResponse = serde_json::from_value(raw).map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                .with_details(e.to_string())
        })?;

        if resp.data.len() != inputs.len() {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embeddings response count does not match inputs",
            )
            .with_details(format!("inputs={}; vectors={}", inputs.len(), resp.data.len())));
        }

        // The API does not promise response order; `index` does.
        resp.data.sort_by_key(|item| item.index);
        let mut out = Vec::with_capacity(resp.data.len());
        for item in resp.data {
            if item.embedding.is_empty() {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Embeddings response contained an empty vector",
                )
                .with_details(format!("index={}", item.index)));
            }
            out.push(item.embedding);
        }
        Ok(out)
    }
}
