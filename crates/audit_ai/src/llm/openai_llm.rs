use std::time::Duration;

use audit_core::config::{OpenAiConfig, RetryConfig};
use audit_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, Llm};
use crate::http::HttpClient;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    client: HttpClient,
    model: String,
}

impl OpenAiLlm {
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
        Ok(Self::new(client, openai.chat_model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl Llm for OpenAiLlm {
    fn complete(&self, req: &CompletionRequest<'_>) -> Result<String, AppError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: req.system,
                },
                ChatMessage {
                    role: "user",
                    content: req.user,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
            max_tokens: req.max_tokens,
        };
        let body = serde_json::to_value(body).map_err(|e| {
            AppError::new("AI_LLM_FAILED", "Failed to encode completion request")
                .with_details(e.to_string())
        })?;

        let raw = self.client.post_json("AI_LLM_FAILED", "/chat/completions", &body)?;
        let resp: ChatResponse = serde_json::from_value(raw).map_err(|e| {
            AppError::new("AI_LLM_FAILED", "Failed to decode completion response")
                .with_details(e.to_string())
        })?;

        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AppError::new("AI_LLM_FAILED", "Completion response was empty"));
        }
        Ok(content)
    }
}
