use std::sync::Arc;

use audit_core::domain::{AuditFailure, Confidence, Intent, Judgment, Status};
use audit_core::error::AppError;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::llm::{CompletionRequest, Llm};
use crate::prompts;

/// Everything that can go wrong between "breaker passed" and "judgment in
/// hand". None of these is ever turned into an INCONCLUSIVE verdict.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The reply was not JSON at all.
    #[error("model reply is not valid JSON: {0}")]
    Parse(String),
    /// JSON, but not the judgment contract (unknown status, missing field, ...).
    #[error("model reply does not match the judgment schema: {0}")]
    Validation(String),
    /// The backend kept failing transiently until retries ran out.
    #[error("generative backend unavailable: {0}")]
    Transient(AppError),
    #[error("generative backend failed: {0}")]
    Backend(AppError),
}

impl JudgeError {
    pub fn code(&self) -> &'static str {
        match self {
            JudgeError::Parse(_) => "AI_JUDGMENT_PARSE_FAILED",
            JudgeError::Validation(_) => "AI_JUDGMENT_SCHEMA_MISMATCH",
            JudgeError::Transient(_) => "AI_BACKEND_UNAVAILABLE",
            JudgeError::Backend(_) => "AI_BACKEND_FAILED",
        }
    }

    /// Caller-facing error record.
    pub fn to_failure(&self) -> AuditFailure {
        let reason = match self {
            JudgeError::Parse(_) => "Model parsing failed".to_string(),
            JudgeError::Validation(_) => "Model output schema mismatch".to_string(),
            JudgeError::Transient(_) => "Generative backend unavailable after retries".to_string(),
            JudgeError::Backend(e) => e.message.clone(),
        };
        AuditFailure::new(self.code(), reason)
    }
}

impl From<AppError> for JudgeError {
    fn from(e: AppError) -> Self {
        if e.retryable {
            JudgeError::Transient(e)
        } else {
            JudgeError::Backend(e)
        }
    }
}

/// Exactly the fields the generator is asked for. The intent tag is not
/// among them; it is attached afterwards.
#[derive(Debug, Deserialize)]
struct JudgmentReply {
    status: Status,
    confidence: Confidence,
    reasoning: String,
    citations: Vec<String>,
}

/// Parse and validate a raw reply against the judgment contract.
pub fn parse_judgment(raw: &str, intent: Intent) -> Result<Judgment, JudgeError> {
    let value: serde_json::Value =
        serde_json::from_str(raw.trim()).map_err(|e| JudgeError::Parse(e.to_string()))?;
    let reply: JudgmentReply =
        serde_json::from_value(value).map_err(|e| JudgeError::Validation(e.to_string()))?;
    Ok(Judgment {
        status: reply.status,
        confidence: reply.confidence,
        reasoning: reply.reasoning,
        citations: reply.citations,
        intent,
    })
}

/// Schema-constrained verdict generation over an assembled context.
#[derive(Clone)]
pub struct JudgmentGenerator {
    llm: Arc<dyn Llm>,
}

impl JudgmentGenerator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    pub fn judge(&self, query: &str, context: &str, intent: Intent) -> Result<Judgment, JudgeError> {
        let user = prompts::audit_user_message(query, context);
        info!(context_chars = context.len(), "sending audit request to generative backend");

        let raw = self
            .llm
            .complete(&CompletionRequest {
                system: prompts::auditor_prompt(),
                user: &user,
                max_tokens: None,
            })
            .map_err(|e| {
                error!(error = %e, retryable = e.retryable, "generative backend call failed");
                JudgeError::from(e)
            })?;

        parse_judgment(&raw, intent).map_err(|e| {
            error!(error = %e, "generative reply rejected");
            e
        })
    }
}
