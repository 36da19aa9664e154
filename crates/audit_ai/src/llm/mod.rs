use audit_core::error::AppError;

/// One system + user exchange asking for a JSON object back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: Option<u32>,
}

/// Generative backend. Returns the raw reply text; validating it is the
/// caller's job.
pub trait Llm: Send + Sync {
    fn complete(&self, req: &CompletionRequest<'_>) -> Result<String, AppError>;
}

pub mod openai_llm;

pub use openai_llm::OpenAiLlm;
