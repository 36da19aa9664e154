use audit_core::error::AppError;

/// Maps text to a fixed-dimension vector.
///
/// Implementations flag rate limits and connection failures as `retryable`.
pub trait Embedder: Send + Sync {
    fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;

    /// Same-order vectors for `inputs`.
    fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        inputs.iter().map(|s| self.embed(s)).collect()
    }
}

pub mod openai_embed;

pub use openai_embed::OpenAiEmbedder;
