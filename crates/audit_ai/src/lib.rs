pub mod breaker;
pub mod citations;
pub mod context;
pub mod embeddings;
pub mod http;
pub mod index;
pub mod intent;
pub mod judge;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod retrieve;
pub mod retry;
pub mod store;

pub use pipeline::{AuditorSettings, ComplianceAuditor};
