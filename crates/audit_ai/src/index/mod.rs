use audit_core::domain::SourceCategory;
use audit_core::error::AppError;
use serde::{Deserialize, Serialize};

mod local;
mod qdrant;
mod similarity;

pub use local::{IndexEntry, LocalVectorIndex};
pub use qdrant::QdrantIndex;

/// Nearest-neighbour hit; `chunk_id` joins against the source-of-truth store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexHit {
    pub chunk_id: String,
    pub score: f32,
}

/// Optional payload restriction applied by the index itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub category: Option<SourceCategory>,
    pub document_id: Option<String>,
}

impl SearchFilter {
    pub fn category(category: SourceCategory) -> Self {
        Self {
            category: Some(category),
            document_id: None,
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }
}

/// Vector similarity index. Results are ordered best-first, contain at most
/// `limit` hits, and only hits scoring at least `min_score`.
pub trait EvidenceIndex: Send + Sync {
    fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<IndexHit>, AppError>;
}
