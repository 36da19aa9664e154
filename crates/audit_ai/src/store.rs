use audit_core::domain::EvidenceChunk;
use audit_core::error::AppError;
use audit_core::repo::ChunkStore;

/// Authoritative chunk records, looked up in one batch per query.
pub trait SourceStore: Send + Sync {
    /// Ids with no record are absent from the result; order is unspecified.
    fn fetch_many(&self, ids: &[String]) -> Result<Vec<EvidenceChunk>, AppError>;
}

impl SourceStore for ChunkStore {
    fn fetch_many(&self, ids: &[String]) -> Result<Vec<EvidenceChunk>, AppError> {
        ChunkStore::fetch_many(self, ids)
    }
}
