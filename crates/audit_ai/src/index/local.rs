use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use audit_core::domain::SourceCategory;
use audit_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::similarity::{cosine_with_norm, l2_norm};
use super::{EvidenceIndex, IndexHit, SearchFilter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub category: SourceCategory,
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Snapshot {
    dims: Option<usize>,
    entries: BTreeMap<String, IndexEntry>,
}

/// In-process cosine-similarity index.
///
/// Ordering is deterministic: score descending, then chunk id ascending.
#[derive(Debug, Clone, Default)]
pub struct LocalVectorIndex {
    dims: Option<usize>,
    entries: BTreeMap<String, IndexEntry>,
}

impl LocalVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Insert or replace the vector for `chunk_id`. Every vector in one index
    /// must share the same dimension.
    pub fn upsert(&mut self, chunk_id: impl Into<String>, entry: IndexEntry) -> Result<(), AppError> {
        let chunk_id = chunk_id.into();
        if entry.vector.is_empty() {
            return Err(AppError::new("AI_INDEX_UPSERT_FAILED", "Index vector is empty")
                .with_details(format!("chunk_id={chunk_id}")));
        }
        match self.dims {
            Some(d) if d != entry.vector.len() => {
                return Err(AppError::new("AI_INDEX_UPSERT_FAILED", "Index vector dims mismatch")
                    .with_details(format!(
                        "chunk_id={chunk_id}; expected={d}; got={}",
                        entry.vector.len()
                    )));
            }
            Some(_) => {}
            None => self.dims = Some(entry.vector.len()),
        }
        self.entries.insert(chunk_id, entry);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let bytes = fs::read(path).map_err(|e| {
            AppError::new("AI_INDEX_LOAD_FAILED", "Failed to read index snapshot")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let snap: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new("AI_INDEX_LOAD_FAILED", "Failed to decode index snapshot")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        if let Some(d) = snap.dims {
            if let Some((id, _)) = snap.entries.iter().find(|(_, e)| e.vector.len() != d) {
                return Err(AppError::new("AI_INDEX_LOAD_FAILED", "Index snapshot dims mismatch")
                    .with_details(format!("chunk_id={id}; expected={d}")));
            }
        }
        Ok(Self {
            dims: snap.dims,
            entries: snap.entries,
        })
    }

    /// Write the snapshot next to `path` and rename it into place.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let snap = Snapshot {
            dims: self.dims,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec(&snap).map_err(|e| {
            AppError::new("AI_INDEX_SAVE_FAILED", "Failed to encode index snapshot")
                .with_details(e.to_string())
        })?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| {
            AppError::new("AI_INDEX_SAVE_FAILED", "Failed to write index snapshot")
                .with_details(format!("path={}; err={}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            AppError::new("AI_INDEX_SAVE_FAILED", "Failed to finalize index snapshot write")
                .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
        })
    }
}

fn matches(entry: &IndexEntry, filter: &SearchFilter) -> bool {
    filter.category.map_or(true, |c| c == entry.category)
        && filter
            .document_id
            .as_deref()
            .map_or(true, |d| d == entry.document_id)
}

impl EvidenceIndex for LocalVectorIndex {
    fn search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<IndexHit>, AppError> {
        if limit == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(d) = self.dims {
            if d != vector.len() {
                return Err(AppError::new(
                    "AI_INDEX_QUERY_FAILED",
                    "Query vector dims do not match index dims",
                )
                .with_details(format!("index_dims={d}; query_dims={}", vector.len())));
            }
        }
        let qnorm = l2_norm(vector);
        if qnorm == 0.0 {
            return Err(AppError::new("AI_INDEX_QUERY_FAILED", "Query vector norm is zero"));
        }

        let mut hits: Vec<IndexHit> = self
            .entries
            .iter()
            .filter(|(_, e)| matches(e, filter))
            .filter_map(|(id, e)| {
                cosine_with_norm(vector, qnorm, &e.vector).map(|score| IndexHit {
                    chunk_id: id.clone(),
                    score,
                })
            })
            .filter(|h| h.score >= min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vector: Vec<f32>, category: SourceCategory, doc: &str) -> IndexEntry {
        IndexEntry {
            vector,
            category,
            document_id: doc.to_string(),
        }
    }

    fn sample() -> LocalVectorIndex {
        let mut idx = LocalVectorIndex::new();
        idx.upsert("reg-a", entry(vec![1.0, 0.0], SourceCategory::Regulation, "osfi")).unwrap();
        idx.upsert("pol-b", entry(vec![0.8, 0.6], SourceCategory::Policy, "p1")).unwrap();
        idx.upsert("pol-c", entry(vec![0.0, 1.0], SourceCategory::Policy, "p2")).unwrap();
        idx
    }

    #[test]
    fn search_ranks_by_score_and_applies_threshold() {
        let idx = sample();
        let hits = idx.search(&[1.0, 0.0], 10, 0.3, &SearchFilter::default()).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["reg-a", "pol-b"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn ties_break_by_chunk_id() {
        let mut idx = LocalVectorIndex::new();
        idx.upsert("b", entry(vec![1.0, 1.0], SourceCategory::Policy, "p")).unwrap();
        idx.upsert("a", entry(vec![1.0, 1.0], SourceCategory::Policy, "p")).unwrap();
        let hits = idx.search(&[1.0, 1.0], 2, 0.0, &SearchFilter::default()).unwrap();
        assert_eq!(hits[0].chunk_id, "a");
        assert_eq!(hits[1].chunk_id, "b");
    }

    #[test]
    fn filters_restrict_category_and_document() {
        let idx = sample();
        let policy_only = SearchFilter::category(SourceCategory::Policy);
        let hits = idx.search(&[1.0, 0.0], 10, -1.0, &policy_only).unwrap();
        assert!(hits.iter().all(|h| h.chunk_id.starts_with("pol-")));

        let one_doc = policy_only.with_document("p2");
        let hits = idx.search(&[1.0, 0.0], 10, -1.0, &one_doc).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "pol-c");
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let mut idx = sample();
        let err = idx
            .upsert("bad", entry(vec![1.0, 0.0, 0.0], SourceCategory::Policy, "p"))
            .expect_err("should fail");
        assert_eq!(err.code, "AI_INDEX_UPSERT_FAILED");

        let err = idx.search(&[1.0], 1, 0.0, &SearchFilter::default()).expect_err("should fail");
        assert_eq!(err.code, "AI_INDEX_QUERY_FAILED");
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let idx = sample();
        idx.save(&path).unwrap();

        let loaded = LocalVectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dims(), Some(2));
        let a = idx.search(&[0.6, 0.8], 3, 0.0, &SearchFilter::default()).unwrap();
        let b = loaded.search(&[0.6, 0.8], 3, 0.0, &SearchFilter::default()).unwrap();
        assert_eq!(a, b);
    }
}
