use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use audit_core::config::{DEFAULT_SIMILARITY_THRESHOLD, MAX_TOP_K};
use audit_core::domain::{RankedEvidence, SourceCategory};
use tracing::{error, info, warn};

use crate::embeddings::Embedder;
use crate::index::{EvidenceIndex, IndexHit, SearchFilter};
use crate::store::SourceStore;

pub const MAX_LIMIT: usize = MAX_TOP_K as usize;

fn bounded_limit(requested: usize) -> usize {
    if requested > MAX_LIMIT {
        warn!(requested, max = MAX_LIMIT, "retrieval limit above maximum; capping");
    }
    requested.clamp(1, MAX_LIMIT)
}

/// Embeds a query, searches the evidence index and joins the hits against the
/// source-of-truth store.
///
/// Every failure here is fail-open: the caller gets fewer (or zero) items and
/// the circuit breaker decides what that means. Nothing propagates.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn EvidenceIndex>,
    store: Arc<dyn SourceStore>,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn EvidenceIndex>,
        store: Arc<dyn SourceStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            min_score: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Up to `limit` items in index rank order.
    pub fn retrieve(&self, query: &str, limit: usize) -> Vec<RankedEvidence> {
        let Some(vector) = self.embed_query(query) else {
            return Vec::new();
        };
        let limit = bounded_limit(limit);

        let hits = match self
            .index
            .search(&vector, limit, self.min_score, &SearchFilter::default())
        {
            Ok(hits) => hits,
            Err(e) => {
                error!(error = %e, "evidence index search failed");
                return Vec::new();
            }
        };
        self.resolve(hits)
    }

    /// One search per category, merged by score. `policy_filter` restricts the
    /// policy side to a single policy document.
    pub fn retrieve_balanced(
        &self,
        query: &str,
        per_category_limit: usize,
        policy_filter: Option<&str>,
    ) -> Vec<RankedEvidence> {
        let Some(vector) = self.embed_query(query) else {
            return Vec::new();
        };
        let limit = bounded_limit(per_category_limit);

        let mut hits: Vec<IndexHit> = Vec::new();
        for category in SourceCategory::ALL {
            let mut filter = SearchFilter::category(category);
            if let (SourceCategory::Policy, Some(doc)) = (category, policy_filter) {
                filter = filter.with_document(doc);
            }
            match self.index.search(&vector, limit, self.min_score, &filter) {
                Ok(found) => hits.extend(found),
                Err(e) => {
                    error!(category = %category, error = %e, "evidence index search failed");
                    return Vec::new();
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        let mut seen = HashSet::new();
        hits.retain(|h| seen.insert(h.chunk_id.clone()));
        self.resolve(hits)
    }

    fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let q = query.trim();
        if q.is_empty() {
            warn!("empty query; skipping retrieval");
            return None;
        }
        match self.embedder.embed(q) {
            Ok(v) => Some(v),
            Err(e) => {
                error!(error = %e, "failed to embed query");
                None
            }
        }
    }

    /// Batch-join hits against the store, keeping index order. Hits the store
    /// does not know about are dropped.
    fn resolve(&self, hits: Vec<IndexHit>) -> Vec<RankedEvidence> {
        if hits.is_empty() {
            info!("no relevant results found");
            return Vec::new();
        }

        let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
        let chunks = match self.store.fetch_many(&ids) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to fetch chunks from store");
                return Vec::new();
            }
        };
        let mut by_id: HashMap<String, _> = chunks.into_iter().map(|c| (c.id.clone(), c)).collect();

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            match by_id.remove(&hit.chunk_id) {
                Some(chunk) => {
                    info!(
                        score = hit.score,
                        category = %chunk.category.to_uppercase(),
                        chunk_id = %chunk.id,
                        "retrieved evidence"
                    );
                    out.push(RankedEvidence {
                        chunk,
                        score: hit.score,
                    });
                }
                None => {
                    error!(chunk_id = %hit.chunk_id, "data drift: index hit has no store record");
                }
            }
        }
        out
    }
}
