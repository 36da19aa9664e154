use std::sync::Arc;

use audit_core::config::DEFAULT_INTENT_CACHE_CAPACITY;
use audit_core::domain::Intent;
use audit_core::error::AppError;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::llm::{CompletionRequest, Llm};
use crate::prompts;

const ROUTER_MAX_TOKENS: u32 = 50;

#[derive(Debug, Deserialize)]
struct RouterReply {
    category: Intent,
}

/// Pre-retrieval query classifier with a process-lifetime cache.
///
/// The cache is keyed by trimmed query text and shared by every caller of one
/// router. Only successful classifications are cached, and once `capacity`
/// entries exist new results are returned without being stored. Concurrent
/// misses on the same text may classify twice; the first stored result wins
/// and is what both callers see.
pub struct IntentRouter {
    llm: Arc<dyn Llm>,
    cache: DashMap<String, Intent>,
    capacity: usize,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            cache: DashMap::new(),
            capacity: DEFAULT_INTENT_CACHE_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Never fails: any backend or decoding problem resolves to `Reject`.
    pub fn classify(&self, query: &str) -> Intent {
        let key = query.trim();
        if key.is_empty() {
            info!("blank query routed to REJECT");
            return Intent::Reject;
        }

        if let Some(hit) = self.cache.get(key) {
            debug!(intent = hit.as_str(), "intent cache hit");
            return *hit;
        }

        let intent = match self.classify_uncached(key) {
            Ok(intent) => intent,
            Err(e) => {
                error!(error = %e, "intent classification failed, defaulting to REJECT");
                return Intent::Reject;
            }
        };
        info!(intent = intent.as_str(), "classified query intent");

        if self.cache.len() >= self.capacity && !self.cache.contains_key(key) {
            debug!(capacity = self.capacity, "intent cache full; result not stored");
            return intent;
        }
        let stored = *self.cache.entry(key.to_string()).or_insert(intent);
        stored
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn classify_uncached(&self, query: &str) -> Result<Intent, AppError> {
        let raw = self.llm.complete(&CompletionRequest {
            system: prompts::intent_router_prompt(),
            user: query,
            max_tokens: Some(ROUTER_MAX_TOKENS),
        })?;
        let reply: RouterReply = serde_json::from_str(raw.trim()).map_err(|e| {
            AppError::new("AI_INTENT_INVALID", "Router reply did not match the category contract")
                .with_details(e.to_string())
        })?;
        Ok(reply.category)
    }
}
