//! Runtime configuration for the audit pipeline.
//!
//! Every section deserializes with defaults so a partial document (or an empty
//! environment apart from the API key) yields a working configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
pub const DEFAULT_TOP_K: u32 = 5;
/// Largest neighbour count a single index search may ask for.
pub const MAX_TOP_K: u32 = 50;
pub const DEFAULT_INTENT_CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:6333".to_string(),
            api_key: None,
            collection: "compliance_chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// One nearest-neighbour search across all categories.
    #[default]
    Ranked,
    /// One search per category, merged by score.
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Kept low on purpose: a missed regulation looks exactly like "no
    /// regulation exists", so precision is recovered downstream instead.
    pub similarity_threshold: f32,
    pub top_k: u32,
    pub mode: RetrievalMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            mode: RetrievalMode::Ranked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub openai: OpenAiConfig,
    pub qdrant: QdrantConfig,
    pub retrieval: RetrievalConfig,
    pub retry: RetryConfig,
    pub intent_cache_capacity: usize,
    pub bank_name: String,
    pub db_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            qdrant: QdrantConfig::default(),
            retrieval: RetrievalConfig::default(),
            retry: RetryConfig::default(),
            intent_cache_capacity: DEFAULT_INTENT_CACHE_CAPACITY,
            bank_name: "BAL".to_string(),
            db_path: "compliance.db".to_string(),
        }
    }
}

impl AuditConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = AuditConfig::default();

        cfg.openai.api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            AppError::new("CONFIG_MISSING_API_KEY", "OPENAI_API_KEY is not set")
        })?;
        if let Some(v) = get("OPENAI_BASE_URL") {
            cfg.openai.base_url = v;
        }
        if let Some(v) = get("CHAT_MODEL") {
            cfg.openai.chat_model = v;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            cfg.openai.embedding_model = v;
        }
        if let Some(v) = get("QDRANT_URL") {
            cfg.qdrant.url = v;
        }
        cfg.qdrant.api_key = get("QDRANT_API_KEY");
        if let Some(v) = get("QDRANT_COLLECTION") {
            cfg.qdrant.collection = v;
        }
        if let Some(v) = get("SIMILARITY_THRESHOLD") {
            cfg.retrieval.similarity_threshold = parse_value("SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("TOP_K") {
            cfg.retrieval.top_k = parse_value("TOP_K", &v)?;
        }
        if let Some(v) = get("RETRIEVAL_MODE") {
            cfg.retrieval.mode = match v.to_ascii_lowercase().as_str() {
                "ranked" => RetrievalMode::Ranked,
                "balanced" => RetrievalMode::Balanced,
                _ => {
                    return Err(AppError::new(
                        "CONFIG_INVALID_VALUE",
                        "RETRIEVAL_MODE must be ranked or balanced",
                    )
                    .with_details(format!("value={v}")))
                }
            };
        }
        if let Some(v) = get("BANK_NAME") {
            cfg.bank_name = v;
        }
        if let Some(v) = get("AUDIT_DB_PATH") {
            cfg.db_path = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.openai.api_key.trim().is_empty() {
            return Err(AppError::new("CONFIG_MISSING_API_KEY", "OpenAI API key is empty"));
        }
        let t = self.retrieval.similarity_threshold;
        if !(-1.0..=1.0).contains(&t) {
            return Err(AppError::new(
                "CONFIG_INVALID_VALUE",
                "similarity_threshold must be within [-1, 1]",
            )
            .with_details(format!("value={t}")));
        }
        let k = self.retrieval.top_k;
        if k == 0 || k > MAX_TOP_K {
            return Err(AppError::new(
                "CONFIG_INVALID_VALUE",
                format!("top_k must be within 1..={MAX_TOP_K}"),
            )
            .with_details(format!("value={k}")));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID_VALUE",
                "retry.max_attempts must be positive",
            ));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.parse::<T>().map_err(|_| {
        AppError::new("CONFIG_INVALID_VALUE", format!("{key} could not be parsed"))
            .with_details(format!("value={raw}"))
    })
}
