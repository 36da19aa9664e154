use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

mod judgment;

pub use judgment::{AuditFailure, AuditRequest, AuditResult, Confidence, Intent, Judgment, Status};

/// Evidence categories the pipeline knows how to weigh against each other.
///
/// Adding a category here makes every exhaustive match over it (entity counts,
/// reference keys, the circuit breaker) fail to compile until it is handled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Regulation,
    Policy,
}

impl SourceCategory {
    pub const ALL: [SourceCategory; 2] = [SourceCategory::Regulation, SourceCategory::Policy];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Regulation => "regulation",
            SourceCategory::Policy => "policy",
        }
    }

    /// Case-insensitive; anything outside the closed set is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
    }

    /// Metadata key holding the human-readable reference for this category.
    pub fn reference_key(&self) -> &'static str {
        match self {
            SourceCategory::Regulation => "section",
            SourceCategory::Policy => "version",
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paragraph-level unit of regulation or policy text, as stored in the
/// source-of-truth store. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceChunk {
    pub id: String,
    /// Raw category text as ingested; may fall outside [`SourceCategory`].
    pub category: String,
    pub document_id: String,
    pub ordinal: u32,
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub embedding_id: Option<String>,
}

impl EvidenceChunk {
    pub fn known_category(&self) -> Option<SourceCategory> {
        SourceCategory::parse(&self.category)
    }

    /// Section/version style reference for context headers.
    ///
    /// The category's own key wins; otherwise the other known keys are tried in
    /// order, then the literal `Unknown`.
    pub fn reference(&self) -> String {
        let preferred = self.known_category().map(|c| c.reference_key());
        let fallbacks = SourceCategory::ALL.map(|c| c.reference_key());
        preferred
            .into_iter()
            .chain(fallbacks)
            .find_map(|key| metadata_text(&self.metadata, key))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

fn metadata_text(meta: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match meta.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A chunk paired with its similarity score for one query. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEvidence {
    pub chunk: EvidenceChunk,
    pub score: f32,
}

/// Rank-derived citation anchor (`Source 1`, `Source 2`, ...).
///
/// Labels are assigned fresh for every query from retrieval order and are not
/// identifiers of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLabel(u32);

impl SourceLabel {
    /// Labels are 1-indexed; zero is rejected.
    pub fn new(number: u32) -> Option<Self> {
        (number > 0).then_some(Self(number))
    }

    /// Label for the item at zero-based `rank` in retrieval order.
    pub fn for_rank(rank: usize) -> Self {
        Self(rank as u32 + 1)
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source {}", self.0)
    }
}

impl Serialize for SourceLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_prefix("Source ")
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(SourceLabel::new)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid source label: {raw}")))
    }
}

/// Per-category tally of retrieved chunks; drives the circuit breaker.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityCounts {
    pub regulation: u32,
    pub policy: u32,
}

impl EntityCounts {
    pub fn record(&mut self, category: SourceCategory) {
        match category {
            SourceCategory::Regulation => self.regulation += 1,
            SourceCategory::Policy => self.policy += 1,
        }
    }

    pub fn get(&self, category: SourceCategory) -> u32 {
        match category {
            SourceCategory::Regulation => self.regulation,
            SourceCategory::Policy => self.policy,
        }
    }

    pub fn total(&self) -> u32 {
        SourceCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }
}
