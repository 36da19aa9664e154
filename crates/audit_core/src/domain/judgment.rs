use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Policy fully satisfies the regulation.
    Pass,
    /// A requirement is missing or contradicted.
    Fail,
    /// Relevant language exists but is vague.
    Ambiguous,
    /// The evidence does not support a verdict.
    Inconclusive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Query scope decided before any retrieval happens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    ComplianceAudit,
    SystemMetadata,
    Reject,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ComplianceAudit => "COMPLIANCE_AUDIT",
            Intent::SystemMetadata => "SYSTEM_METADATA",
            Intent::Reject => "REJECT",
        }
    }
}

/// Final audit verdict. Only `citations` may change after construction, and
/// only by shrinking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Judgment {
    pub status: Status,
    pub confidence: Confidence,
    pub reasoning: String,
    pub citations: Vec<String>,
    pub intent: Intent,
}

impl Judgment {
    /// INCONCLUSIVE / LOW with no citations.
    pub fn inconclusive(reasoning: impl Into<String>, intent: Intent) -> Self {
        Self {
            status: Status::Inconclusive,
            confidence: Confidence::Low,
            reasoning: reasoning.into(),
            citations: Vec::new(),
            intent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRequest {
    pub query: String,
    #[serde(default)]
    pub policy_id: Option<String>,
}

/// Error record returned at the pipeline boundary instead of a judgment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditFailure {
    /// Always `"error"`.
    pub status: String,
    pub code: String,
    pub reason: String,
}

impl AuditFailure {
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            code: code.into(),
            reason: reason.into(),
        }
    }
}

/// Caller-facing result; serializes to either the judgment shape or the
/// error shape with no wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AuditResult {
    Judgment(Judgment),
    Failure(AuditFailure),
}

impl AuditResult {
    pub fn judgment(&self) -> Option<&Judgment> {
        match self {
            AuditResult::Judgment(j) => Some(j),
            AuditResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&AuditFailure> {
        match self {
            AuditResult::Judgment(_) => None,
            AuditResult::Failure(f) => Some(f),
        }
    }
}
