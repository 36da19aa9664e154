use audit_core::domain::{EntityCounts, Intent, Judgment, SourceCategory};
use tracing::warn;

/// Why the breaker refused to call the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trip {
    NoEvidence,
    Missing(SourceCategory),
}

impl Trip {
    pub fn reason(&self) -> &'static str {
        match self {
            Trip::NoEvidence => "No evidence found for this query.",
            Trip::Missing(SourceCategory::Regulation) => {
                "No relevant regulation found to compare against."
            }
            Trip::Missing(SourceCategory::Policy) => "No relevant policy found to audit.",
        }
    }

    pub fn judgment(&self, intent: Intent) -> Judgment {
        Judgment::inconclusive(self.reason(), intent)
    }
}

/// Pre-generation check. A comparison needs both sides of the evidence; with
/// either side missing the generator is never called.
pub fn check(evidence_len: usize, counts: &EntityCounts) -> Result<(), Trip> {
    if evidence_len == 0 {
        warn!("circuit break: retriever returned no evidence");
        return Err(Trip::NoEvidence);
    }
    for category in SourceCategory::ALL {
        if counts.get(category) == 0 {
            warn!(category = %category, "circuit break: no evidence for category");
            return Err(Trip::Missing(category));
        }
    }
    Ok(())
}
