use std::collections::BTreeSet;

use audit_core::domain::{EntityCounts, RankedEvidence, SourceLabel};
use tracing::info;

/// Everything downstream stages need from one query's evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub labels: Vec<SourceLabel>,
    pub counts: EntityCounts,
}

impl AssembledContext {
    /// Label set the citation verifier checks against.
    pub fn valid_labels(&self) -> BTreeSet<SourceLabel> {
        self.labels.iter().copied().collect()
    }
}

/// `[Source N: CATEGORY - reference]` followed by the chunk text.
pub fn format_block(label: SourceLabel, evidence: &RankedEvidence) -> String {
    format!(
        "[{label}: {} - {}]\n{}\n",
        evidence.chunk.category.to_uppercase(),
        evidence.chunk.reference(),
        evidence.chunk.text
    )
}

/// Label evidence in rank order starting at `Source 1`, tally recognised
/// categories, and join the labelled blocks with blank lines.
pub fn assemble(evidence: &[RankedEvidence]) -> AssembledContext {
    let mut parts = Vec::with_capacity(evidence.len());
    let mut labels = Vec::with_capacity(evidence.len());
    let mut counts = EntityCounts::default();

    for (rank, item) in evidence.iter().enumerate() {
        let label = SourceLabel::for_rank(rank);
        labels.push(label);

        if let Some(category) = item.chunk.known_category() {
            counts.record(category);
        }

        info!(
            label = %label,
            category = %item.chunk.category.to_uppercase(),
            reference = %item.chunk.reference(),
            score = item.score,
            "mapped source"
        );
        parts.push(format_block(label, item));
    }

    AssembledContext {
        text: parts.join("\n"),
        labels,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::domain::EvidenceChunk;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ranked(id: &str, category: &str, meta: serde_json::Value, text: &str) -> RankedEvidence {
        RankedEvidence {
            chunk: EvidenceChunk {
                id: id.to_string(),
                category: category.to_string(),
                document_id: format!("doc-{id}"),
                ordinal: 0,
                text: text.to_string(),
                metadata: meta.as_object().cloned().unwrap_or_default(),
                embedding_id: None,
            },
            score: 0.5,
        }
    }

    #[test]
    fn formats_labelled_blocks_separated_by_blank_lines() {
        let ctx = assemble(&[
            ranked("a", "regulation", json!({"section": "B-10 2.3"}), "Exit plans are required."),
            ranked("b", "policy", json!({"version": "v2"}), "We keep exit plans."),
        ]);
        assert_eq!(
            ctx.text,
            "[Source 1: REGULATION - B-10 2.3]\nExit plans are required.\n\n\
             [Source 2: POLICY - v2]\nWe keep exit plans.\n"
        );
        assert_eq!(ctx.counts, EntityCounts { regulation: 1, policy: 1 });
    }

    #[test]
    fn labels_are_dense_and_one_indexed() {
        let evidence: Vec<_> = (0..7)
            .map(|i| ranked(&i.to_string(), "policy", json!({}), "t"))
            .collect();
        let ctx = assemble(&evidence);
        let names: Vec<String> = ctx.labels.iter().map(|l| l.to_string()).collect();
        let expected: Vec<String> = (1..=7).map(|n| format!("Source {n}")).collect();
        assert_eq!(names, expected);
        assert_eq!(ctx.valid_labels().len(), 7);
    }

    #[test]
    fn unknown_categories_are_labelled_but_not_counted() {
        let ctx = assemble(&[
            ranked("a", "guideline", json!({}), "t"),
            ranked("b", "Regulation", json!({}), "t"),
        ]);
        assert_eq!(ctx.labels.len(), 2);
        assert_eq!(ctx.counts, EntityCounts { regulation: 1, policy: 0 });
        assert!(ctx.text.starts_with("[Source 1: GUIDELINE - Unknown]"));
    }

    #[test]
    fn empty_evidence_yields_empty_context() {
        let ctx = assemble(&[]);
        assert!(ctx.text.is_empty());
        assert!(ctx.labels.is_empty());
        assert_eq!(ctx.counts.total(), 0);
    }
}
