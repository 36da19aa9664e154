use std::collections::BTreeSet;

use audit_core::domain::{Judgment, SourceLabel};
use tracing::warn;

/// Outcome of one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationReport {
    pub retained: Vec<String>,
    /// No `Source <n>` token could be found.
    pub malformed: Vec<String>,
    /// Well-formed, but not a label in this query's context.
    pub hallucinated: Vec<String>,
}

/// The first `source <digits>` token found in a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceToken {
    Label(SourceLabel),
    /// Well-formed token whose number can never be a label (`Source 0`, or
    /// too large to parse).
    NotALabel,
}

/// First case-insensitive `source <digits>` token in `citation`. Later tokens
/// are never consulted.
pub fn find_source_token(citation: &str) -> Option<SourceToken> {
    const WORD: &[u8] = b"source";
    let bytes = citation.as_bytes();
    let mut i = 0usize;
    while i + WORD.len() <= bytes.len() {
        if bytes[i..i + WORD.len()].eq_ignore_ascii_case(WORD) {
            let mut j = i + WORD.len();
            let ws_start = j;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let digits_start = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > digits_start && digits_start > ws_start {
                let label = citation[digits_start..j]
                    .parse::<u32>()
                    .ok()
                    .and_then(SourceLabel::new);
                return Some(label.map_or(SourceToken::NotALabel, SourceToken::Label));
            }
        }
        i += 1;
    }
    None
}

/// Label named by the first `source <n>` token, normalised. Leading zeros are
/// dropped; `Source 0` is never a label.
pub fn extract_source_label(citation: &str) -> Option<SourceLabel> {
    match find_source_token(citation)? {
        SourceToken::Label(label) => Some(label),
        SourceToken::NotALabel => None,
    }
}

/// Drop every citation that does not name a label from `valid`. Status,
/// confidence and reasoning are untouched; kept citations are kept verbatim.
pub fn verify_citations_with_report(
    mut judgment: Judgment,
    valid: &BTreeSet<SourceLabel>,
) -> (Judgment, CitationReport) {
    let mut report = CitationReport::default();

    for cite in std::mem::take(&mut judgment.citations) {
        match find_source_token(&cite) {
            Some(SourceToken::Label(label)) if valid.contains(&label) => report.retained.push(cite),
            Some(SourceToken::Label(label)) => {
                warn!(citation = %cite, label = %label, "hallucination blocked: label not in context");
                report.hallucinated.push(cite);
            }
            Some(SourceToken::NotALabel) => {
                warn!(citation = %cite, "hallucination blocked: source number is not a label");
                report.hallucinated.push(cite);
            }
            None => {
                warn!(citation = %cite, "malformed citation blocked");
                report.malformed.push(cite);
            }
        }
    }

    judgment.citations = report.retained.clone();
    (judgment, report)
}

pub fn verify_citations(judgment: Judgment, valid: &BTreeSet<SourceLabel>) -> Judgment {
    verify_citations_with_report(judgment, valid).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_core::domain::{Confidence, Intent, Status};
    use pretty_assertions::assert_eq;

    fn labels(n: u32) -> BTreeSet<SourceLabel> {
        (1..=n).filter_map(SourceLabel::new).collect()
    }

    fn judgment(citations: &[&str]) -> Judgment {
        Judgment {
            status: Status::Fail,
            confidence: Confidence::High,
            reasoning: "Policy omits exit triggers [Source 2].".to_string(),
            citations: citations.iter().map(|s| s.to_string()).collect(),
            intent: Intent::ComplianceAudit,
        }
    }

    #[test]
    fn extracts_labels_case_insensitively() {
        assert_eq!(extract_source_label("Source 2"), SourceLabel::new(2));
        assert_eq!(extract_source_label("per SOURCE 12, section 4"), SourceLabel::new(12));
        assert_eq!(extract_source_label("source  03"), SourceLabel::new(3));
        assert_eq!(extract_source_label("Sources: none"), None);
        assert_eq!(extract_source_label("Source2"), None);
        assert_eq!(extract_source_label("Source 0"), None);
        assert_eq!(extract_source_label("OSFI B-10"), None);
        assert_eq!(extract_source_label(""), None);
    }

    #[test]
    fn blocks_hallucinated_and_malformed_citations() {
        let (out, report) = verify_citations_with_report(
            judgment(&["Source 2", "Source 9", "OSFI B-10 s.2"]),
            &labels(5),
        );
        assert_eq!(out.citations, vec!["Source 2".to_string()]);
        assert_eq!(report.hallucinated, vec!["Source 9".to_string()]);
        assert_eq!(report.malformed, vec!["OSFI B-10 s.2".to_string()]);
    }

    #[test]
    fn only_the_first_source_token_counts() {
        assert_eq!(find_source_token("Source 0, Source 2"), Some(SourceToken::NotALabel));
        assert_eq!(
            find_source_token("Source 99999999999 or Source 1"),
            Some(SourceToken::NotALabel)
        );
        assert_eq!(
            find_source_token("see Source 4 and Source 1"),
            SourceLabel::new(4).map(SourceToken::Label)
        );

        let (out, report) = verify_citations_with_report(
            judgment(&["Source 0, Source 2", "Source 7 / Source 1", "Source 2"]),
            &labels(5),
        );
        assert_eq!(out.citations, vec!["Source 2".to_string()]);
        assert_eq!(
            report.hallucinated,
            vec!["Source 0, Source 2".to_string(), "Source 7 / Source 1".to_string()]
        );
        assert!(report.malformed.is_empty());
    }

    #[test]
    fn only_citations_change() {
        let before = judgment(&["Source 1", "Source 6"]);
        let after = verify_citations(before.clone(), &labels(5));
        assert_eq!(after.status, before.status);
        assert_eq!(after.confidence, before.confidence);
        assert_eq!(after.reasoning, before.reasoning);
        assert_eq!(after.intent, before.intent);
        assert_eq!(after.citations, vec!["Source 1".to_string()]);
    }

    #[test]
    fn verification_is_idempotent() {
        let valid = labels(3);
        let once = verify_citations(judgment(&["source 1", "Source 4", "n/a", "Source 3 (policy v2)"]), &valid);
        let twice = verify_citations(once.clone(), &valid);
        assert_eq!(once, twice);
        assert_eq!(
            twice.citations,
            vec!["source 1".to_string(), "Source 3 (policy v2)".to_string()]
        );
    }

    #[test]
    fn empty_label_set_blocks_everything() {
        let out = verify_citations(judgment(&["Source 1"]), &BTreeSet::new());
        assert!(out.citations.is_empty());
    }
}
