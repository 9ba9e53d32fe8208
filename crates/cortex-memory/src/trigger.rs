/// Which memory tiers a retrieval need touches, detected cheaply via
/// substring scan before any embedding is computed (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryNeed {
    Recall,
    Reference,
    Yesterday,
    Comparison,
}

const RECALL_TRIGGERS: &[&str] = &["remember", "recall", "earlier", "you said", "before"];
const REFERENCE_TRIGGERS: &[&str] = &["how to", "what is", "explain", "guide", "documentation"];
const YESTERDAY_TRIGGERS: &[&str] = &["yesterday", "last night", "this morning"];
const COMPARISON_TRIGGERS: &[&str] = &["different from", "versus", " vs ", "better than"];

/// Scan the combined text (current user input + last 3 thoughts) for trigger
/// families. Order matches the spec's listing; a text may match more than
/// one family.
pub fn detect_memory_needs(combined_text: &str) -> Vec<MemoryNeed> {
    let lower = combined_text.to_lowercase();
    let mut needs = Vec::new();

    if RECALL_TRIGGERS.iter().any(|t| lower.contains(t)) {
        needs.push(MemoryNeed::Recall);
    }
    if REFERENCE_TRIGGERS.iter().any(|t| lower.contains(t)) {
        needs.push(MemoryNeed::Reference);
    }
    if YESTERDAY_TRIGGERS.iter().any(|t| lower.contains(t)) {
        needs.push(MemoryNeed::Yesterday);
    }
    if COMPARISON_TRIGGERS.iter().any(|t| lower.contains(t)) {
        needs.push(MemoryNeed::Comparison);
    }

    needs
}

/// Extract the likely subject of a "how to"/"what is"-style question for a
/// Base-knowledge lookup. Deliberately simple: the remainder of the text
/// after the trigger phrase, trimmed of trailing punctuation.
pub fn extract_reference_subject(combined_text: &str) -> Option<String> {
    let lower = combined_text.to_lowercase();
    for trigger in REFERENCE_TRIGGERS {
        if let Some(idx) = lower.find(trigger) {
            let start = idx + trigger.len();
            let subject: String = combined_text[start..]
                .trim()
                .trim_end_matches(|c: char| c == '?' || c == '.' || c == '!')
                .to_string();
            if !subject.is_empty() {
                return Some(subject);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_recall_trigger() {
        let needs = detect_memory_needs("do you remember what I told you earlier?");
        assert!(needs.contains(&MemoryNeed::Recall));
    }

    #[test]
    fn detects_multiple_families() {
        let needs = detect_memory_needs("yesterday you explained how to do this, remember?");
        assert!(needs.contains(&MemoryNeed::Yesterday));
        assert!(needs.contains(&MemoryNeed::Reference));
        assert!(needs.contains(&MemoryNeed::Recall));
    }

    #[test]
    fn no_trigger_means_no_needs() {
        assert!(detect_memory_needs("nice weather today").is_empty());
    }

    #[test]
    fn extracts_subject_after_trigger() {
        let subject = extract_reference_subject("can you explain how to configure the reminder tool?");
        assert_eq!(subject.as_deref(), Some("configure the reminder tool"));
    }
}
