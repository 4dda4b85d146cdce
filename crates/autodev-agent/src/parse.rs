//! Salvage structured change sets out of model output.
//!
//! Models are asked for a bare JSON array of file changes, but responses
//! arrive fenced in markdown, wrapped in an envelope object, or prefixed by
//! explanation prose. Parsing tries a few deterministic candidates before
//! giving up; a fix response legitimately carries an explanation before the
//! array, which is captured rather than discarded.

use autodev_core::{AutodevError, ChangeSet, FileChange, FixProposal, Result};

/// Strip a ```lang ... ``` fence, returning the inner body.
fn strip_markdown_fences(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    let without_open = trimmed.strip_prefix("```")?;
    let after_header = match without_open.find('\n') {
        Some(idx) => &without_open[idx + 1..],
        None => without_open,
    };
    let end = after_header.rfind("```")?;
    Some(after_header[..end].trim().to_string())
}

/// The outermost `[...]` slice of the content, if any.
fn outer_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (end > start).then(|| &content[start..=end])
}

fn truncate(content: &str, max: usize) -> &str {
    let mut end = max.min(content.len());
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// Decode a proposal response into a change set.
pub(crate) fn change_set(content: &str) -> Result<ChangeSet> {
    let mut candidates: Vec<String> = vec![content.trim().to_string()];
    if let Some(stripped) = strip_markdown_fences(content) {
        candidates.push(stripped);
    }
    for i in 0..candidates.len() {
        if let Some(array) = outer_array(&candidates[i]) {
            let array = array.to_string();
            if !candidates.contains(&array) {
                candidates.push(array);
            }
        }
    }

    for candidate in &candidates {
        if let Ok(files) = serde_json::from_str::<Vec<FileChange>>(candidate) {
            return Ok(ChangeSet::new(files));
        }
    }

    Err(AutodevError::AgentUnparseable(
        truncate(content, 200).to_string(),
    ))
}

/// Decode a fix response: optional explanation prose followed by the array.
pub(crate) fn fix_proposal(content: &str) -> Result<FixProposal> {
    let body = strip_markdown_fences(content).unwrap_or_else(|| content.trim().to_string());

    let start = body.find('[').ok_or_else(|| {
        AutodevError::AgentUnparseable(format!("no JSON array in: {}", truncate(&body, 200)))
    })?;
    let end = body.rfind(']').filter(|e| *e > start).ok_or_else(|| {
        AutodevError::AgentUnparseable(format!("unterminated JSON array in: {}", truncate(&body, 200)))
    })?;

    let files: Vec<FileChange> = serde_json::from_str(&body[start..=end])
        .map_err(|e| AutodevError::AgentUnparseable(e.to_string()))?;

    let explanation = body[..start].trim();
    Ok(FixProposal {
        changes: ChangeSet::new(files),
        explanation: (!explanation.is_empty()).then(|| explanation.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bare_array() {
        let set =
            change_set(r#"[{"filePath": "/src/lib.rs", "content": "pub fn f() {}"}]"#).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.files()[0].path, "/src/lib.rs");
    }

    #[test]
    fn test_parses_fenced_array() {
        let content = "```json\n[{\"path\": \"/a.rs\", \"content\": \"a\"}]\n```";
        let set = change_set(content).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parses_array_inside_envelope_object() {
        let content = r#"{"files": [{"path": "/a.rs", "content": "a"}]}"#;
        let set = change_set(content).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_empty_array_is_a_valid_no_change_signal() {
        let set = change_set("[]").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_garbage_is_unparseable() {
        let err = change_set("I could not produce a change.").unwrap_err();
        assert!(matches!(err, AutodevError::AgentUnparseable(_)));
    }

    #[test]
    fn test_fix_captures_explanation_prefix() {
        let content = "Renamed the missing symbol in the service module.\n\n\
                       [{\"path\": \"/src/svc.rs\", \"content\": \"fixed\"}]";
        let proposal = fix_proposal(content).unwrap();
        assert_eq!(proposal.changes.len(), 1);
        assert_eq!(
            proposal.explanation.as_deref(),
            Some("Renamed the missing symbol in the service module.")
        );
    }

    #[test]
    fn test_fix_without_explanation() {
        let proposal = fix_proposal(r#"[{"path": "/a.rs", "content": "a"}]"#).unwrap();
        assert!(proposal.explanation.is_none());
        assert_eq!(proposal.changes.len(), 1);
    }

    #[test]
    fn test_fix_fenced_with_explanation() {
        let content = "```\nAdded the missing import.\n[{\"path\": \"/a.rs\", \"content\": \"a\"}]\n```";
        let proposal = fix_proposal(content).unwrap();
        assert_eq!(proposal.explanation.as_deref(), Some("Added the missing import."));
    }

    #[test]
    fn test_fix_without_array_is_unparseable() {
        let err = fix_proposal("The build failed because of a typo.").unwrap_err();
        assert!(matches!(err, AutodevError::AgentUnparseable(_)));
    }

    #[test]
    fn test_duplicate_paths_normalized_on_parse() {
        let content = r#"[
            {"path": "/a.rs", "content": "one"},
            {"path": "/a.rs", "content": "two"}
        ]"#;
        let set = change_set(content).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.files()[0].content, "two");
    }
}
