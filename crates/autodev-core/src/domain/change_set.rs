//! Change-set model: the unit of proposed work exchanged between the agent,
//! the remediation loop, and the version-control gateway.

use serde::{Deserialize, Serialize};

/// One file to create or overwrite on the work branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Repository-relative path. The agent wire format uses `filePath`.
    #[serde(alias = "filePath")]
    pub path: String,

    /// Full new content of the file.
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// An ordered set of file changes proposed for one attempt.
///
/// May be empty — that is a distinct, meaningful "no change produced"
/// signal, not an error. Paths are unique: duplicates are normalized
/// last-write-wins at construction (the first occurrence keeps its
/// position, the content of the last one wins), so the gateway never
/// sees two changes for the same path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FileChange>", into = "Vec<FileChange>")]
pub struct ChangeSet {
    files: Vec<FileChange>,
}

impl ChangeSet {
    /// Build a change set, normalizing duplicate paths last-write-wins.
    pub fn new(files: Vec<FileChange>) -> Self {
        let mut normalized: Vec<FileChange> = Vec::with_capacity(files.len());
        for change in files {
            match normalized.iter_mut().find(|c| c.path == change.path) {
                Some(existing) => existing.content = change.content,
                None => normalized.push(change),
            }
        }
        Self { files: normalized }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[FileChange] {
        &self.files
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|c| c.path.as_str())
    }
}

impl From<Vec<FileChange>> for ChangeSet {
    fn from(files: Vec<FileChange>) -> Self {
        ChangeSet::new(files)
    }
}

impl From<ChangeSet> for Vec<FileChange> {
    fn from(set: ChangeSet) -> Self {
        set.files
    }
}

impl FromIterator<FileChange> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = FileChange>>(iter: I) -> Self {
        ChangeSet::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_change_set_is_meaningful() {
        let set = ChangeSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_duplicate_paths_last_write_wins() {
        let set = ChangeSet::new(vec![
            FileChange::new("/src/main.rs", "fn main() {}"),
            FileChange::new("/Cargo.toml", "[package]"),
            FileChange::new("/src/main.rs", "fn main() { run(); }"),
        ]);

        assert_eq!(set.len(), 2);
        // First occurrence keeps its position; content of the last wins.
        assert_eq!(set.files()[0].path, "/src/main.rs");
        assert_eq!(set.files()[0].content, "fn main() { run(); }");
        assert_eq!(set.files()[1].path, "/Cargo.toml");
    }

    #[test]
    fn test_order_preserved() {
        let set: ChangeSet = vec![
            FileChange::new("/b.rs", "b"),
            FileChange::new("/a.rs", "a"),
            FileChange::new("/c.rs", "c"),
        ]
        .into_iter()
        .collect();

        let paths: Vec<&str> = set.paths().collect();
        assert_eq!(paths, vec!["/b.rs", "/a.rs", "/c.rs"]);
    }

    #[test]
    fn test_deserialize_accepts_agent_wire_alias() {
        let json = r#"[{"filePath": "/src/lib.rs", "content": "pub fn f() {}"}]"#;
        let set: ChangeSet = serde_json::from_str(json).expect("deserialize");
        assert_eq!(set.len(), 1);
        assert_eq!(set.files()[0].path, "/src/lib.rs");
    }

    #[test]
    fn test_deserialize_normalizes_duplicates() {
        let json = r#"[
            {"path": "/f.rs", "content": "one"},
            {"path": "/f.rs", "content": "two"}
        ]"#;
        let set: ChangeSet = serde_json::from_str(json).expect("deserialize");
        assert_eq!(set.len(), 1);
        assert_eq!(set.files()[0].content, "two");
    }

    #[test]
    fn test_serde_roundtrip() {
        let set = ChangeSet::new(vec![FileChange::new("/x.rs", "x")]);
        let json = serde_json::to_string(&set).expect("serialize");
        let back: ChangeSet = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(set, back);
    }
}
