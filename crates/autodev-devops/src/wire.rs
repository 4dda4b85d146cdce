//! Typed mirror of the DevOps REST payloads the adapters exchange.

use serde::{Deserialize, Serialize};

/// The standard `{ "count": n, "value": [...] }` collection envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VsoList<T> {
    pub value: Vec<T>,
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitRef {
    pub name: String,
    pub object_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitItem {
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitRefUpdate {
    pub name: String,
    pub old_object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_object_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ChangeKind {
    Add,
    Edit,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GitItemRef {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemContent {
    pub content: String,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitChange {
    pub change_type: ChangeKind,
    pub item: GitItemRef,
    pub new_content: ItemContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitCommit {
    pub comment: String,
    pub changes: Vec<GitChange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitPush {
    pub ref_updates: Vec<GitRefUpdate>,
    pub commits: Vec<GitCommit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestBody {
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestCreated {
    pub pull_request_id: i64,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BuildDefinition {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DefinitionRef {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueueBuildBody {
    pub definition: DefinitionRef,
    pub source_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BuildRun {
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Timeline {
    pub records: Vec<TimelineRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimelineRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub log: Option<LogRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LogRef {
    pub id: i64,
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WiqlBody {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WiqlResponse {
    #[serde(default)]
    pub work_items: Vec<WiqlRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WiqlRef {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorkItemDto {
    pub id: u64,
    pub fields: WorkItemFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WorkItemFields {
    #[serde(rename = "System.Title", default)]
    pub title: String,
    #[serde(rename = "System.Description", default)]
    pub description: String,
    #[serde(rename = "System.State", default)]
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CommentBody {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PatchOp {
    pub op: &'static str,
    pub path: String,
    pub value: String,
}
