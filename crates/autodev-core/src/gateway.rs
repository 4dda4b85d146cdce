//! Version-control gateway contract.
//!
//! The remediation loop and the driver talk to the version-control system
//! exclusively through this trait; the REST implementation lives in
//! `autodev-devops`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ChangeSet, FileChange, Result};

/// What a successful push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// A commit landed on the branch.
    Pushed,
    /// The change set was empty; nothing was sent.
    NoOp,
}

/// A created pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: i64,
    pub url: String,
}

/// Contract for branch and file operations on the version-control system.
///
/// `push` is atomic across the whole change set and relies on the server's
/// optimistic-concurrency check: it submits against the last observed branch
/// head, and a head moved by a concurrent writer surfaces as
/// [`AutodevError::PushConflict`](crate::AutodevError::PushConflict) rather
/// than a silent overwrite.
#[async_trait]
pub trait VersionControlGateway: Send + Sync {
    /// All file paths on the branch.
    async fn list_files(&self, repo: &str, branch: &str) -> Result<Vec<String>>;

    /// Fetch current content for the given paths on the branch.
    async fn read_files(&self, repo: &str, branch: &str, paths: &[String])
        -> Result<Vec<FileChange>>;

    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool>;

    /// Create `new_branch` at the head of `source`. Fails with
    /// `BranchNotFound` if `source` is absent.
    async fn create_branch(&self, repo: &str, source: &str, new_branch: &str) -> Result<()>;

    /// Push the change set as one commit. Add-vs-edit is decided per file by
    /// probing existence on the branch. An empty change set is a successful
    /// no-op.
    async fn push(&self, repo: &str, branch: &str, changes: &ChangeSet) -> Result<PushOutcome>;

    async fn create_pull_request(
        &self,
        repo: &str,
        source: &str,
        target: &str,
        title: &str,
        description: &str,
    ) -> Result<PullRequest>;
}
