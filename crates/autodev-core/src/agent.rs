//! Code-generation agent contract.
//!
//! Two modes: initial proposal for a work item, and fix-given-failure-log.
//! Both may legitimately return an empty change set ("no change produced"),
//! which callers treat as a terminal no-op for that attempt, not an error.

use async_trait::async_trait;

use crate::domain::{ChangeSet, FileChange, Result};

/// The agent's answer to a fix request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixProposal {
    pub changes: ChangeSet,
    /// Free-text explanation of what the agent changed and why it believes
    /// the fix addresses the failure. Carried into the terminal report.
    pub explanation: Option<String>,
}

/// Contract for the code-generation agent.
#[async_trait]
pub trait CodeAgent: Send + Sync {
    /// Propose a change set implementing `story_text`. `existing_files` is
    /// the current content of the repository; `project_exists` tells the
    /// agent whether it is extending a project or bootstrapping one.
    async fn propose_changes(
        &self,
        story_text: &str,
        existing_files: &[FileChange],
        project_exists: bool,
    ) -> Result<ChangeSet>;

    /// Propose a fix for a failed build. `current_branch_files` is the
    /// branch's *current* content, which may differ from the attempted
    /// change set if the push partially landed.
    async fn fix_build_failure(
        &self,
        work_item_id: u64,
        prior_change_set: &ChangeSet,
        diagnostic_summary: &str,
        current_branch_files: &[FileChange],
    ) -> Result<FixProposal>;
}
