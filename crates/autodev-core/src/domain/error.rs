//! Domain-level error taxonomy for autodev.

use crate::domain::session::BuildId;

/// autodev domain errors.
///
/// Everything here is recovered at the session or ticket boundary: a failure
/// in one work item's remediation never terminates the worker process.
#[derive(Debug, thiserror::Error)]
pub enum AutodevError {
    /// The branch head moved since last observed. Ends the session without
    /// consuming the fix budget; no fix is requested.
    #[error("push conflict on branch '{branch}': head moved since last observed")]
    PushConflict { branch: String },

    #[error("branch not found: '{branch}'")]
    BranchNotFound { branch: String },

    #[error("no build pipeline configured for repository '{repository}'")]
    PipelineNotConfigured { repository: String },

    #[error("version control gateway error: {0}")]
    Gateway(String),

    #[error("build orchestrator error: {0}")]
    Orchestrator(String),

    #[error("agent error: {0}")]
    Agent(String),

    /// The agent's response could not be decoded into a change set. The
    /// agent adapter degrades this to an empty change set; it only escapes
    /// as an error from the parsing layer itself.
    #[error("agent response could not be parsed: {0}")]
    AgentUnparseable(String),

    #[error("build {build_id} did not reach a terminal status within {timeout_secs}s")]
    PollTimeout { build_id: BuildId, timeout_secs: u64 },

    #[error("operation cancelled by shutdown signal")]
    Cancelled,

    #[error("work item service error: {0}")]
    WorkItem(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AutodevError {
    /// Whether this error class aborts a remediation session outright
    /// (as opposed to driving the fix-and-retry path).
    pub fn aborts_session(&self) -> bool {
        !matches!(self, AutodevError::AgentUnparseable(_))
    }
}

/// Result type for autodev domain operations.
pub type Result<T> = std::result::Result<T, AutodevError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_conflict_display() {
        let err = AutodevError::PushConflict {
            branch: "autocode/card-7".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("push conflict"));
        assert!(msg.contains("autocode/card-7"));
    }

    #[test]
    fn test_pipeline_not_configured_display() {
        let err = AutodevError::PipelineNotConfigured {
            repository: "billing-api".to_string(),
        };
        assert!(err.to_string().contains("billing-api"));
    }

    #[test]
    fn test_poll_timeout_display() {
        let err = AutodevError::PollTimeout {
            build_id: BuildId(412),
            timeout_secs: 1800,
        };
        let msg = err.to_string();
        assert!(msg.contains("412"));
        assert!(msg.contains("1800"));
    }

    #[test]
    fn test_agent_unparseable_does_not_abort() {
        assert!(!AutodevError::AgentUnparseable("bad json".to_string()).aborts_session());
        assert!(AutodevError::Cancelled.aborts_session());
        assert!(AutodevError::Orchestrator("502".to_string()).aborts_session());
    }
}
