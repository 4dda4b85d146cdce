//! Build orchestrator contract.
//!
//! The collaborator build system is polling-only: the loop owns the poll
//! cadence, cancellation, and the wall-clock bound; the orchestrator just
//! answers point-in-time status questions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{BuildId, PipelineId, Result};

/// Terminal result of a build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Succeeded,
    Failed,
}

/// Point-in-time status of a build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    InProgress,
    Completed(BuildResult),
}

/// One failed step of a build run, as reported by the run's step breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub name: String,
    /// Identifier of the step's log, when the step produced one.
    pub log_id: Option<i64>,
}

/// Contract for queueing builds and retrieving their results and logs.
#[async_trait]
pub trait BuildOrchestrator: Send + Sync {
    /// Resolve the pipeline configured for a repository. `None` means no
    /// pipeline is configured and the work item should be skipped entirely.
    async fn resolve_pipeline(&self, repo: &str) -> Result<Option<PipelineId>>;

    /// Queue a run of `pipeline` against `branch`.
    async fn queue_build(&self, pipeline: PipelineId, branch: &str) -> Result<BuildId>;

    /// Current status of a run. The caller polls this until terminal.
    async fn fetch_build_status(&self, build: BuildId) -> Result<BuildStatus>;

    /// The failed steps of a completed run.
    async fn failed_steps(&self, build: BuildId) -> Result<Vec<BuildStep>>;

    /// Raw log lines for one step of a run.
    async fn step_log(&self, build: BuildId, log_id: i64) -> Result<Vec<String>>;
}
