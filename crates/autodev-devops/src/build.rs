//! Build orchestrator over the DevOps Build REST endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use autodev_core::{
    AutodevError, BuildId, BuildOrchestrator, BuildResult, BuildStatus, BuildStep, PipelineId,
    Result,
};

use crate::client::RestClient;
use crate::wire::{BuildDefinition, BuildRun, DefinitionRef, QueueBuildBody, Timeline, VsoList};

pub struct DevOpsBuilds {
    rest: Arc<RestClient>,
}

impl DevOpsBuilds {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

/// Map the server's status/result strings onto the orchestrator contract.
/// Anything non-terminal (notStarted, inProgress, cancelling, postponed)
/// reads as in progress; only a "succeeded" result reads as success.
fn map_status(run: &BuildRun) -> BuildStatus {
    if run.status.as_deref() != Some("completed") {
        return BuildStatus::InProgress;
    }
    match run.result.as_deref() {
        Some("succeeded") => BuildStatus::Completed(BuildResult::Succeeded),
        _ => BuildStatus::Completed(BuildResult::Failed),
    }
}

#[async_trait]
impl BuildOrchestrator for DevOpsBuilds {
    async fn resolve_pipeline(&self, repo: &str) -> Result<Option<PipelineId>> {
        let url = self.rest.api_url("build/definitions");
        let list: VsoList<BuildDefinition> = self
            .rest
            .get_json(&url, &[("name", repo)], "resolve pipeline")
            .await
            .map_err(|e| AutodevError::Orchestrator(e.to_string()))?;
        Ok(list.value.first().map(|d| PipelineId(d.id)))
    }

    async fn queue_build(&self, pipeline: PipelineId, branch: &str) -> Result<BuildId> {
        let url = self.rest.api_url("build/builds");
        let body = QueueBuildBody {
            definition: DefinitionRef { id: pipeline.0 },
            source_branch: format!("refs/heads/{branch}"),
        };
        let run: BuildRun = self
            .rest
            .post_json(&url, &body, "queue build")
            .await
            .map_err(|e| AutodevError::Orchestrator(e.to_string()))?;
        info!(pipeline = %pipeline, branch, build = run.id, "build queued");
        Ok(BuildId(run.id))
    }

    async fn fetch_build_status(&self, build: BuildId) -> Result<BuildStatus> {
        let url = self.rest.api_url(&format!("build/builds/{build}"));
        let run: BuildRun = self
            .rest
            .get_json(&url, &[], "fetch build")
            .await
            .map_err(|e| AutodevError::Orchestrator(e.to_string()))?;
        let status = map_status(&run);
        debug!(build = %build, ?status, "build status");
        Ok(status)
    }

    async fn failed_steps(&self, build: BuildId) -> Result<Vec<BuildStep>> {
        let url = self.rest.api_url(&format!("build/builds/{build}/timeline"));
        let timeline: Timeline = self
            .rest
            .get_json(&url, &[], "fetch timeline")
            .await
            .map_err(|e| AutodevError::Orchestrator(e.to_string()))?;

        Ok(timeline
            .records
            .into_iter()
            .filter(|r| r.result.as_deref() == Some("failed"))
            .map(|r| BuildStep {
                name: r.name.unwrap_or_else(|| "unnamed step".to_string()),
                log_id: r.log.map(|l| l.id),
            })
            .collect())
    }

    async fn step_log(&self, build: BuildId, log_id: i64) -> Result<Vec<String>> {
        let url = self
            .rest
            .api_url(&format!("build/builds/{build}/logs/{log_id}"));
        let lines: VsoList<String> = self
            .rest
            .get_json(&url, &[], "fetch step log")
            .await
            .map_err(|e| AutodevError::Orchestrator(e.to_string()))?;
        Ok(lines.value)
    }
}
