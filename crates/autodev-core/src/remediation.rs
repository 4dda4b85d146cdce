//! The remediation loop: drive a [`RemediationSession`] to a terminal
//! [`BuildOutcome`] by pushing a candidate change set, building it, and
//! feeding failure diagnostics back to the agent for a bounded number of
//! fix attempts.
//!
//! Implemented as an explicit iterative loop over session state, so the
//! attempt budget never couples to stack depth. The build-status poll is the
//! only suspension point; it is cancellable between ticks via a
//! `tokio::sync::watch` shutdown flag and bounded by a wall-clock timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::agent::CodeAgent;
use crate::diagnostics::{summarize_failed_steps, ExtractionConfig, StepLog};
use crate::domain::{
    AutodevError, BuildId, BuildOutcome, ChangeSet, FileChange, RemediationReport,
    RemediationSession, Result,
};
use crate::gateway::{PushOutcome, VersionControlGateway};
use crate::orchestrator::{BuildOrchestrator, BuildResult, BuildStatus};

/// Tuning knobs for the loop.
#[derive(Debug, Clone)]
pub struct RemediationConfig {
    /// Fixed cadence between build-status polls.
    pub poll_interval: Duration,

    /// Wall-clock bound on one build's polling. A hung build must not hang
    /// the whole work queue; hitting the bound aborts the session.
    pub poll_timeout: Duration,

    pub diagnostics: ExtractionConfig,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(30 * 60),
            diagnostics: ExtractionConfig::default(),
        }
    }
}

/// How one session ended.
#[derive(Debug)]
pub struct RemediationOutcome {
    pub outcome: BuildOutcome,

    /// The session with its full attempt history.
    pub session: RemediationSession,

    /// Present only on fix-budget exhaustion: the consolidated diagnostic
    /// report for external posting.
    pub report: Option<RemediationReport>,

    /// Present only on `Aborted`: what cut the session short.
    pub abort_reason: Option<String>,
}

/// The bounded push -> build -> diagnose -> fix loop.
pub struct RemediationLoop {
    gateway: Arc<dyn VersionControlGateway>,
    orchestrator: Arc<dyn BuildOrchestrator>,
    agent: Arc<dyn CodeAgent>,
    config: RemediationConfig,
    shutdown: watch::Receiver<bool>,
}

impl RemediationLoop {
    pub fn new(
        gateway: Arc<dyn VersionControlGateway>,
        orchestrator: Arc<dyn BuildOrchestrator>,
        agent: Arc<dyn CodeAgent>,
        config: RemediationConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway,
            orchestrator,
            agent,
            config,
            shutdown,
        }
    }

    /// Drive `session` to a terminal outcome, starting from `change_set`.
    ///
    /// Side effects are strictly additive: each attempt appends exactly one
    /// [`AttemptRecord`](crate::AttemptRecord), and the change set used by
    /// attempt n+1 is always the agent's response to attempt n's failure.
    /// All collaborator errors are recovered here into an `Aborted` outcome;
    /// this never returns an error to the caller.
    pub async fn run(
        &self,
        mut session: RemediationSession,
        change_set: ChangeSet,
    ) -> RemediationOutcome {
        let mut current = change_set;
        let mut last_explanation: Option<String> = None;

        loop {
            session.attempt += 1;
            info!(
                work_item = session.work_item_id,
                attempt = session.attempt,
                max_attempts = session.max_attempts,
                branch = %session.branch,
                "starting remediation attempt"
            );

            // Push phase. A conflict or any other push failure is external
            // interference, not a defect in the generated code: abort
            // without consuming the fix budget.
            match self
                .gateway
                .push(&session.repository, &session.branch, &current)
                .await
            {
                Ok(PushOutcome::Pushed) => {
                    info!(files = current.len(), "change set pushed");
                }
                Ok(PushOutcome::NoOp) => {
                    info!("empty change set; building existing branch content");
                }
                Err(err) => {
                    warn!(error = %err, "push failed; aborting session");
                    session.record_attempt(current, BuildOutcome::Aborted, Some(err.to_string()));
                    return Self::aborted(session, err);
                }
            }

            // Build phase.
            let build_id = match self
                .orchestrator
                .queue_build(session.pipeline_id, &session.branch)
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    warn!(error = %err, "failed to queue build; aborting session");
                    session.record_attempt(current, BuildOutcome::Aborted, Some(err.to_string()));
                    return Self::aborted(session, err);
                }
            };
            info!(build = %build_id, branch = %session.branch, "build queued");

            let result = match self.poll_until_terminal(build_id).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(build = %build_id, error = %err, "build wait ended; aborting session");
                    session.record_attempt(current, BuildOutcome::Aborted, Some(err.to_string()));
                    return Self::aborted(session, err);
                }
            };

            if result == BuildResult::Succeeded {
                info!(build = %build_id, attempt = session.attempt, "build succeeded");
                session.record_attempt(current, BuildOutcome::Succeeded, None);
                return RemediationOutcome {
                    outcome: BuildOutcome::Succeeded,
                    session,
                    report: None,
                    abort_reason: None,
                };
            }

            warn!(build = %build_id, "build failed; collecting diagnostics");
            let summary = match self.collect_diagnostics(build_id).await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(build = %build_id, error = %err, "could not retrieve diagnostics; aborting session");
                    session.record_attempt(current, BuildOutcome::Aborted, Some(err.to_string()));
                    return Self::aborted(session, err);
                }
            };
            session.record_attempt(current.clone(), BuildOutcome::Failed, Some(summary.clone()));

            if session.budget_exhausted() {
                error!(
                    work_item = session.work_item_id,
                    attempts = session.attempt,
                    "fix budget exhausted"
                );
                let report = session.report(last_explanation.take());
                return RemediationOutcome {
                    outcome: BuildOutcome::Failed,
                    session,
                    report: Some(report),
                    abort_reason: None,
                };
            }

            // Fix phase. The agent sees the branch's *current* content,
            // which may differ from the attempted change set if the push
            // partially landed. The attempt already carries its record, so
            // failures from here on abort without appending another one.
            let branch_files = match self.branch_files(&session).await {
                Ok(files) => files,
                Err(err) => {
                    warn!(error = %err, "could not read branch content for fix; aborting session");
                    return Self::aborted(session, err);
                }
            };

            info!(work_item = session.work_item_id, "requesting fix from agent");
            let proposal = match self
                .agent
                .fix_build_failure(session.work_item_id, &current, &summary, &branch_files)
                .await
            {
                Ok(proposal) => proposal,
                Err(err) => {
                    warn!(error = %err, "agent fix request failed; aborting session");
                    return Self::aborted(session, err);
                }
            };

            if proposal.changes.is_empty() {
                warn!("agent produced no fix; next attempt rebuilds the branch as-is");
            }
            if let Some(explanation) = &proposal.explanation {
                info!(explanation = %explanation, "agent fix explanation");
            }

            last_explanation = proposal.explanation;
            current = proposal.changes;
        }
    }

    /// Poll the build at a fixed cadence until it reaches a terminal status,
    /// the wall-clock bound expires, or shutdown is signalled. A shutdown
    /// observed mid-poll abandons the in-flight build (it is not cancelled
    /// remotely); a future scan of the same work item may re-queue.
    async fn poll_until_terminal(&self, build: BuildId) -> Result<BuildResult> {
        let started = Instant::now();
        let mut shutdown = self.shutdown.clone();

        loop {
            if *shutdown.borrow() {
                return Err(AutodevError::Cancelled);
            }

            if let BuildStatus::Completed(result) =
                self.orchestrator.fetch_build_status(build).await?
            {
                return Ok(result);
            }

            if started.elapsed() >= self.config.poll_timeout {
                return Err(AutodevError::PollTimeout {
                    build_id: build,
                    timeout_secs: self.config.poll_timeout.as_secs(),
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(AutodevError::Cancelled);
                    }
                }
            }
        }
    }

    async fn collect_diagnostics(&self, build: BuildId) -> Result<String> {
        let steps = self.orchestrator.failed_steps(build).await?;

        let mut step_logs = Vec::new();
        for step in &steps {
            let Some(log_id) = step.log_id else { continue };
            let lines = self.orchestrator.step_log(build, log_id).await?;
            step_logs.push(StepLog::new(step.name.clone(), lines));
        }

        Ok(summarize_failed_steps(&step_logs, &self.config.diagnostics))
    }

    async fn branch_files(&self, session: &RemediationSession) -> Result<Vec<FileChange>> {
        let paths = self
            .gateway
            .list_files(&session.repository, &session.branch)
            .await?;
        self.gateway
            .read_files(&session.repository, &session.branch, &paths)
            .await
    }

    fn aborted(session: RemediationSession, err: AutodevError) -> RemediationOutcome {
        RemediationOutcome {
            outcome: BuildOutcome::Aborted,
            session,
            report: None,
            abort_reason: Some(err.to_string()),
        }
    }
}
