//! Remediation session state: the bounded-retry context for turning one
//! work item into a verified change, plus its append-only audit trail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::change_set::ChangeSet;

/// Identifier of a build pipeline definition on the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineId(pub i64);

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a queued build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildId(pub i64);

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome of one attempt, and of the session as a whole.
///
/// `Aborted` denotes a non-build failure (push conflict, missing branch,
/// orchestrator unreachable, poll timeout, shutdown) that ends the session
/// without consuming the fix budget in the normal sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Succeeded,
    Failed,
    Aborted,
}

/// One auditable attempt. Appended exactly once per attempt, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub change_set_used: ChangeSet,
    pub outcome: BuildOutcome,
    pub diagnostic_summary: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// The bounded-retry context for one work item.
///
/// Owned exclusively by one in-flight remediation: created when processing
/// of a work item starts, discarded after it resolves. Never persisted or
/// shared across work items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationSession {
    pub work_item_id: u64,
    pub repository: String,
    pub branch: String,
    pub pipeline_id: PipelineId,

    /// Number of attempts started so far. Incremented by the loop before
    /// each push; attempt numbers in `history` match it.
    pub attempt: u32,
    pub max_attempts: u32,
    pub history: Vec<AttemptRecord>,
}

impl RemediationSession {
    pub fn new(
        work_item_id: u64,
        repository: impl Into<String>,
        branch: impl Into<String>,
        pipeline_id: PipelineId,
        max_attempts: u32,
    ) -> Self {
        Self {
            work_item_id,
            repository: repository.into(),
            branch: branch.into(),
            pipeline_id,
            attempt: 0,
            max_attempts,
            history: Vec::new(),
        }
    }

    /// Append the record for the current attempt. Records are append-only
    /// and carry strictly increasing attempt numbers.
    pub fn record_attempt(
        &mut self,
        change_set_used: ChangeSet,
        outcome: BuildOutcome,
        diagnostic_summary: Option<String>,
    ) {
        self.history.push(AttemptRecord {
            attempt_number: self.attempt,
            change_set_used,
            outcome,
            diagnostic_summary,
            recorded_at: Utc::now(),
        });
    }

    pub fn budget_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn failed_attempts(&self) -> usize {
        self.history
            .iter()
            .filter(|r| r.outcome == BuildOutcome::Failed)
            .count()
    }

    /// Consolidate the session's audit trail into a terminal failure report.
    pub fn report(&self, last_explanation: Option<String>) -> RemediationReport {
        let summaries = self
            .history
            .iter()
            .filter_map(|r| {
                r.diagnostic_summary
                    .as_ref()
                    .map(|s| (r.attempt_number, s.clone()))
            })
            .collect();

        RemediationReport {
            work_item_id: self.work_item_id,
            repository: self.repository.clone(),
            branch: self.branch.clone(),
            attempts_used: self.attempt,
            summaries,
            last_explanation,
        }
    }
}

/// Terminal failure report: every prior attempt's diagnostic summary plus
/// the explanation the agent returned with the last fix. Surfaced to the
/// driver for persistent recording (a ticket comment), never silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationReport {
    pub work_item_id: u64,
    pub repository: String,
    pub branch: String,
    pub attempts_used: u32,
    /// `(attempt_number, diagnostic_summary)` pairs in attempt order.
    pub summaries: Vec<(u32, String)>,
    pub last_explanation: Option<String>,
}

impl RemediationReport {
    /// Render the report for external posting.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Automated remediation of work item #{} gave up after {} attempt(s) \
             on branch '{}'.\n",
            self.work_item_id, self.attempts_used, self.branch
        );

        for (attempt, summary) in &self.summaries {
            out.push_str(&format!("\nAttempt {attempt} diagnostics:\n{summary}\n"));
        }

        if let Some(explanation) = &self.last_explanation {
            out.push_str(&format!("\nLast fix explanation:\n{explanation}\n"));
        }

        out
    }
}
