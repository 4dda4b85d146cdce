//! Per-ticket driver: one work item at a time, end to end.
//!
//! A scan fetches pending tagged items and runs each through: directive
//! extraction, pipeline resolution, work-branch setup, initial proposal,
//! the remediation loop, and outcome recording back onto the ticket. Any
//! failure is contained at the item boundary — one bad ticket never takes
//! the worker down.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use autodev_core::{
    BuildOrchestrator, BuildOutcome, CodeAgent, RemediationConfig, RemediationLoop,
    RemediationSession, Result, VersionControlGateway,
};
use autodev_devops::{TicketGateway, WorkItem};

use crate::directive::{extract_directive, strip_markup};

/// Key of the repository directive inside ticket bodies (`@repo:<name>`).
const REPO_DIRECTIVE: &str = "repo";

#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Tag that opts a work item into automation.
    pub tag: String,
    /// Branch pull requests target.
    pub target_branch: String,
    /// Fix attempts per work item before giving up.
    pub max_attempts: u32,
    pub remediation: RemediationConfig,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            tag: "autocode".to_string(),
            target_branch: "main".to_string(),
            max_attempts: 3,
            remediation: RemediationConfig::default(),
        }
    }
}

pub struct Driver {
    gateway: Arc<dyn VersionControlGateway>,
    orchestrator: Arc<dyn BuildOrchestrator>,
    agent: Arc<dyn CodeAgent>,
    tickets: Arc<dyn TicketGateway>,
    settings: DriverSettings,
    shutdown: watch::Receiver<bool>,
}

impl Driver {
    pub fn new(
        gateway: Arc<dyn VersionControlGateway>,
        orchestrator: Arc<dyn BuildOrchestrator>,
        agent: Arc<dyn CodeAgent>,
        tickets: Arc<dyn TicketGateway>,
        settings: DriverSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            gateway,
            orchestrator,
            agent,
            tickets,
            settings,
            shutdown,
        }
    }

    /// One scan: fetch pending items and process them sequentially.
    /// Returns how many items resolved without error this pass.
    pub async fn scan_once(&self) -> usize {
        let items = match self.tickets.pending_work_items(&self.settings.tag).await {
            Ok(items) => items,
            Err(err) => {
                error!(error = %err, "work item scan failed");
                return 0;
            }
        };

        if items.is_empty() {
            info!(tag = %self.settings.tag, "no pending work items");
            return 0;
        }

        let mut processed = 0;
        for item in items {
            if *self.shutdown.borrow() {
                info!("shutdown requested; stopping scan");
                break;
            }

            let run_id = Uuid::new_v4();
            info!(
                run = %run_id,
                work_item = item.id,
                title = %item.title,
                "processing work item"
            );
            match self.process_work_item(&item).await {
                Ok(()) => processed += 1,
                Err(err) => {
                    error!(
                        run = %run_id,
                        work_item = item.id,
                        error = %err,
                        "work item left for a future scan"
                    );
                }
            }
        }
        processed
    }

    async fn process_work_item(&self, item: &WorkItem) -> Result<()> {
        let Some(repo) = extract_directive(&item.description, REPO_DIRECTIVE) else {
            warn!(
                work_item = item.id,
                "description carries no @repo directive; skipping"
            );
            return Ok(());
        };

        let Some(pipeline) = self.orchestrator.resolve_pipeline(&repo).await? else {
            info!(work_item = item.id, repo = %repo, "no pipeline configured; skipping");
            return Ok(());
        };

        let branch = format!("autocode/card-{}", item.id);
        if !self.gateway.branch_exists(&repo, &branch).await? {
            self.gateway
                .create_branch(&repo, &self.settings.target_branch, &branch)
                .await?;
        }

        let paths = self.gateway.list_files(&repo, &branch).await?;
        let project_exists = !paths.is_empty();
        let existing_files = self.gateway.read_files(&repo, &branch, &paths).await?;

        let story = format!("{}\n\n{}", item.title, strip_markup(&item.description));
        let proposal = self
            .agent
            .propose_changes(&story, &existing_files, project_exists)
            .await?;

        if proposal.is_empty() {
            info!(work_item = item.id, "agent produced no changes");
            self.tickets
                .post_comment(
                    item.id,
                    "Automated processing produced no changes for this work item.",
                )
                .await?;
            return Ok(());
        }

        let session = RemediationSession::new(
            item.id,
            repo.clone(),
            branch.clone(),
            pipeline,
            self.settings.max_attempts,
        );
        let remediation = RemediationLoop::new(
            self.gateway.clone(),
            self.orchestrator.clone(),
            self.agent.clone(),
            self.settings.remediation.clone(),
            self.shutdown.clone(),
        );
        let outcome = remediation.run(session, proposal).await;

        match outcome.outcome {
            BuildOutcome::Succeeded => {
                let pr = self
                    .gateway
                    .create_pull_request(
                        &repo,
                        &branch,
                        &self.settings.target_branch,
                        &format!("Card {}: {}", item.id, item.title),
                        &format!("Automated change for work item #{}.", item.id),
                    )
                    .await?;
                self.tickets
                    .post_comment(
                        item.id,
                        &format!(
                            "This work item was processed automatically. Pull request: {}",
                            pr.url
                        ),
                    )
                    .await?;
                self.tickets.mark_processed(item.id).await?;
                info!(work_item = item.id, pr = %pr.url, "work item processed");
            }
            BuildOutcome::Failed => {
                if let Some(report) = &outcome.report {
                    self.tickets.post_comment(item.id, &report.render()).await?;
                }
                warn!(
                    work_item = item.id,
                    attempts = outcome.session.attempt,
                    "remediation exhausted its fix budget"
                );
            }
            BuildOutcome::Aborted => {
                warn!(
                    work_item = item.id,
                    reason = outcome.abort_reason.as_deref().unwrap_or("unknown"),
                    "remediation aborted; item left for a future scan"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use autodev_core::{
        BuildId, BuildResult, BuildStatus, BuildStep, ChangeSet, FileChange, FixProposal,
        PipelineId, PullRequest, PushOutcome,
    };

    #[derive(Default)]
    struct FakeVcs {
        branch_present: bool,
        push_calls: Mutex<u32>,
        created_branches: Mutex<Vec<String>>,
        pull_requests: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl VersionControlGateway for FakeVcs {
        async fn list_files(&self, _repo: &str, _branch: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn read_files(
            &self,
            _repo: &str,
            _branch: &str,
            _paths: &[String],
        ) -> Result<Vec<FileChange>> {
            Ok(Vec::new())
        }

        async fn branch_exists(&self, _repo: &str, _branch: &str) -> Result<bool> {
            Ok(self.branch_present)
        }

        async fn create_branch(&self, _repo: &str, _source: &str, new_branch: &str) -> Result<()> {
            self.created_branches
                .lock()
                .unwrap()
                .push(new_branch.to_string());
            Ok(())
        }

        async fn push(
            &self,
            _repo: &str,
            _branch: &str,
            changes: &ChangeSet,
        ) -> Result<PushOutcome> {
            *self.push_calls.lock().unwrap() += 1;
            Ok(if changes.is_empty() {
                PushOutcome::NoOp
            } else {
                PushOutcome::Pushed
            })
        }

        async fn create_pull_request(
            &self,
            _repo: &str,
            source: &str,
            target: &str,
            _title: &str,
            _description: &str,
        ) -> Result<PullRequest> {
            self.pull_requests
                .lock()
                .unwrap()
                .push((source.to_string(), target.to_string()));
            Ok(PullRequest {
                id: 1,
                url: "https://devops.example/pr/1".to_string(),
            })
        }
    }

    struct FakeBuilds {
        pipeline: Option<PipelineId>,
        resolve_calls: Mutex<u32>,
    }

    impl FakeBuilds {
        fn with_pipeline() -> Self {
            Self {
                pipeline: Some(PipelineId(7)),
                resolve_calls: Mutex::new(0),
            }
        }

        fn without_pipeline() -> Self {
            Self {
                pipeline: None,
                resolve_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl BuildOrchestrator for FakeBuilds {
        async fn resolve_pipeline(&self, _repo: &str) -> Result<Option<PipelineId>> {
            *self.resolve_calls.lock().unwrap() += 1;
            Ok(self.pipeline)
        }

        async fn queue_build(&self, _pipeline: PipelineId, _branch: &str) -> Result<BuildId> {
            Ok(BuildId(1))
        }

        async fn fetch_build_status(&self, _build: BuildId) -> Result<BuildStatus> {
            Ok(BuildStatus::Completed(BuildResult::Succeeded))
        }

        async fn failed_steps(&self, _build: BuildId) -> Result<Vec<BuildStep>> {
            Ok(Vec::new())
        }

        async fn step_log(&self, _build: BuildId, _log_id: i64) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct FakeAgent {
        proposal: ChangeSet,
    }

    #[async_trait]
    impl CodeAgent for FakeAgent {
        async fn propose_changes(
            &self,
            _story_text: &str,
            _existing_files: &[FileChange],
            _project_exists: bool,
        ) -> Result<ChangeSet> {
            Ok(self.proposal.clone())
        }

        async fn fix_build_failure(
            &self,
            _work_item_id: u64,
            _prior_change_set: &ChangeSet,
            _diagnostic_summary: &str,
            _current_branch_files: &[FileChange],
        ) -> Result<FixProposal> {
            Ok(FixProposal::default())
        }
    }

    #[derive(Default)]
    struct FakeTickets {
        items: Vec<WorkItem>,
        comments: Mutex<Vec<(u64, String)>>,
        processed: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl TicketGateway for FakeTickets {
        async fn pending_work_items(&self, _tag: &str) -> Result<Vec<WorkItem>> {
            Ok(self.items.clone())
        }

        async fn post_comment(&self, work_item_id: u64, text: &str) -> Result<()> {
            self.comments
                .lock()
                .unwrap()
                .push((work_item_id, text.to_string()));
            Ok(())
        }

        async fn mark_processed(&self, work_item_id: u64) -> Result<()> {
            self.processed.lock().unwrap().push(work_item_id);
            Ok(())
        }
    }

    fn work_item(id: u64, description: &str) -> WorkItem {
        WorkItem {
            id,
            title: format!("Story {id}"),
            description: description.to_string(),
            state: "New".to_string(),
        }
    }

    struct World {
        vcs: Arc<FakeVcs>,
        builds: Arc<FakeBuilds>,
        tickets: Arc<FakeTickets>,
        driver: Driver,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn world(vcs: FakeVcs, builds: FakeBuilds, agent: FakeAgent, tickets: FakeTickets) -> World {
        let vcs = Arc::new(vcs);
        let builds = Arc::new(builds);
        let tickets = Arc::new(tickets);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = Driver::new(
            vcs.clone(),
            builds.clone(),
            Arc::new(agent),
            tickets.clone(),
            DriverSettings::default(),
            shutdown_rx,
        );
        World {
            vcs,
            builds,
            tickets,
            driver,
            _shutdown_tx: shutdown_tx,
        }
    }

    #[tokio::test]
    async fn empty_proposal_skips_push_and_build() {
        let w = world(
            FakeVcs {
                branch_present: true,
                ..FakeVcs::default()
            },
            FakeBuilds::with_pipeline(),
            FakeAgent {
                proposal: ChangeSet::empty(),
            },
            FakeTickets {
                items: vec![work_item(42, "@repo:billing-api do the thing")],
                ..FakeTickets::default()
            },
        );

        let processed = w.driver.scan_once().await;
        assert_eq!(processed, 1);
        assert_eq!(*w.vcs.push_calls.lock().unwrap(), 0);

        let comments = w.tickets.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].1.contains("no changes"));
        assert!(w.tickets.processed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_remediation_opens_pr_and_marks_processed() {
        let w = world(
            FakeVcs::default(),
            FakeBuilds::with_pipeline(),
            FakeAgent {
                proposal: ChangeSet::new(vec![FileChange::new("/src/lib.rs", "pub fn f() {}")]),
            },
            FakeTickets {
                items: vec![work_item(42, "<div>@repo:billing-api</div>")],
                ..FakeTickets::default()
            },
        );

        let processed = w.driver.scan_once().await;
        assert_eq!(processed, 1);

        // The missing work branch was created from the target branch.
        assert_eq!(
            w.vcs.created_branches.lock().unwrap().as_slice(),
            ["autocode/card-42".to_string()]
        );

        // A pull request went from the work branch to main.
        let prs = w.vcs.pull_requests.lock().unwrap();
        assert_eq!(prs.as_slice(), [("autocode/card-42".to_string(), "main".to_string())]);

        // The ticket got a comment carrying the PR link and left the scan.
        let comments = w.tickets.comments.lock().unwrap();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].1.contains("https://devops.example/pr/1"));
        assert_eq!(w.tickets.processed.lock().unwrap().as_slice(), [42]);
    }

    #[tokio::test]
    async fn missing_directive_skips_item_silently() {
        let w = world(
            FakeVcs::default(),
            FakeBuilds::with_pipeline(),
            FakeAgent {
                proposal: ChangeSet::empty(),
            },
            FakeTickets {
                items: vec![work_item(9, "<div>no directive here</div>")],
                ..FakeTickets::default()
            },
        );

        w.driver.scan_once().await;
        assert_eq!(*w.builds.resolve_calls.lock().unwrap(), 0);
        assert!(w.tickets.comments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_pipeline_skips_item() {
        let w = world(
            FakeVcs::default(),
            FakeBuilds::without_pipeline(),
            FakeAgent {
                proposal: ChangeSet::empty(),
            },
            FakeTickets {
                items: vec![work_item(9, "@repo:side-project")],
                ..FakeTickets::default()
            },
        );

        let processed = w.driver.scan_once().await;
        assert_eq!(processed, 1);
        assert_eq!(*w.builds.resolve_calls.lock().unwrap(), 1);
        assert!(w.vcs.created_branches.lock().unwrap().is_empty());
        assert_eq!(*w.vcs.push_calls.lock().unwrap(), 0);
    }
}
