//! autodev core library.
//!
//! Domain models and the remediation loop that turns a proposed change set
//! into a verified, mergeable code change:
//! - change-set and session models with an append-only attempt audit trail
//! - collaborator traits for the version-control gateway, the build
//!   orchestrator, and the code-generation agent
//! - bounded diagnostic extraction from failed build-step logs
//! - the bounded push -> build -> fix retry loop itself

pub mod agent;
pub mod diagnostics;
pub mod domain;
pub mod gateway;
pub mod orchestrator;
pub mod remediation;

pub use agent::{CodeAgent, FixProposal};
pub use diagnostics::{summarize_failed_steps, ExtractionConfig, StepLog};
pub use domain::{
    AttemptRecord, AutodevError, BuildId, BuildOutcome, ChangeSet, FileChange, PipelineId,
    RemediationReport, RemediationSession, Result,
};
pub use gateway::{PullRequest, PushOutcome, VersionControlGateway};
pub use orchestrator::{BuildOrchestrator, BuildResult, BuildStatus, BuildStep};
pub use remediation::{RemediationConfig, RemediationLoop, RemediationOutcome};
