//! Domain models for autodev.
//!
//! Canonical definitions for the core entities:
//! - `FileChange` / `ChangeSet`: the unit of proposed work
//! - `RemediationSession`: the bounded-retry context for one work item
//! - `AttemptRecord` / `RemediationReport`: the append-only audit trail

pub mod change_set;
pub mod error;
pub mod session;

pub use change_set::{ChangeSet, FileChange};
pub use error::{AutodevError, Result};
pub use session::{
    AttemptRecord, BuildId, BuildOutcome, PipelineId, RemediationReport, RemediationSession,
};
