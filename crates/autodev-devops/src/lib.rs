//! REST adapters for the DevOps server.
//!
//! One authenticated connection fans out into three adapters:
//! - [`DevOpsVcs`]: the version-control gateway (branches, files, pushes,
//!   pull requests)
//! - [`DevOpsBuilds`]: the build orchestrator (pipelines, runs, timelines,
//!   logs)
//! - [`DevOpsTickets`]: the work-item service (tagged queries, comments,
//!   state transitions)
//!
//! Authentication is attached per request; there is no shared mutable
//! header state between concurrent calls.

mod build;
mod client;
mod tickets;
mod vcs;
mod wire;

use std::sync::Arc;

use autodev_core::Result;

pub use build::DevOpsBuilds;
pub use client::DevOpsConfig;
pub use tickets::{DevOpsTickets, TicketGateway, WorkItem};
pub use vcs::DevOpsVcs;

use client::RestClient;

/// An authenticated connection to one DevOps organization/project.
#[derive(Clone)]
pub struct DevOpsConnection {
    rest: Arc<RestClient>,
}

impl DevOpsConnection {
    pub fn new(config: DevOpsConfig) -> Result<Self> {
        Ok(Self {
            rest: Arc::new(RestClient::new(config)?),
        })
    }

    pub fn vcs(&self) -> DevOpsVcs {
        DevOpsVcs::new(self.rest.clone())
    }

    pub fn builds(&self) -> DevOpsBuilds {
        DevOpsBuilds::new(self.rest.clone())
    }

    pub fn tickets(&self) -> DevOpsTickets {
        DevOpsTickets::new(self.rest.clone())
    }
}
