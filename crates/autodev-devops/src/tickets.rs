//! Work-item (ticket) service: tagged queries, comments, state transitions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use autodev_core::{AutodevError, Result};

use crate::client::RestClient;
use crate::wire::{CommentBody, PatchOp, VsoList, WiqlBody, WiqlResponse, WorkItemDto};

/// The comments endpoint has no GA version on this surface yet.
const COMMENTS_API_VERSION: &str = "7.1-preview.3";

/// State a work item is moved to once a pull request is open for it. Items
/// in this state (or closed) are excluded from subsequent scans.
const PROCESSED_STATE: &str = "Active";

/// One ticket describing a desired change. The description is a rich-text
/// body carrying a repository directive for the driver to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub state: String,
}

/// Contract for the ticketing surface consumed by the driver.
#[async_trait]
pub trait TicketGateway: Send + Sync {
    /// Work items carrying `tag` that have not been processed or closed,
    /// most recently changed first.
    async fn pending_work_items(&self, tag: &str) -> Result<Vec<WorkItem>>;

    async fn post_comment(&self, work_item_id: u64, text: &str) -> Result<()>;

    /// Transition the item into the processed state so it leaves the scan.
    async fn mark_processed(&self, work_item_id: u64) -> Result<()>;
}

pub struct DevOpsTickets {
    rest: Arc<RestClient>,
}

impl DevOpsTickets {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

fn pending_query(project: &str, tag: &str) -> String {
    format!(
        "SELECT [System.Id], [System.Title] \
         FROM WorkItems \
         WHERE [System.TeamProject] = '{project}' \
           AND [System.WorkItemType] = 'User Story' \
           AND [System.Tags] CONTAINS '{tag}' \
           AND [System.State] <> 'Closed' \
           AND [System.State] <> '{PROCESSED_STATE}' \
         ORDER BY [System.ChangedDate] DESC"
    )
}

#[async_trait]
impl TicketGateway for DevOpsTickets {
    async fn pending_work_items(&self, tag: &str) -> Result<Vec<WorkItem>> {
        let query = pending_query(&self.rest.config().project, tag);

        let url = self.rest.api_url("wit/wiql");
        let response: WiqlResponse = self
            .rest
            .post_json(&url, &WiqlBody { query }, "wiql query")
            .await
            .map_err(|e| AutodevError::WorkItem(e.to_string()))?;

        if response.work_items.is_empty() {
            debug!(tag, "no pending work items");
            return Ok(Vec::new());
        }

        let ids = response
            .work_items
            .iter()
            .map(|r| r.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.rest.api_url("wit/workitems");
        let items: VsoList<WorkItemDto> = self
            .rest
            .get_json(
                &url,
                &[
                    ("ids", ids.as_str()),
                    ("fields", "System.Title,System.Description,System.State"),
                ],
                "fetch work items",
            )
            .await
            .map_err(|e| AutodevError::WorkItem(e.to_string()))?;

        info!(tag, count = items.value.len(), "pending work items fetched");
        Ok(items
            .value
            .into_iter()
            .map(|dto| WorkItem {
                id: dto.id,
                title: dto.fields.title,
                description: dto.fields.description,
                state: dto.fields.state,
            })
            .collect())
    }

    async fn post_comment(&self, work_item_id: u64, text: &str) -> Result<()> {
        let url = self
            .rest
            .api_url(&format!("wit/workItems/{work_item_id}/comments"));
        let _: serde_json::Value = self
            .rest
            .post_json_versioned(
                &url,
                &CommentBody {
                    text: text.to_string(),
                },
                COMMENTS_API_VERSION,
                "post comment",
            )
            .await
            .map_err(|e| AutodevError::WorkItem(e.to_string()))?;
        info!(work_item = work_item_id, "comment posted");
        Ok(())
    }

    async fn mark_processed(&self, work_item_id: u64) -> Result<()> {
        let url = self.rest.api_url(&format!("wit/workitems/{work_item_id}"));
        let ops = vec![PatchOp {
            op: "replace",
            path: "/fields/System.State".to_string(),
            value: PROCESSED_STATE.to_string(),
        }];
        let request = self
            .rest
            .request(reqwest::Method::PATCH, &url)
            .query(&[("api-version", crate::client::API_VERSION)])
            .header("Content-Type", "application/json-patch+json")
            .body(serde_json::to_string(&ops)?);
        let response = self.rest.send(request, "update work item state").await?;
        crate::client::expect_success(response, "update work item state")
            .await
            .map_err(|e| AutodevError::WorkItem(e.to_string()))?;
        info!(work_item = work_item_id, state = PROCESSED_STATE, "work item state updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_query_filters_tag_and_states() {
        let query = pending_query("payments", "autocode");
        assert!(query.contains("[System.TeamProject] = 'payments'"));
        assert!(query.contains("[System.Tags] CONTAINS 'autocode'"));
        assert!(query.contains("[System.State] <> 'Closed'"));
        assert!(query.contains("[System.State] <> 'Active'"));
        assert!(query.contains("ORDER BY [System.ChangedDate] DESC"));
    }

    #[test]
    fn test_patch_op_serializes_to_json_patch() {
        let ops = vec![PatchOp {
            op: "replace",
            path: "/fields/System.State".to_string(),
            value: PROCESSED_STATE.to_string(),
        }];
        let json = serde_json::to_value(&ops).expect("serialize");
        assert_eq!(json[0]["op"], "replace");
        assert_eq!(json[0]["path"], "/fields/System.State");
        assert_eq!(json[0]["value"], "Active");
    }
}
