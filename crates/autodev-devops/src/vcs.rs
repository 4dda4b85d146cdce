//! Version-control gateway over the DevOps Git REST endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{debug, info, warn};

use autodev_core::{
    AutodevError, ChangeSet, FileChange, PullRequest, PushOutcome, Result, VersionControlGateway,
};

use crate::client::{snippet, RestClient};
use crate::wire::{
    ChangeKind, GitChange, GitCommit, GitItem, GitItemRef, GitPush, GitRef, GitRefUpdate,
    ItemContent, PullRequestBody, PullRequestCreated, VsoList,
};

/// The object id a ref update uses to mean "create, do not move".
const ZERO_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

/// Server error code for a rejected stale-head ref update.
const CONCURRENCY_ERROR_CODE: &str = "TF401028";

pub struct DevOpsVcs {
    rest: Arc<RestClient>,
}

impl DevOpsVcs {
    pub(crate) fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    /// Current head object id of a branch, or `None` if the branch is absent.
    async fn branch_head(&self, repo: &str, branch: &str) -> Result<Option<String>> {
        let url = self.rest.api_url(&format!("git/repositories/{repo}/refs"));
        let filter = format!("heads/{branch}");
        let expected = format!("refs/heads/{branch}");
        let list: VsoList<GitRef> = self
            .rest
            .get_json(&url, &[("filter", &filter)], "list refs")
            .await?;
        // The filter is a prefix match; pin to the exact ref name.
        Ok(list
            .value
            .into_iter()
            .find(|r| r.name == expected)
            .map(|r| r.object_id))
    }

    /// Whether a file exists on the branch. Add-vs-edit hinges on this.
    async fn item_exists(&self, repo: &str, branch: &str, path: &str) -> Result<bool> {
        let url = self.rest.api_url(&format!("git/repositories/{repo}/items"));
        let request = self.rest.request(Method::GET, &url).query(&[
            ("api-version", crate::client::API_VERSION),
            ("path", path),
            ("versionDescriptor.version", branch),
            ("versionDescriptor.versionType", "branch"),
        ]);
        let response = self.rest.send(request, "probe item").await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AutodevError::Gateway(format!(
                    "probe item '{path}': {status}: {}",
                    snippet(&body)
                )))
            }
        }
    }
}

#[async_trait]
impl VersionControlGateway for DevOpsVcs {
    async fn list_files(&self, repo: &str, branch: &str) -> Result<Vec<String>> {
        let url = self.rest.api_url(&format!("git/repositories/{repo}/items"));
        let list: VsoList<GitItem> = self
            .rest
            .get_json(
                &url,
                &[
                    ("scopePath", "/"),
                    ("recursionLevel", "full"),
                    ("includeContentMetadata", "false"),
                    ("versionDescriptor.version", branch),
                    ("versionDescriptor.versionType", "branch"),
                ],
                "list files",
            )
            .await?;
        Ok(list
            .value
            .into_iter()
            .filter(|item| !item.is_folder)
            .map(|item| item.path)
            .collect())
    }

    async fn read_files(
        &self,
        repo: &str,
        branch: &str,
        paths: &[String],
    ) -> Result<Vec<FileChange>> {
        let url = self.rest.api_url(&format!("git/repositories/{repo}/items"));
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let content = self
                .rest
                .get_text(
                    &url,
                    &[
                        ("path", path),
                        ("versionDescriptor.version", branch),
                        ("versionDescriptor.versionType", "branch"),
                        ("includeContent", "true"),
                        ("$format", "text"),
                    ],
                    "read file",
                )
                .await?;
            files.push(FileChange::new(path.clone(), content));
        }
        Ok(files)
    }

    async fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool> {
        Ok(self.branch_head(repo, branch).await?.is_some())
    }

    async fn create_branch(&self, repo: &str, source: &str, new_branch: &str) -> Result<()> {
        let head = self.branch_head(repo, source).await?.ok_or_else(|| {
            AutodevError::BranchNotFound {
                branch: source.to_string(),
            }
        })?;

        let url = self.rest.api_url(&format!("git/repositories/{repo}/refs"));
        let updates = vec![GitRefUpdate {
            name: format!("refs/heads/{new_branch}"),
            old_object_id: ZERO_OBJECT_ID.to_string(),
            new_object_id: Some(head),
        }];
        let _: serde_json::Value = self.rest.post_json(&url, &updates, "create branch").await?;
        info!(repo, source, branch = new_branch, "branch created");
        Ok(())
    }

    async fn push(&self, repo: &str, branch: &str, changes: &ChangeSet) -> Result<PushOutcome> {
        if changes.is_empty() {
            debug!(repo, branch, "empty change set; skipping push");
            return Ok(PushOutcome::NoOp);
        }

        let head =
            self.branch_head(repo, branch)
                .await?
                .ok_or_else(|| AutodevError::BranchNotFound {
                    branch: branch.to_string(),
                })?;

        let mut git_changes = Vec::with_capacity(changes.len());
        for change in changes.files() {
            let exists = self.item_exists(repo, branch, &change.path).await?;
            debug!(
                path = %change.path,
                kind = if exists { "edit" } else { "add" },
                "staging change"
            );
            git_changes.push(GitChange {
                change_type: if exists {
                    ChangeKind::Edit
                } else {
                    ChangeKind::Add
                },
                item: GitItemRef {
                    path: change.path.clone(),
                },
                new_content: ItemContent {
                    content: change.content.clone(),
                    content_type: "rawtext",
                },
            });
        }

        let body = GitPush {
            ref_updates: vec![GitRefUpdate {
                name: format!("refs/heads/{branch}"),
                old_object_id: head,
                new_object_id: None,
            }],
            commits: vec![GitCommit {
                comment: "autodev: automated change".to_string(),
                changes: git_changes,
            }],
        };

        let url = self.rest.api_url(&format!("git/repositories/{repo}/pushes"));
        let request = self
            .rest
            .request(Method::POST, &url)
            .query(&[("api-version", crate::client::API_VERSION)])
            .json(&body);
        let response = self.rest.send(request, "push").await?;

        let status = response.status();
        if status.is_success() {
            info!(repo, branch, files = changes.len(), "push landed");
            return Ok(PushOutcome::Pushed);
        }

        let text = response.text().await.unwrap_or_default();
        // The server rejects a stale oldObjectId either with 409 or with its
        // optimistic-concurrency error code in the body.
        if status == StatusCode::CONFLICT || text.contains(CONCURRENCY_ERROR_CODE) {
            warn!(repo, branch, "push rejected: branch head moved");
            return Err(AutodevError::PushConflict {
                branch: branch.to_string(),
            });
        }
        Err(AutodevError::Gateway(format!(
            "push to '{branch}': {status}: {}",
            snippet(&text)
        )))
    }

    async fn create_pull_request(
        &self,
        repo: &str,
        source: &str,
        target: &str,
        title: &str,
        description: &str,
    ) -> Result<PullRequest> {
        let url = self
            .rest
            .api_url(&format!("git/repositories/{repo}/pullrequests"));
        let body = PullRequestBody {
            source_ref_name: format!("refs/heads/{source}"),
            target_ref_name: format!("refs/heads/{target}"),
            title: title.to_string(),
            description: description.to_string(),
        };
        let created: PullRequestCreated = self
            .rest
            .post_json(&url, &body, "create pull request")
            .await?;

        let config = self.rest.config();
        let web_url = format!(
            "{}/{}/_git/{repo}/pullrequest/{}",
            config.organization_url.trim_end_matches('/'),
            config.project,
            created.pull_request_id
        );
        info!(repo, source, target, url = %web_url, "pull request opened");
        Ok(PullRequest {
            id: created.pull_request_id,
            url: web_url,
        })
    }
}
