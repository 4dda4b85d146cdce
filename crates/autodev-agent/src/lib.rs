//! Chat-completions client implementing the autodev code-generation agent.
//!
//! Speaks the OpenAI-compatible chat API: one system message, one user
//! message, temperature 0. Transient failures (timeouts, 429, 5xx) are
//! retried with exponential backoff; unparseable model output degrades to
//! an empty change set rather than failing the session.

mod parse;
mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use autodev_core::{AutodevError, ChangeSet, CodeAgent, FileChange, FixProposal, Result};

const SYSTEM_PROMPT: &str =
    "You are an expert backend software engineer. You always answer in the exact JSON format requested.";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// Connection settings for the agent endpoint.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4.1".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

fn backoff(retry_count: u32) -> Duration {
    let factor = BACKOFF_MULTIPLIER.pow(retry_count.saturating_sub(1));
    Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(factor))
}

fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn truncate(content: &str, max: usize) -> &str {
    let mut end = max.min(content.len());
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[..end]
}

/// The code-generation agent over an OpenAI-compatible chat API.
pub struct ChatAgent {
    config: AgentConfig,
    http: reqwest::Client,
}

impl ChatAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("autodev/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AutodevError::Agent(format!("failed to build http client: {e}")))?;
        Ok(Self { config, http })
    }

    /// One chat completion with bounded retry on transient failures.
    async fn complete(&self, user_prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.0,
        };

        let mut retry_count = 0u32;
        loop {
            let response = match self
                .http
                .post(&self.config.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    if is_retryable_network_error(&err) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        warn!(retry = retry_count, error = %err, "agent request failed; retrying");
                        tokio::time::sleep(backoff(retry_count)).await;
                        continue;
                    }
                    return Err(AutodevError::Agent(err.to_string()));
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                if retry_count < MAX_RETRIES {
                    retry_count += 1;
                    warn!(retry = retry_count, %status, "agent endpoint throttled; backing off");
                    tokio::time::sleep(backoff(retry_count)).await;
                    continue;
                }
                return Err(AutodevError::Agent(format!(
                    "gave up after {retry_count} retries: {status}"
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AutodevError::Agent(format!(
                    "{status}: {}",
                    truncate(&body, 200)
                )));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| AutodevError::Agent(format!("invalid response body: {e}")))?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            if content.is_empty() {
                return Err(AutodevError::Agent("empty completion".to_string()));
            }
            return Ok(content);
        }
    }
}

#[async_trait]
impl CodeAgent for ChatAgent {
    async fn propose_changes(
        &self,
        story_text: &str,
        existing_files: &[FileChange],
        project_exists: bool,
    ) -> Result<ChangeSet> {
        let prompt = if project_exists {
            prompts::feature(story_text, existing_files)
        } else {
            prompts::bootstrap(story_text)
        };

        info!(project_exists, "requesting change proposal");
        let content = self.complete(&prompt).await?;

        match parse::change_set(&content) {
            Ok(set) => {
                info!(files = set.len(), "proposal parsed");
                Ok(set)
            }
            Err(err) => {
                warn!(error = %err, "unparseable proposal; treating as no change");
                Ok(ChangeSet::empty())
            }
        }
    }

    async fn fix_build_failure(
        &self,
        work_item_id: u64,
        prior_change_set: &ChangeSet,
        diagnostic_summary: &str,
        current_branch_files: &[FileChange],
    ) -> Result<FixProposal> {
        let prompt = prompts::fix(diagnostic_summary, prior_change_set, current_branch_files);

        info!(work_item = work_item_id, "requesting build fix");
        let content = self.complete(&prompt).await?;

        match parse::fix_proposal(&content) {
            Ok(proposal) => {
                info!(
                    work_item = work_item_id,
                    files = proposal.changes.len(),
                    "fix parsed"
                );
                Ok(proposal)
            }
            Err(err) => {
                warn!(
                    work_item = work_item_id,
                    error = %err,
                    "unparseable fix; treating as no change"
                );
                Ok(FixProposal::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_exponentially() {
        assert_eq!(backoff(1), Duration::from_millis(2000));
        assert_eq!(backoff(2), Duration::from_millis(4000));
        assert_eq!(backoff(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert!(config.endpoint.contains("chat/completions"));
        assert_eq!(config.model, "gpt-4.1");
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-4.1",
            messages: vec![
                Message {
                    role: "system",
                    content: "s",
                },
                Message {
                    role: "user",
                    content: "u",
                },
            ],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "gpt-4.1");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_chat_response_with_null_content() {
        let json = r#"{"choices": [{"message": {"content": null, "role": "assistant"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).expect("deserialize");
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(t));
    }
}
