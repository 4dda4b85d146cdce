//! Shared REST plumbing for the DevOps adapters.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use autodev_core::{AutodevError, Result};

pub(crate) const API_VERSION: &str = "7.1";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_SNIPPET: usize = 200;

/// Connection settings for one DevOps organization/project.
#[derive(Debug, Clone)]
pub struct DevOpsConfig {
    /// Organization base URL, e.g. `https://dev.azure.com/acme`.
    pub organization_url: String,
    pub project: String,
    /// Personal access token, sent as the basic-auth password.
    pub pat: String,
}

pub(crate) struct RestClient {
    http: reqwest::Client,
    config: DevOpsConfig,
}

impl RestClient {
    pub(crate) fn new(config: DevOpsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("autodev/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AutodevError::Http(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    pub(crate) fn config(&self) -> &DevOpsConfig {
        &self.config
    }

    /// Project-scoped API url: `{org}/{project}/_apis/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/_apis/{}",
            self.config.organization_url.trim_end_matches('/'),
            self.config.project,
            path
        )
    }

    /// Authenticated request builder. The PAT is attached here, per request;
    /// nothing mutable is shared between concurrent calls.
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth("", Some(&self.config.pat))
    }

    pub(crate) async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| AutodevError::Http(format!("{context}: {e}")))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let request = self
            .request(Method::GET, url)
            .query(&[("api-version", API_VERSION)])
            .query(query);
        let response = self.send(request, context).await?;
        let response = expect_success(response, context).await?;
        decode_json(response, context).await
    }

    pub(crate) async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<String> {
        let request = self
            .request(Method::GET, url)
            .query(&[("api-version", API_VERSION)])
            .query(query);
        let response = self.send(request, context).await?;
        let response = expect_success(response, context).await?;
        response
            .text()
            .await
            .map_err(|e| AutodevError::Http(format!("{context}: {e}")))
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        context: &str,
    ) -> Result<T> {
        self.post_json_versioned(url, body, API_VERSION, context)
            .await
    }

    /// POST with an explicit api-version (some endpoints are preview-only).
    pub(crate) async fn post_json_versioned<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        api_version: &str,
        context: &str,
    ) -> Result<T> {
        let request = self
            .request(Method::POST, url)
            .query(&[("api-version", api_version)])
            .json(body);
        let response = self.send(request, context).await?;
        let response = expect_success(response, context).await?;
        decode_json(response, context).await
    }
}

/// Map a non-success status to an error carrying a bounded body snippet.
pub(crate) async fn expect_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AutodevError::Http(format!(
        "{context}: {status}: {}",
        snippet(&body)
    )))
}

pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| AutodevError::Http(format!("{context}: invalid response body: {e}")))
}

/// Truncate a response body for error messages.
pub(crate) fn snippet(body: &str) -> String {
    if body.len() <= MAX_ERROR_SNIPPET {
        return body.to_string();
    }
    let mut end = MAX_ERROR_SNIPPET;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(DevOpsConfig {
            organization_url: "https://dev.azure.com/acme/".to_string(),
            project: "payments".to_string(),
            pat: "secret".to_string(),
        })
        .expect("client")
    }

    #[test]
    fn test_api_url_strips_trailing_slash() {
        let c = client();
        assert_eq!(
            c.api_url("git/repositories/billing-api/refs"),
            "https://dev.azure.com/acme/payments/_apis/git/repositories/billing-api/refs"
        );
    }

    #[test]
    fn test_snippet_bounds_long_bodies() {
        let long = "x".repeat(500);
        let s = snippet(&long);
        assert!(s.len() <= MAX_ERROR_SNIPPET + 3);
        assert!(s.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }
}
