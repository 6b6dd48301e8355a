//! Minimal GitHub GraphQL client.
//!
//! One POST per call: no retries, no caching, no batching. Rate limiting and
//! GraphQL-level errors are surfaced as distinct [`McpGithubError`] variants.

use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{McpGithubError, Result};

pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Used when a 429 response has no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const USER_AGENT: &str = concat!("mcp-github-projects/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphQlClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_endpoint(token, GITHUB_GRAPHQL_URL)
    }

    pub fn with_endpoint(token: Option<String>, endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a query or mutation and return its `data` payload.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let token = self.token.as_deref().ok_or(McpGithubError::Unauthenticated)?;

        debug!(endpoint = %self.endpoint, "Sending GraphQL request");

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .json(&json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = response.status();
        let retry_after = retry_after_header(response.headers());
        let body = response.text().await?;

        let result = interpret_response(status, retry_after.as_deref(), &body);
        if let Err(ref e) = result {
            warn!(status = status.as_u16(), error = %e, "GraphQL request failed");
        }
        result
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Parse a `Retry-After` value given in seconds. HTTP-date values and
/// garbage fall back to [`DEFAULT_RETRY_AFTER_SECS`].
pub fn parse_retry_after(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Turn a raw HTTP response into the GraphQL `data` payload or an error.
pub fn interpret_response(status: StatusCode, retry_after: Option<&str>, body: &str) -> Result<Value> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(McpGithubError::RateLimited {
            retry_after_secs: parse_retry_after(retry_after),
        });
    }

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(McpGithubError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let parsed: GraphQlResponse = serde_json::from_str(body)
        .map_err(|e| McpGithubError::Other(format!("Failed to parse GraphQL response: {}", e)))?;

    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(McpGithubError::GraphQl(messages.join("; ")));
    }

    match parsed.data {
        Some(Value::Null) | None => Err(McpGithubError::MissingData),
        Some(data) => Ok(data),
    }
}
