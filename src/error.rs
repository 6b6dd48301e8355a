use rmcp::model::ErrorData;

pub type Result<T> = std::result::Result<T, McpGithubError>;

#[derive(Debug, thiserror::Error)]
pub enum McpGithubError {
    #[error("GitHub rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    #[error("GraphQL response missing data")]
    MissingData,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tracking store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("GitHub token not configured (pass --token or set GITHUB_TOKEN)")]
    Unauthenticated,

    #[error("{0}")]
    Other(String),
}

impl McpGithubError {
    pub fn to_mcp_error(&self) -> ErrorData {
        match self {
            McpGithubError::MissingParam(_)
            | McpGithubError::InvalidParam(_)
            | McpGithubError::NotFound(_) => ErrorData::invalid_params(self.to_string(), None),
            McpGithubError::Unauthenticated => {
                ErrorData::invalid_params(self.to_string(), None)
            }
            McpGithubError::RateLimited { retry_after_secs } => ErrorData::internal_error(
                self.to_string(),
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
            ),
            McpGithubError::Api { .. }
            | McpGithubError::GraphQl(_)
            | McpGithubError::MissingData
            | McpGithubError::Http(_)
            | McpGithubError::Store(_)
            | McpGithubError::Other(_) => ErrorData::internal_error(self.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = McpGithubError::RateLimited {
            retry_after_secs: 42,
        };
        let data = err.to_mcp_error();
        assert_eq!(data.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(
            data.data,
            Some(serde_json::json!({ "retry_after_secs": 42 }))
        );
        assert!(data.message.contains("42s"));
    }

    #[test]
    fn test_precondition_errors_are_invalid_params() {
        for err in [
            McpGithubError::Unauthenticated,
            McpGithubError::NotFound("Tracked repository 7".to_string()),
            McpGithubError::MissingParam("repo".to_string()),
        ] {
            assert_eq!(err.to_mcp_error().code, ErrorCode::INVALID_PARAMS);
        }
    }

    #[test]
    fn test_api_error_message() {
        let err = McpGithubError::Api {
            status: 502,
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "GitHub API error (HTTP 502): Bad Gateway");
    }
}
