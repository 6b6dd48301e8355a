//! Runtime configuration resolved from the command line and environment.

use std::path::PathBuf;

use crate::graphql::GITHUB_GRAPHQL_URL;

pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_MAX_RESULTS: u32 = 30;

/// Where the tracking list lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

impl std::fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::InMemory => write!(f, ":memory:"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: Option<String>,
    pub default_org: Option<String>,
    pub max_results: u32,
    pub graphql_url: String,
    pub database: DatabaseLocation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            default_org: None,
            max_results: DEFAULT_MAX_RESULTS,
            graphql_url: GITHUB_GRAPHQL_URL.to_string(),
            database: DatabaseLocation::InMemory,
        }
    }
}

/// Resolve the GitHub token: explicit value > variable named by `token_env` > GITHUB_TOKEN.
/// Empty values count as absent.
pub fn resolve_token(
    explicit: Option<String>,
    token_env: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(t) = explicit.filter(|t| !t.is_empty()) {
        return Some(t);
    }
    let env_name = token_env.unwrap_or(DEFAULT_TOKEN_ENV);
    match lookup(env_name) {
        Some(t) if !t.is_empty() => {
            tracing::info!(env = env_name, "Read GitHub token from environment variable");
            Some(t)
        }
        _ => None,
    }
}

/// Default on-disk location of the tracking database.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("mcp-github-projects").join("tracking.db"))
        .unwrap_or_else(|| PathBuf::from("tracking.db"))
}
