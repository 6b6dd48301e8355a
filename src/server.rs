use std::sync::{Arc, Mutex, PoisonError};

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::model::*;
use rmcp::{tool_handler, ServerHandler};
use serde_json::Value;

use crate::config::{Config, DatabaseLocation};
use crate::error::McpGithubError;
use crate::graphql::GraphQlClient;
use crate::tracking::TrackingStore;

/// GitHub's hard limit on `first`/`last` for any connection.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct McpGithubServer {
    pub(crate) graphql: Arc<GraphQlClient>,
    pub(crate) store: Arc<Mutex<TrackingStore>>,
    pub(crate) default_org: Option<String>,
    pub(crate) max_results: u32,
    pub(crate) tool_router: ToolRouter<Self>,
}

impl McpGithubServer {
    pub fn new(
        graphql: GraphQlClient,
        store: TrackingStore,
        default_org: Option<String>,
        max_results: u32,
    ) -> Self {
        let tool_router = Self::tool_router_projects()
            + Self::tool_router_issues()
            + Self::tool_router_tracking()
            + Self::tool_router_metadata();
        Self {
            graphql: Arc::new(graphql),
            store: Arc::new(Mutex::new(store)),
            default_org: default_org.filter(|o| !o.is_empty()),
            max_results,
            tool_router,
        }
    }

    /// Build the GraphQL client and open the tracking store described by `config`.
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let graphql = GraphQlClient::with_endpoint(config.token.clone(), &config.graphql_url)?;
        let store = match &config.database {
            DatabaseLocation::InMemory => TrackingStore::in_memory()?,
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        McpGithubError::Other(format!(
                            "Failed to create database directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                TrackingStore::open(path)?
            }
        };
        Ok(Self::new(
            graphql,
            store,
            config.default_org.clone(),
            config.max_results,
        ))
    }

    pub(crate) fn resolve_owner(&self, param: Option<&str>) -> crate::error::Result<String> {
        let owner = param
            .filter(|p| !p.is_empty())
            .map(String::from)
            .or_else(|| self.default_org.clone())
            .ok_or_else(|| {
                McpGithubError::MissingParam("owner is required (or set --org default)".to_string())
            })?;
        validate_github_name(&owner, "owner")?;
        Ok(owner)
    }

    /// Clamp a requested page size to 1..=100, falling back to --max-results.
    pub(crate) fn capped_per_page(&self, first: Option<u32>) -> u32 {
        first
            .unwrap_or(self.max_results)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub(crate) fn err(&self, e: McpGithubError) -> ErrorData {
        e.to_mcp_error()
    }

    pub(crate) async fn github_query(&self, query: &str, variables: Value) -> crate::error::Result<Value> {
        self.graphql.execute(query, variables).await
    }

    /// Run `f` with the tracking store locked. Never hold the lock across an await.
    ///
    /// A poisoned lock is recovered: each store operation commits or fails as a unit.
    pub(crate) fn with_store<T>(
        &self,
        f: impl FnOnce(&TrackingStore) -> crate::error::Result<T>,
    ) -> crate::error::Result<T> {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }
}

/// Validate that a GitHub owner/repo name is non-empty and free of characters
/// GitHub never allows in logins or repository names.
pub(crate) fn validate_github_name(name: &str, field: &str) -> crate::error::Result<()> {
    if name.is_empty() {
        return Err(McpGithubError::MissingParam(format!(
            "{} must not be empty",
            field
        )));
    }
    for ch in ['/', '?', '#', '%', '\0', ' ', '\n', '\t'] {
        if name.contains(ch) {
            return Err(McpGithubError::InvalidParam(format!(
                "{} contains invalid character '{}'",
                field,
                ch.escape_default()
            )));
        }
    }
    Ok(())
}

/// Require a non-blank string parameter.
pub(crate) fn require_non_empty(value: &str, field: &str) -> crate::error::Result<()> {
    if value.trim().is_empty() {
        return Err(McpGithubError::MissingParam(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

pub(crate) fn json_result(value: Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    CallToolResult::success(vec![Content::text(text)])
}

#[tool_handler]
impl ServerHandler for McpGithubServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mcp-github-projects".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "GitHub Projects V2 and Issues server. Use list_projects/get_project to find \
                 projects, list_project_fields and list_project_items to inspect a board, \
                 add_project_item/add_project_draft_issue/update_project_item_field/\
                 archive_project_item/delete_project_item to change it. Use list_issues/get_issue, \
                 create_issue/update_issue, add_issue_comment and list_labels/add_labels/\
                 remove_labels for issues. track_repository/track_project and their list_/untrack_ \
                 counterparts manage the local tracking list. describe_tools lists every tool \
                 with its input schema."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_server(default_org: Option<String>, max_results: u32) -> McpGithubServer {
        let graphql = GraphQlClient::new(None).unwrap();
        let store = TrackingStore::in_memory().unwrap();
        McpGithubServer::new(graphql, store, default_org, max_results)
    }

    #[test]
    fn test_resolve_owner_with_param() {
        let server = make_server(None, 30);
        assert_eq!(server.resolve_owner(Some("my-org")).unwrap(), "my-org");
    }

    #[test]
    fn test_resolve_owner_with_default() {
        let server = make_server(Some("default-org".to_string()), 30);
        assert_eq!(server.resolve_owner(None).unwrap(), "default-org");
    }

    #[test]
    fn test_resolve_owner_param_overrides_default() {
        let server = make_server(Some("default-org".to_string()), 30);
        assert_eq!(
            server.resolve_owner(Some("explicit-org")).unwrap(),
            "explicit-org"
        );
    }

    #[test]
    fn test_resolve_owner_missing() {
        let server = make_server(None, 30);
        assert!(matches!(
            server.resolve_owner(None),
            Err(McpGithubError::MissingParam(_))
        ));
        let server = make_server(Some(String::new()), 30);
        assert!(server.resolve_owner(None).is_err());
    }

    #[test]
    fn test_resolve_owner_rejects_bad_names() {
        let server = make_server(None, 30);
        assert!(server.resolve_owner(Some("owner/repo")).is_err());
    }

    #[test]
    fn test_capped_per_page_default() {
        let server = make_server(None, 30);
        assert_eq!(server.capped_per_page(None), 30);
    }

    #[test]
    fn test_capped_per_page_explicit() {
        let server = make_server(None, 30);
        assert_eq!(server.capped_per_page(Some(50)), 50);
    }

    #[test]
    fn test_capped_per_page_caps_at_100() {
        let server = make_server(None, 30);
        assert_eq!(server.capped_per_page(Some(101)), 100);
        assert_eq!(server.capped_per_page(Some(1000)), 100);
    }

    #[test]
    fn test_capped_per_page_minimum_one() {
        let server = make_server(None, 30);
        assert_eq!(server.capped_per_page(Some(0)), 1);
    }

    #[test]
    fn test_capped_per_page_max_results_capped() {
        let server = make_server(None, 500);
        assert_eq!(server.capped_per_page(None), 100);
    }

    #[test]
    fn test_validate_github_name() {
        assert!(validate_github_name("my-org", "owner").is_ok());
        assert!(validate_github_name("repo.name", "repo").is_ok());
        assert!(validate_github_name("", "owner").is_err());
        assert!(validate_github_name("../etc", "owner").is_err());
        assert!(validate_github_name("repo#fragment", "repo").is_err());
        assert!(validate_github_name("my repo", "repo").is_err());
        assert!(validate_github_name("my\nrepo", "repo").is_err());
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("title", "title").is_ok());
        assert!(require_non_empty("   ", "title").is_err());
    }

    #[test]
    fn test_from_config_creates_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracking.db");
        let config = Config {
            database: DatabaseLocation::File(path.clone()),
            ..Config::default()
        };
        let server = McpGithubServer::from_config(&config).unwrap();
        assert!(path.exists());
        assert!(!server.graphql.is_authenticated());
    }

    #[test]
    fn test_with_store_survives_poisoned_lock() {
        let server = make_server(None, 30);
        let store = Arc::clone(&server.store);
        let _ = std::thread::spawn(move || {
            let _guard = store.lock().unwrap();
            panic!("poison the tracking store lock");
        })
        .join();
        assert!(server.store.is_poisoned());

        let (repo, _) = server
            .with_store(|s| s.add_repository("octo-org", "widgets"))
            .unwrap();
        assert_eq!(repo.name, "widgets");
    }

    #[test]
    fn test_get_info_advertises_tools() {
        let server = make_server(None, 30);
        let info = server.get_info();
        assert_eq!(info.server_info.name, "mcp-github-projects");
        assert!(info.capabilities.tools.is_some());
    }
}
