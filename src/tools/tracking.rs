//! Tracking list tools: mark repositories and projects for monitoring.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData};
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::projects::{project_node, GET_PROJECT_QUERY};
use crate::error::McpGithubError;
use crate::server::{json_result, require_non_empty, validate_github_name, McpGithubServer};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TrackRepositoryParams {
    #[schemars(description = "Repository owner (defaults to --org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct TrackProjectParams {
    #[schemars(description = "Project node ID (e.g. PVT_kwDO...)")]
    pub project_id: String,

    #[schemars(description = "Project title; fetched from GitHub when omitted")]
    #[serde(default)]
    pub title: Option<String>,

    #[schemars(description = "Owning organization login; fetched from GitHub when omitted")]
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UntrackParams {
    #[schemars(description = "Tracking record ID (from the list_tracked_* tools)")]
    pub id: i64,

    #[schemars(description = "Delete the record instead of marking it inactive (default: false)")]
    #[serde(default)]
    pub hard_delete: Option<bool>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct ListTrackedParams {
    #[schemars(description = "Include records that were untracked (default: false)")]
    #[serde(default)]
    pub include_inactive: Option<bool>,
}

impl McpGithubServer {
    pub(crate) fn do_track_repository(&self, params: TrackRepositoryParams) -> crate::error::Result<Value> {
        let owner = self.resolve_owner(params.owner.as_deref())?;
        validate_github_name(&params.name, "name")?;

        let (repository, outcome) = self.with_store(|s| s.add_repository(&owner, &params.name))?;
        Ok(json!({ "outcome": outcome, "repository": repository }))
    }

    pub(crate) fn do_untrack_repository(&self, params: UntrackParams) -> crate::error::Result<Value> {
        let hard_delete = params.hard_delete.unwrap_or(false);
        let (repository, outcome) =
            self.with_store(|s| s.remove_repository(params.id, hard_delete))?;
        Ok(json!({ "outcome": outcome, "repository": repository }))
    }

    pub(crate) fn do_list_tracked_repositories(&self, params: ListTrackedParams) -> crate::error::Result<Value> {
        let include_inactive = params.include_inactive.unwrap_or(false);
        let repositories = self.with_store(|s| s.list_repositories(include_inactive))?;
        Ok(json!({
            "include_inactive": include_inactive,
            "count": repositories.len(),
            "repositories": repositories,
        }))
    }

    pub(crate) async fn do_track_project(&self, params: TrackProjectParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;

        let title = params.title.filter(|t| !t.trim().is_empty());
        let organization = params.organization.filter(|o| !o.is_empty());

        // With a title in hand, --org fills in the owner without a GitHub round trip.
        let (title, organization) = match (title, organization) {
            (Some(title), Some(organization)) => (title, organization),
            (Some(title), None) if self.default_org.is_some() => {
                let organization = self.default_org.clone().unwrap_or_default();
                (title, organization)
            }
            (title, organization) => {
                let data = self
                    .github_query(GET_PROJECT_QUERY, json!({ "id": params.project_id }))
                    .await?;
                let project = project_node(&data, &params.project_id)?;
                let title = title
                    .or_else(|| project.get("title").and_then(Value::as_str).map(String::from))
                    .ok_or(McpGithubError::MissingData)?;
                let organization = organization
                    .or_else(|| {
                        project
                            .pointer("/owner/login")
                            .and_then(Value::as_str)
                            .map(String::from)
                    })
                    .or_else(|| self.default_org.clone())
                    .ok_or_else(|| {
                        McpGithubError::MissingParam("organization is required".to_string())
                    })?;
                (title, organization)
            }
        };
        validate_github_name(&organization, "organization")?;

        let (project, outcome) =
            self.with_store(|s| s.add_project(&params.project_id, &title, &organization))?;
        Ok(json!({ "outcome": outcome, "project": project }))
    }

    pub(crate) fn do_untrack_project(&self, params: UntrackParams) -> crate::error::Result<Value> {
        let hard_delete = params.hard_delete.unwrap_or(false);
        let (project, outcome) = self.with_store(|s| s.remove_project(params.id, hard_delete))?;
        Ok(json!({ "outcome": outcome, "project": project }))
    }

    pub(crate) fn do_list_tracked_projects(&self, params: ListTrackedParams) -> crate::error::Result<Value> {
        let include_inactive = params.include_inactive.unwrap_or(false);
        let projects = self.with_store(|s| s.list_projects(include_inactive))?;
        Ok(json!({
            "include_inactive": include_inactive,
            "count": projects.len(),
            "projects": projects,
        }))
    }
}

#[tool_router(router = tool_router_tracking, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "track_repository",
        description = "Add a repository to the local tracking list. Re-adding an untracked repository reactivates it"
    )]
    async fn track_repository(
        &self,
        Parameters(params): Parameters<TrackRepositoryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_track_repository(params)
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "untrack_repository",
        description = "Stop tracking a repository (soft delete unless hard_delete is true)"
    )]
    async fn untrack_repository(
        &self,
        Parameters(params): Parameters<UntrackParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_untrack_repository(params)
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "list_tracked_repositories",
        description = "List tracked repositories, newest first"
    )]
    async fn list_tracked_repositories(
        &self,
        Parameters(params): Parameters<ListTrackedParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_tracked_repositories(params)
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "track_project",
        description = "Add a Projects V2 board to the local tracking list. Re-adding refreshes its title and reactivates it"
    )]
    async fn track_project(
        &self,
        Parameters(params): Parameters<TrackProjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_track_project(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "untrack_project",
        description = "Stop tracking a project (soft delete unless hard_delete is true)"
    )]
    async fn untrack_project(
        &self,
        Parameters(params): Parameters<UntrackParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_untrack_project(params)
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "list_tracked_projects",
        description = "List tracked projects, newest first"
    )]
    async fn list_tracked_projects(
        &self,
        Parameters(params): Parameters<ListTrackedParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_tracked_projects(params)
            .map(json_result)
            .map_err(|e| self.err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::make_server;

    fn track(owner: Option<&str>, name: &str) -> TrackRepositoryParams {
        TrackRepositoryParams {
            owner: owner.map(String::from),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_track_repository_uses_default_org() {
        let server = make_server(Some("octo-org".to_string()), 30);
        let out = server.do_track_repository(track(None, "widgets")).unwrap();
        assert_eq!(out["outcome"], "created");
        assert_eq!(out["repository"]["owner"], "octo-org");
        assert_eq!(out["repository"]["is_active"], true);
    }

    #[test]
    fn test_track_repository_twice_then_reactivate() {
        let server = make_server(None, 30);
        let first = server
            .do_track_repository(track(Some("octo-org"), "widgets"))
            .unwrap();
        let id = first["repository"]["id"].as_i64().unwrap();

        let again = server
            .do_track_repository(track(Some("octo-org"), "widgets"))
            .unwrap();
        assert_eq!(again["outcome"], "already_tracked");
        assert_eq!(again["repository"]["id"], id);

        let removed = server
            .do_untrack_repository(UntrackParams {
                id,
                hard_delete: None,
            })
            .unwrap();
        assert_eq!(removed["outcome"], "deactivated");
        assert_eq!(removed["repository"]["is_active"], false);

        let listed = server
            .do_list_tracked_repositories(ListTrackedParams::default())
            .unwrap();
        assert_eq!(listed["count"], 0);

        let back = server
            .do_track_repository(track(Some("octo-org"), "widgets"))
            .unwrap();
        assert_eq!(back["outcome"], "reactivated");
        assert_eq!(back["repository"]["id"], id);
    }

    #[test]
    fn test_untrack_repository_hard_delete() {
        let server = make_server(None, 30);
        let out = server
            .do_track_repository(track(Some("octo-org"), "widgets"))
            .unwrap();
        let id = out["repository"]["id"].as_i64().unwrap();

        let removed = server
            .do_untrack_repository(UntrackParams {
                id,
                hard_delete: Some(true),
            })
            .unwrap();
        assert_eq!(removed["outcome"], "deleted");

        let listed = server
            .do_list_tracked_repositories(ListTrackedParams {
                include_inactive: Some(true),
            })
            .unwrap();
        assert_eq!(listed["count"], 0);
    }

    #[test]
    fn test_untrack_unknown_id_is_not_found() {
        let server = make_server(None, 30);
        let err = server
            .do_untrack_project(UntrackParams {
                id: 404,
                hard_delete: None,
            })
            .unwrap_err();
        assert!(matches!(err, McpGithubError::NotFound(_)));
    }

    #[test]
    fn test_track_repository_requires_owner() {
        let server = make_server(None, 30);
        assert!(server.do_track_repository(track(None, "widgets")).is_err());
        assert!(server
            .do_track_repository(track(Some("octo-org"), "a/b"))
            .is_err());
    }

    #[tokio::test]
    async fn test_track_project_with_explicit_metadata() {
        let server = make_server(None, 30);
        let params = |title: &str| TrackProjectParams {
            project_id: "PVT_1".to_string(),
            title: Some(title.to_string()),
            organization: Some("octo-org".to_string()),
        };

        let first = server.do_track_project(params("Roadmap")).await.unwrap();
        assert_eq!(first["outcome"], "created");

        let second = server.do_track_project(params("Roadmap v2")).await.unwrap();
        assert_eq!(second["outcome"], "already_tracked");
        assert_eq!(second["project"]["title"], "Roadmap v2");
        assert_eq!(second["project"]["id"], first["project"]["id"]);

        let listed = server
            .do_list_tracked_projects(ListTrackedParams::default())
            .unwrap();
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["projects"][0]["title"], "Roadmap v2");
    }

    #[tokio::test]
    async fn test_track_project_fetches_title_from_github() {
        use axum::routing::post;
        use axum::{Json, Router};

        let router = Router::new().route(
            "/graphql",
            post(|| async {
                Json(json!({
                    "data": {
                        "node": {
                            "id": "PVT_1",
                            "title": "Q4 Roadmap",
                            "owner": {"login": "octo-org"}
                        }
                    }
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = crate::config::Config {
            token: Some("ghp_test".to_string()),
            graphql_url: format!("http://{}/graphql", addr),
            ..Default::default()
        };
        let server = McpGithubServer::from_config(&config).unwrap();

        let out = server
            .do_track_project(TrackProjectParams {
                project_id: "PVT_1".to_string(),
                title: None,
                organization: None,
            })
            .await
            .unwrap();
        assert_eq!(out["outcome"], "created");
        assert_eq!(out["project"]["title"], "Q4 Roadmap");
        assert_eq!(out["project"]["organization"], "octo-org");
    }

    #[tokio::test]
    async fn test_track_project_with_title_uses_default_org_offline() {
        let server = make_server(Some("octo-org".to_string()), 30);
        let out = server
            .do_track_project(TrackProjectParams {
                project_id: "PVT_1".to_string(),
                title: Some("Roadmap".to_string()),
                organization: None,
            })
            .await
            .unwrap();
        assert_eq!(out["outcome"], "created");
        assert_eq!(out["project"]["title"], "Roadmap");
        assert_eq!(out["project"]["organization"], "octo-org");
    }

    #[tokio::test]
    async fn test_track_project_with_title_and_no_org_needs_github() {
        let server = make_server(None, 30);
        let err = server
            .do_track_project(TrackProjectParams {
                project_id: "PVT_1".to_string(),
                title: Some("Roadmap".to_string()),
                organization: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, McpGithubError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_track_project_without_title_needs_github() {
        let server = make_server(Some("octo-org".to_string()), 30);
        let err = server
            .do_track_project(TrackProjectParams {
                project_id: "PVT_1".to_string(),
                title: None,
                organization: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, McpGithubError::Unauthenticated));
    }
}
