//! Issue tools: list, read, create, update, comment and label.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData};
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{connection_nodes, node_strings, page_info};
use crate::error::McpGithubError;
use crate::server::{json_result, require_non_empty, validate_github_name, McpGithubServer};

const LIST_ISSUES_QUERY: &str = r#"
query($owner: String!, $repo: String!, $first: Int!, $after: String, $states: [IssueState!], $labels: [String!]) {
  repository(owner: $owner, name: $repo) {
    issues(first: $first, after: $after, states: $states, labels: $labels, orderBy: {field: CREATED_AT, direction: DESC}) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        id number title state url createdAt updatedAt
        author { login }
        labels(first: 20) { nodes { name } }
        comments { totalCount }
      }
    }
  }
}
"#;

const GET_ISSUE_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!, $first: Int!) {
  repository(owner: $owner, name: $repo) {
    issue(number: $number) {
      id number title body state url createdAt updatedAt closedAt
      author { login }
      assignees(first: 10) { nodes { login } }
      labels(first: 20) { nodes { id name } }
      comments(first: $first) {
        totalCount
        nodes { id body createdAt author { login } }
      }
      projectItems(first: 10) {
        nodes { id project { id title } }
      }
    }
  }
}
"#;

const REPOSITORY_ID_QUERY: &str = r#"
query($owner: String!, $repo: String!) {
  repository(owner: $owner, name: $repo) { id }
}
"#;

const CREATE_ISSUE_MUTATION: &str = r#"
mutation($repositoryId: ID!, $title: String!, $body: String, $labelIds: [ID!], $assigneeIds: [ID!]) {
  createIssue(input: {repositoryId: $repositoryId, title: $title, body: $body, labelIds: $labelIds, assigneeIds: $assigneeIds}) {
    issue { id number title url }
  }
}
"#;

const UPDATE_ISSUE_MUTATION: &str = r#"
mutation($id: ID!, $title: String, $body: String, $state: IssueState) {
  updateIssue(input: {id: $id, title: $title, body: $body, state: $state}) {
    issue { id number title state url }
  }
}
"#;

const ADD_COMMENT_MUTATION: &str = r#"
mutation($subjectId: ID!, $body: String!) {
  addComment(input: {subjectId: $subjectId, body: $body}) {
    commentEdge { node { id url } }
  }
}
"#;

const LIST_LABELS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $first: Int!) {
  repository(owner: $owner, name: $repo) {
    labels(first: $first) {
      totalCount
      nodes { id name color description }
    }
  }
}
"#;

const ADD_LABELS_MUTATION: &str = r#"
mutation($labelableId: ID!, $labelIds: [ID!]!) {
  addLabelsToLabelable(input: {labelableId: $labelableId, labelIds: $labelIds}) {
    clientMutationId
  }
}
"#;

const REMOVE_LABELS_MUTATION: &str = r#"
mutation($labelableId: ID!, $labelIds: [ID!]!) {
  removeLabelsFromLabelable(input: {labelableId: $labelableId, labelIds: $labelIds}) {
    clientMutationId
  }
}
"#;

// -- Tool parameter types --

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListIssuesParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Filter by state: open, closed, or all (default: open)")]
    #[serde(default)]
    pub state: Option<String>,

    #[schemars(description = "Filter by comma-separated label names")]
    #[serde(default)]
    pub labels: Option<String>,

    #[schemars(description = "Maximum number of results (max 100)")]
    #[serde(default)]
    pub first: Option<u32>,

    #[schemars(description = "Cursor from a previous page's end_cursor")]
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IssueParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Issue number")]
    pub issue_number: u64,

    #[schemars(description = "Maximum number of comments to include (max 100)")]
    #[serde(default)]
    pub comments_first: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateIssueParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Issue title")]
    pub title: String,

    #[schemars(description = "Issue body (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "Label node IDs to apply (see list_labels)")]
    #[serde(default)]
    pub label_ids: Option<Vec<String>>,

    #[schemars(description = "User node IDs to assign")]
    #[serde(default)]
    pub assignee_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateIssueParams {
    #[schemars(description = "Issue node ID")]
    pub issue_id: String,

    #[schemars(description = "New title")]
    #[serde(default)]
    pub title: Option<String>,

    #[schemars(description = "New body (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,

    #[schemars(description = "New state: open or closed")]
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddCommentParams {
    #[schemars(description = "Node ID of the issue or pull request to comment on")]
    pub subject_id: String,

    #[schemars(description = "Comment body (Markdown)")]
    pub body: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListLabelsParams {
    #[schemars(description = "Repository owner (user or org)")]
    #[serde(default)]
    pub owner: Option<String>,

    #[schemars(description = "Repository name")]
    pub repo: String,

    #[schemars(description = "Maximum number of results (max 100)")]
    #[serde(default)]
    pub first: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LabelsParams {
    #[schemars(description = "Node ID of the issue or pull request")]
    pub labelable_id: String,

    #[schemars(description = "Label node IDs")]
    pub label_ids: Vec<String>,
}

// -- Parameter helpers --

/// Map a user-facing state filter to GraphQL `IssueState` values.
/// `None` means no filter (all states).
pub(crate) fn issue_states(state: Option<&str>) -> crate::error::Result<Option<Vec<&'static str>>> {
    match state.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("open") => Ok(Some(vec!["OPEN"])),
        Some("closed") => Ok(Some(vec!["CLOSED"])),
        Some("all") => Ok(None),
        Some(other) => Err(McpGithubError::InvalidParam(format!(
            "state must be open, closed, or all (got '{}')",
            other
        ))),
    }
}

/// Map `open`/`closed` to an `IssueState` for updates.
pub(crate) fn issue_state(state: &str) -> crate::error::Result<&'static str> {
    match state.trim().to_ascii_lowercase().as_str() {
        "open" => Ok("OPEN"),
        "closed" => Ok("CLOSED"),
        other => Err(McpGithubError::InvalidParam(format!(
            "state must be open or closed (got '{}')",
            other
        ))),
    }
}

pub(crate) fn split_labels(labels: Option<&str>) -> Option<Vec<String>> {
    let list: Vec<String> = labels?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

/// GraphQL `Int` is 32-bit; reject issue numbers GitHub could never have issued.
pub(crate) fn issue_number(number: u64) -> crate::error::Result<i32> {
    i32::try_from(number)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            McpGithubError::InvalidParam(format!(
                "issue_number must be between 1 and {} (got {})",
                i32::MAX,
                number
            ))
        })
}

fn require_ids(ids: &[String], field: &str) -> crate::error::Result<()> {
    if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
        return Err(McpGithubError::MissingParam(format!(
            "{} must contain at least one non-empty ID",
            field
        )));
    }
    Ok(())
}

fn repository<'a>(data: &'a Value, owner: &str, repo: &str) -> crate::error::Result<&'a Value> {
    data.get("repository")
        .filter(|r| !r.is_null())
        .ok_or_else(|| McpGithubError::NotFound(format!("Repository {}/{}", owner, repo)))
}

fn issue_summary(i: &Value) -> Value {
    json!({
        "id": i.get("id"),
        "number": i.get("number"),
        "title": i.get("title"),
        "state": i.get("state"),
        "author": i.pointer("/author/login"),
        "labels": node_strings(i.get("labels"), "name"),
        "comments": i.pointer("/comments/totalCount"),
        "url": i.get("url"),
        "created_at": i.get("createdAt"),
        "updated_at": i.get("updatedAt"),
    })
}

fn issue_detail(i: &Value) -> Value {
    let comments: Vec<Value> = connection_nodes(i.get("comments"))
        .iter()
        .map(|c| {
            json!({
                "id": c.get("id"),
                "author": c.pointer("/author/login"),
                "body": c.get("body"),
                "created_at": c.get("createdAt"),
            })
        })
        .collect();
    let labels: Vec<Value> = connection_nodes(i.get("labels"))
        .iter()
        .map(|l| json!({ "id": l.get("id"), "name": l.get("name") }))
        .collect();
    let projects: Vec<Value> = connection_nodes(i.get("projectItems"))
        .iter()
        .map(|p| {
            json!({
                "item_id": p.get("id"),
                "project_id": p.pointer("/project/id"),
                "project_title": p.pointer("/project/title"),
            })
        })
        .collect();

    json!({
        "id": i.get("id"),
        "number": i.get("number"),
        "title": i.get("title"),
        "state": i.get("state"),
        "author": i.pointer("/author/login"),
        "assignees": node_strings(i.get("assignees"), "login"),
        "labels": labels,
        "body": i.get("body").and_then(Value::as_str).unwrap_or(""),
        "url": i.get("url"),
        "created_at": i.get("createdAt"),
        "updated_at": i.get("updatedAt"),
        "closed_at": i.get("closedAt"),
        "comment_count": i.pointer("/comments/totalCount"),
        "comments": comments,
        "projects": projects,
    })
}

// -- Operations --

impl McpGithubServer {
    async fn do_list_issues(&self, params: ListIssuesParams) -> crate::error::Result<Value> {
        let owner = self.resolve_owner(params.owner.as_deref())?;
        validate_github_name(&params.repo, "repo")?;
        let states = issue_states(params.state.as_deref())?;
        let labels = split_labels(params.labels.as_deref());
        let first = self.capped_per_page(params.first);

        let data = self
            .github_query(
                LIST_ISSUES_QUERY,
                json!({
                    "owner": owner,
                    "repo": params.repo,
                    "first": first,
                    "after": params.after,
                    "states": states,
                    "labels": labels,
                }),
            )
            .await?;

        let connection = repository(&data, &owner, &params.repo)?.get("issues");
        let issues: Vec<Value> = connection_nodes(connection)
            .iter()
            .map(issue_summary)
            .collect();

        Ok(json!({
            "repo": format!("{}/{}", owner, params.repo),
            "total_count": connection.and_then(|c| c.get("totalCount")),
            "page_info": page_info(connection),
            "count": issues.len(),
            "issues": issues,
        }))
    }

    async fn do_get_issue(&self, params: IssueParams) -> crate::error::Result<Value> {
        let owner = self.resolve_owner(params.owner.as_deref())?;
        validate_github_name(&params.repo, "repo")?;
        let number = issue_number(params.issue_number)?;
        let first = self.capped_per_page(params.comments_first);

        let data = self
            .github_query(
                GET_ISSUE_QUERY,
                json!({
                    "owner": owner,
                    "repo": params.repo,
                    "number": number,
                    "first": first,
                }),
            )
            .await?;

        let issue = repository(&data, &owner, &params.repo)?
            .get("issue")
            .filter(|i| !i.is_null())
            .ok_or_else(|| {
                McpGithubError::NotFound(format!(
                    "Issue {}/{}#{}",
                    owner, params.repo, params.issue_number
                ))
            })?;

        Ok(issue_detail(issue))
    }

    async fn do_create_issue(&self, params: CreateIssueParams) -> crate::error::Result<Value> {
        let owner = self.resolve_owner(params.owner.as_deref())?;
        validate_github_name(&params.repo, "repo")?;
        require_non_empty(&params.title, "title")?;

        let data = self
            .github_query(
                REPOSITORY_ID_QUERY,
                json!({ "owner": owner, "repo": params.repo }),
            )
            .await?;
        let repository_id = repository(&data, &owner, &params.repo)?
            .get("id")
            .cloned()
            .ok_or(McpGithubError::MissingData)?;

        let data = self
            .github_query(
                CREATE_ISSUE_MUTATION,
                json!({
                    "repositoryId": repository_id,
                    "title": params.title,
                    "body": params.body,
                    "labelIds": params.label_ids,
                    "assigneeIds": params.assignee_ids,
                }),
            )
            .await?;

        let issue = data
            .pointer("/createIssue/issue")
            .ok_or(McpGithubError::MissingData)?;
        Ok(json!({
            "repo": format!("{}/{}", owner, params.repo),
            "id": issue.get("id"),
            "number": issue.get("number"),
            "title": issue.get("title"),
            "url": issue.get("url"),
        }))
    }

    async fn do_update_issue(&self, params: UpdateIssueParams) -> crate::error::Result<Value> {
        require_non_empty(&params.issue_id, "issue_id")?;
        if params.title.is_none() && params.body.is_none() && params.state.is_none() {
            return Err(McpGithubError::MissingParam(
                "at least one of title, body or state is required".to_string(),
            ));
        }
        if let Some(ref title) = params.title {
            require_non_empty(title, "title")?;
        }
        let state = params.state.as_deref().map(issue_state).transpose()?;

        let data = self
            .github_query(
                UPDATE_ISSUE_MUTATION,
                json!({
                    "id": params.issue_id,
                    "title": params.title,
                    "body": params.body,
                    "state": state,
                }),
            )
            .await?;

        let issue = data
            .pointer("/updateIssue/issue")
            .ok_or(McpGithubError::MissingData)?;
        Ok(json!({
            "id": issue.get("id"),
            "number": issue.get("number"),
            "title": issue.get("title"),
            "state": issue.get("state"),
            "url": issue.get("url"),
        }))
    }

    async fn do_add_comment(&self, params: AddCommentParams) -> crate::error::Result<Value> {
        require_non_empty(&params.subject_id, "subject_id")?;
        require_non_empty(&params.body, "body")?;

        let data = self
            .github_query(
                ADD_COMMENT_MUTATION,
                json!({ "subjectId": params.subject_id, "body": params.body }),
            )
            .await?;

        Ok(json!({
            "subject_id": params.subject_id,
            "comment_id": data.pointer("/addComment/commentEdge/node/id"),
            "url": data.pointer("/addComment/commentEdge/node/url"),
        }))
    }

    async fn do_list_labels(&self, params: ListLabelsParams) -> crate::error::Result<Value> {
        let owner = self.resolve_owner(params.owner.as_deref())?;
        validate_github_name(&params.repo, "repo")?;
        let first = self.capped_per_page(params.first);

        let data = self
            .github_query(
                LIST_LABELS_QUERY,
                json!({ "owner": owner, "repo": params.repo, "first": first }),
            )
            .await?;

        let connection = repository(&data, &owner, &params.repo)?.get("labels");
        let labels: Vec<Value> = connection_nodes(connection)
            .iter()
            .map(|l| {
                json!({
                    "id": l.get("id"),
                    "name": l.get("name"),
                    "color": l.get("color"),
                    "description": l.get("description"),
                })
            })
            .collect();

        Ok(json!({
            "repo": format!("{}/{}", owner, params.repo),
            "total_count": connection.and_then(|c| c.get("totalCount")),
            "count": labels.len(),
            "labels": labels,
        }))
    }

    async fn do_change_labels(&self, params: LabelsParams, add: bool) -> crate::error::Result<Value> {
        require_non_empty(&params.labelable_id, "labelable_id")?;
        require_ids(&params.label_ids, "label_ids")?;

        let mutation = if add {
            ADD_LABELS_MUTATION
        } else {
            REMOVE_LABELS_MUTATION
        };
        self.github_query(
            mutation,
            json!({ "labelableId": params.labelable_id, "labelIds": params.label_ids }),
        )
        .await?;

        let key = if add { "added" } else { "removed" };
        let mut out = json!({ "labelable_id": params.labelable_id });
        out[key] = json!(params.label_ids);
        Ok(out)
    }
}

// -- MCP tool handlers (thin wrappers calling do_* methods) --

#[tool_router(router = tool_router_issues, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "list_issues",
        description = "List issues in a repository, optionally filtered by state and labels"
    )]
    async fn list_issues(
        &self,
        Parameters(params): Parameters<ListIssuesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_issues(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "get_issue",
        description = "Get issue details including body, labels, assignees, comments and project membership"
    )]
    async fn get_issue(
        &self,
        Parameters(params): Parameters<IssueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_get_issue(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "create_issue",
        description = "Create an issue in a repository, optionally with labels and assignees"
    )]
    async fn create_issue(
        &self,
        Parameters(params): Parameters<CreateIssueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_create_issue(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "update_issue",
        description = "Update an issue's title, body or state (open/closed)"
    )]
    async fn update_issue(
        &self,
        Parameters(params): Parameters<UpdateIssueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_update_issue(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "add_issue_comment",
        description = "Add a comment to an issue or pull request"
    )]
    async fn add_issue_comment(
        &self,
        Parameters(params): Parameters<AddCommentParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_add_comment(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "list_labels",
        description = "List labels defined in a repository, with their node IDs"
    )]
    async fn list_labels(
        &self,
        Parameters(params): Parameters<ListLabelsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_labels(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "add_labels",
        description = "Add labels to an issue or pull request"
    )]
    async fn add_labels(
        &self,
        Parameters(params): Parameters<LabelsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_change_labels(params, true)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "remove_labels",
        description = "Remove labels from an issue or pull request"
    )]
    async fn remove_labels(
        &self,
        Parameters(params): Parameters<LabelsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_change_labels(params, false)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }
}
