//! Projects V2 tools: browse boards, their fields and items, and edit items.

use chrono::NaiveDate;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData};
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{connection_nodes, page_info};
use crate::error::McpGithubError;
use crate::server::{json_result, require_non_empty, McpGithubServer};

// -- Queries --

const LIST_PROJECTS_QUERY: &str = r#"
query($org: String!, $first: Int!, $after: String) {
  organization(login: $org) {
    projectsV2(first: $first, after: $after, orderBy: {field: UPDATED_AT, direction: DESC}) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes { id number title shortDescription closed public url updatedAt }
    }
  }
}
"#;

pub(crate) const GET_PROJECT_QUERY: &str = r#"
query($id: ID!) {
  node(id: $id) {
    ... on ProjectV2 {
      id number title shortDescription readme closed public url createdAt updatedAt
      owner {
        ... on Organization { login }
        ... on User { login }
      }
    }
  }
}
"#;

const LIST_PROJECT_FIELDS_QUERY: &str = r#"
query($id: ID!, $first: Int!) {
  node(id: $id) {
    ... on ProjectV2 {
      id
      fields(first: $first) {
        nodes {
          ... on ProjectV2Field { id name dataType }
          ... on ProjectV2SingleSelectField { id name dataType options { id name } }
          ... on ProjectV2IterationField {
            id name dataType
            configuration { iterations { id title startDate duration } }
          }
        }
      }
    }
  }
}
"#;

const LIST_PROJECT_ITEMS_QUERY: &str = r#"
query($id: ID!, $first: Int!, $after: String) {
  node(id: $id) {
    ... on ProjectV2 {
      id
      items(first: $first, after: $after) {
        totalCount
        pageInfo { hasNextPage endCursor }
        nodes {
          id type isArchived
          content {
            ... on Issue { id number title state url repository { nameWithOwner } }
            ... on PullRequest { id number title state url repository { nameWithOwner } }
            ... on DraftIssue { id title body }
          }
          fieldValues(first: 20) {
            nodes {
              ... on ProjectV2ItemFieldTextValue { text field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldNumberValue { number field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldDateValue { date field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldSingleSelectValue { name field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldIterationValue { title field { ... on ProjectV2FieldCommon { name } } }
            }
          }
        }
      }
    }
  }
}
"#;

const ADD_PROJECT_ITEM_MUTATION: &str = r#"
mutation($projectId: ID!, $contentId: ID!) {
  addProjectV2ItemById(input: {projectId: $projectId, contentId: $contentId}) {
    item { id }
  }
}
"#;

const ADD_DRAFT_ISSUE_MUTATION: &str = r#"
mutation($projectId: ID!, $title: String!, $body: String) {
  addProjectV2DraftIssue(input: {projectId: $projectId, title: $title, body: $body}) {
    projectItem { id }
  }
}
"#;

const UPDATE_ITEM_FIELD_MUTATION: &str = r#"
mutation($projectId: ID!, $itemId: ID!, $fieldId: ID!, $value: ProjectV2FieldValue!) {
  updateProjectV2ItemFieldValue(
    input: {projectId: $projectId, itemId: $itemId, fieldId: $fieldId, value: $value}
  ) {
    projectV2Item { id }
  }
}
"#;

const ARCHIVE_ITEM_MUTATION: &str = r#"
mutation($projectId: ID!, $itemId: ID!) {
  archiveProjectV2Item(input: {projectId: $projectId, itemId: $itemId}) {
    item { id }
  }
}
"#;

const DELETE_ITEM_MUTATION: &str = r#"
mutation($projectId: ID!, $itemId: ID!) {
  deleteProjectV2Item(input: {projectId: $projectId, itemId: $itemId}) {
    deletedItemId
  }
}
"#;

// -- Tool parameter types --

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListProjectsParams {
    #[schemars(description = "Organization login (defaults to --org)")]
    #[serde(default)]
    pub org: Option<String>,

    #[schemars(description = "Maximum number of results (max 100)")]
    #[serde(default)]
    pub first: Option<u32>,

    #[schemars(description = "Cursor from a previous page's end_cursor")]
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProjectParams {
    #[schemars(description = "Project node ID (e.g. PVT_kwDO...)")]
    pub project_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListProjectFieldsParams {
    #[schemars(description = "Project node ID")]
    pub project_id: String,

    #[schemars(description = "Maximum number of fields (max 100)")]
    #[serde(default)]
    pub first: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListProjectItemsParams {
    #[schemars(description = "Project node ID")]
    pub project_id: String,

    #[schemars(description = "Maximum number of items (max 100)")]
    #[serde(default)]
    pub first: Option<u32>,

    #[schemars(description = "Cursor from a previous page's end_cursor")]
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddProjectItemParams {
    #[schemars(description = "Project node ID")]
    pub project_id: String,

    #[schemars(description = "Node ID of the issue or pull request to add")]
    pub content_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddDraftIssueParams {
    #[schemars(description = "Project node ID")]
    pub project_id: String,

    #[schemars(description = "Draft issue title")]
    pub title: String,

    #[schemars(description = "Draft issue body (Markdown)")]
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct UpdateItemFieldParams {
    #[schemars(description = "Project node ID")]
    pub project_id: String,

    #[schemars(description = "Project item ID")]
    pub item_id: String,

    #[schemars(description = "Field ID (see list_project_fields)")]
    pub field_id: String,

    #[schemars(description = "New value for a text field")]
    #[serde(default)]
    pub text: Option<String>,

    #[schemars(description = "New value for a number field")]
    #[serde(default)]
    pub number: Option<f64>,

    #[schemars(description = "New value for a date field (YYYY-MM-DD)")]
    #[serde(default)]
    pub date: Option<String>,

    #[schemars(description = "Option ID for a single-select field")]
    #[serde(default)]
    pub single_select_option_id: Option<String>,

    #[schemars(description = "Iteration ID for an iteration field")]
    #[serde(default)]
    pub iteration_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProjectItemParams {
    #[schemars(description = "Project node ID")]
    pub project_id: String,

    #[schemars(description = "Project item ID")]
    pub item_id: String,
}

// -- Response reshaping --

/// Pull the ProjectV2 out of a `node(id:)` response. Unknown ids come back as
/// `null`; ids of other types match no fragment and come back as `{}`.
pub(crate) fn project_node<'a>(data: &'a Value, project_id: &str) -> crate::error::Result<&'a Value> {
    data.get("node")
        .filter(|n| n.get("id").is_some())
        .ok_or_else(|| McpGithubError::NotFound(format!("Project {}", project_id)))
}

pub(crate) fn project_summary(p: &Value) -> Value {
    json!({
        "id": p.get("id"),
        "number": p.get("number"),
        "title": p.get("title"),
        "description": p.get("shortDescription"),
        "closed": p.get("closed"),
        "public": p.get("public"),
        "url": p.get("url"),
        "updated_at": p.get("updatedAt"),
    })
}

fn field_summary(f: &Value) -> Value {
    let mut out = json!({
        "id": f.get("id"),
        "name": f.get("name"),
        "data_type": f.get("dataType"),
    });
    if let Some(options) = f.get("options") {
        out["options"] = options.clone();
    }
    if let Some(iterations) = f.pointer("/configuration/iterations") {
        out["iterations"] = iterations.clone();
    }
    out
}

/// Collapse `fieldValues.nodes` into `{ "<field name>": value }`.
pub(crate) fn flatten_field_values(field_values: Option<&Value>) -> Value {
    let mut map = Map::new();
    for node in connection_nodes(field_values) {
        let Some(field) = node.pointer("/field/name").and_then(Value::as_str) else {
            continue;
        };
        let value = ["text", "number", "date", "name", "title"]
            .iter()
            .find_map(|key| node.get(*key))
            .cloned()
            .unwrap_or(Value::Null);
        map.insert(field.to_string(), value);
    }
    Value::Object(map)
}

fn item_summary(item: &Value) -> Value {
    let content = match item.get("content") {
        Some(c) if !c.is_null() => json!({
            "id": c.get("id"),
            "number": c.get("number"),
            "title": c.get("title"),
            "state": c.get("state"),
            "url": c.get("url"),
            "repository": c.pointer("/repository/nameWithOwner"),
        }),
        _ => Value::Null,
    };
    json!({
        "id": item.get("id"),
        "type": item.get("type"),
        "archived": item.get("isArchived"),
        "content": content,
        "fields": flatten_field_values(item.get("fieldValues")),
    })
}

/// Build the `ProjectV2FieldValue` input. Exactly one value kind must be set.
pub(crate) fn build_field_value(params: &UpdateItemFieldParams) -> crate::error::Result<Value> {
    let mut candidates: Vec<(&str, Value)> = Vec::new();
    if let Some(ref text) = params.text {
        candidates.push(("text", json!(text)));
    }
    if let Some(number) = params.number {
        if !number.is_finite() {
            return Err(McpGithubError::InvalidParam(
                "number must be finite".to_string(),
            ));
        }
        candidates.push(("number", json!(number)));
    }
    if let Some(ref date) = params.date {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            McpGithubError::InvalidParam(format!("date '{}' is not YYYY-MM-DD", date))
        })?;
        candidates.push(("date", json!(date)));
    }
    if let Some(ref option_id) = params.single_select_option_id {
        candidates.push(("singleSelectOptionId", json!(option_id)));
    }
    if let Some(ref iteration_id) = params.iteration_id {
        candidates.push(("iterationId", json!(iteration_id)));
    }

    match candidates.len() {
        0 => Err(McpGithubError::MissingParam(
            "one of text, number, date, single_select_option_id or iteration_id is required"
                .to_string(),
        )),
        1 => {
            let (key, value) = candidates.remove(0);
            let mut map = Map::new();
            map.insert(key.to_string(), value);
            Ok(Value::Object(map))
        }
        _ => Err(McpGithubError::InvalidParam(
            "only one field value may be set per call".to_string(),
        )),
    }
}

// -- Operations --

impl McpGithubServer {
    async fn do_list_projects(&self, params: ListProjectsParams) -> crate::error::Result<Value> {
        let org = self.resolve_owner(params.org.as_deref())?;
        let first = self.capped_per_page(params.first);

        let data = self
            .github_query(
                LIST_PROJECTS_QUERY,
                json!({ "org": org, "first": first, "after": params.after }),
            )
            .await?;

        let connection = data
            .get("organization")
            .filter(|o| !o.is_null())
            .ok_or_else(|| McpGithubError::NotFound(format!("Organization {}", org)))?
            .get("projectsV2");

        let projects: Vec<Value> = connection_nodes(connection)
            .iter()
            .map(project_summary)
            .collect();

        Ok(json!({
            "org": org,
            "total_count": connection.and_then(|c| c.get("totalCount")),
            "page_info": page_info(connection),
            "count": projects.len(),
            "projects": projects,
        }))
    }

    pub(crate) async fn do_get_project(&self, project_id: &str) -> crate::error::Result<Value> {
        require_non_empty(project_id, "project_id")?;
        let data = self
            .github_query(GET_PROJECT_QUERY, json!({ "id": project_id }))
            .await?;
        let p = project_node(&data, project_id)?;

        Ok(json!({
            "id": p.get("id"),
            "number": p.get("number"),
            "title": p.get("title"),
            "description": p.get("shortDescription"),
            "readme": p.get("readme"),
            "owner": p.pointer("/owner/login"),
            "closed": p.get("closed"),
            "public": p.get("public"),
            "url": p.get("url"),
            "created_at": p.get("createdAt"),
            "updated_at": p.get("updatedAt"),
        }))
    }

    async fn do_list_project_fields(&self, params: ListProjectFieldsParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        let first = self.capped_per_page(params.first);
        let data = self
            .github_query(
                LIST_PROJECT_FIELDS_QUERY,
                json!({ "id": params.project_id, "first": first }),
            )
            .await?;
        let p = project_node(&data, &params.project_id)?;

        let fields: Vec<Value> = connection_nodes(p.get("fields"))
            .iter()
            .filter(|f| f.get("id").is_some())
            .map(field_summary)
            .collect();

        Ok(json!({
            "project_id": params.project_id,
            "count": fields.len(),
            "fields": fields,
        }))
    }

    async fn do_list_project_items(&self, params: ListProjectItemsParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        let first = self.capped_per_page(params.first);
        let data = self
            .github_query(
                LIST_PROJECT_ITEMS_QUERY,
                json!({ "id": params.project_id, "first": first, "after": params.after }),
            )
            .await?;
        let p = project_node(&data, &params.project_id)?;
        let connection = p.get("items");

        let items: Vec<Value> = connection_nodes(connection)
            .iter()
            .map(item_summary)
            .collect();

        Ok(json!({
            "project_id": params.project_id,
            "total_count": connection.and_then(|c| c.get("totalCount")),
            "page_info": page_info(connection),
            "count": items.len(),
            "items": items,
        }))
    }

    async fn do_add_project_item(&self, params: AddProjectItemParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        require_non_empty(&params.content_id, "content_id")?;
        let data = self
            .github_query(
                ADD_PROJECT_ITEM_MUTATION,
                json!({ "projectId": params.project_id, "contentId": params.content_id }),
            )
            .await?;

        Ok(json!({
            "project_id": params.project_id,
            "content_id": params.content_id,
            "item_id": data.pointer("/addProjectV2ItemById/item/id"),
        }))
    }

    async fn do_add_draft_issue(&self, params: AddDraftIssueParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        require_non_empty(&params.title, "title")?;
        let data = self
            .github_query(
                ADD_DRAFT_ISSUE_MUTATION,
                json!({
                    "projectId": params.project_id,
                    "title": params.title,
                    "body": params.body,
                }),
            )
            .await?;

        Ok(json!({
            "project_id": params.project_id,
            "title": params.title,
            "item_id": data.pointer("/addProjectV2DraftIssue/projectItem/id"),
        }))
    }

    async fn do_update_item_field(&self, params: UpdateItemFieldParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        require_non_empty(&params.item_id, "item_id")?;
        require_non_empty(&params.field_id, "field_id")?;
        let value = build_field_value(&params)?;

        let data = self
            .github_query(
                UPDATE_ITEM_FIELD_MUTATION,
                json!({
                    "projectId": params.project_id,
                    "itemId": params.item_id,
                    "fieldId": params.field_id,
                    "value": value,
                }),
            )
            .await?;

        Ok(json!({
            "project_id": params.project_id,
            "item_id": data.pointer("/updateProjectV2ItemFieldValue/projectV2Item/id"),
            "field_id": params.field_id,
            "value": value,
        }))
    }

    async fn do_archive_item(&self, params: ProjectItemParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        require_non_empty(&params.item_id, "item_id")?;
        let data = self
            .github_query(
                ARCHIVE_ITEM_MUTATION,
                json!({ "projectId": params.project_id, "itemId": params.item_id }),
            )
            .await?;

        Ok(json!({
            "project_id": params.project_id,
            "item_id": data.pointer("/archiveProjectV2Item/item/id"),
            "archived": true,
        }))
    }

    async fn do_delete_item(&self, params: ProjectItemParams) -> crate::error::Result<Value> {
        require_non_empty(&params.project_id, "project_id")?;
        require_non_empty(&params.item_id, "item_id")?;
        let data = self
            .github_query(
                DELETE_ITEM_MUTATION,
                json!({ "projectId": params.project_id, "itemId": params.item_id }),
            )
            .await?;

        Ok(json!({
            "project_id": params.project_id,
            "deleted_item_id": data.pointer("/deleteProjectV2Item/deletedItemId"),
        }))
    }
}

// -- MCP tool handlers (thin wrappers calling do_* methods) --

#[tool_router(router = tool_router_projects, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "list_projects",
        description = "List Projects V2 boards owned by an organization, most recently updated first"
    )]
    async fn list_projects(
        &self,
        Parameters(params): Parameters<ListProjectsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_projects(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "get_project",
        description = "Get a Projects V2 board by node ID, including owner, readme and status"
    )]
    async fn get_project(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_get_project(&params.project_id)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "list_project_fields",
        description = "List a project's fields with their types, single-select options and iterations"
    )]
    async fn list_project_fields(
        &self,
        Parameters(params): Parameters<ListProjectFieldsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_project_fields(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "list_project_items",
        description = "List items on a project with their issue/PR/draft content and field values"
    )]
    async fn list_project_items(
        &self,
        Parameters(params): Parameters<ListProjectItemsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_list_project_items(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "add_project_item",
        description = "Add an existing issue or pull request to a project"
    )]
    async fn add_project_item(
        &self,
        Parameters(params): Parameters<AddProjectItemParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_add_project_item(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "add_project_draft_issue",
        description = "Create a draft issue directly on a project"
    )]
    async fn add_project_draft_issue(
        &self,
        Parameters(params): Parameters<AddDraftIssueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_add_draft_issue(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "update_project_item_field",
        description = "Set one field value on a project item: text, number, date, single-select option or iteration"
    )]
    async fn update_project_item_field(
        &self,
        Parameters(params): Parameters<UpdateItemFieldParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_update_item_field(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "archive_project_item",
        description = "Archive an item on a project"
    )]
    async fn archive_project_item(
        &self,
        Parameters(params): Parameters<ProjectItemParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_archive_item(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }

    #[tool(
        name = "delete_project_item",
        description = "Remove an item from a project"
    )]
    async fn delete_project_item(
        &self,
        Parameters(params): Parameters<ProjectItemParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.do_delete_item(params)
            .await
            .map(json_result)
            .map_err(|e| self.err(e))
    }
}
