//! Introspection over the registered tools.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData};
use rmcp::{schemars, tool, tool_router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::McpGithubError;
use crate::server::{json_result, McpGithubServer};

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct DescribeToolsParams {
    #[schemars(description = "Only describe the tool with this name")]
    #[serde(default)]
    pub name: Option<String>,
}

impl McpGithubServer {
    /// Name, description and input schema of every registered tool, sorted by name.
    pub fn tool_catalog(&self, name: Option<&str>) -> crate::error::Result<Value> {
        let mut tools = self.tool_router.list_all();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(name) = name {
            tools.retain(|t| t.name == name);
            if tools.is_empty() {
                return Err(McpGithubError::NotFound(format!("Tool {}", name)));
            }
        }

        let described: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": Value::Object(t.input_schema.as_ref().clone()),
                })
            })
            .collect();

        Ok(json!({
            "server": "mcp-github-projects",
            "version": env!("CARGO_PKG_VERSION"),
            "count": described.len(),
            "tools": described,
        }))
    }
}

#[tool_router(router = tool_router_metadata, vis = "pub(crate)")]
impl McpGithubServer {
    #[tool(
        name = "describe_tools",
        description = "List every tool this server exposes with its description and input JSON schema"
    )]
    async fn describe_tools(
        &self,
        Parameters(params): Parameters<DescribeToolsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.tool_catalog(params.name.as_deref())
            .map(json_result)
            .map_err(|e| self.err(e))
    }
}
