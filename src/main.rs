use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mcp_github_projects::config::{self, Config, DatabaseLocation};
use mcp_github_projects::server::McpGithubServer;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::EnvFilter;

/// MCP server for GitHub Projects V2 and Issues, with a local tracking list
#[derive(Parser)]
#[command(name = "mcp-github-projects", version, about)]
struct Cli {
    /// GitHub personal access token.
    /// Can also be set via GITHUB_TOKEN environment variable.
    #[arg(long)]
    token: Option<String>,

    /// Read GitHub token from an environment variable.
    /// Default: GITHUB_TOKEN
    #[arg(long = "token-env")]
    token_env: Option<String>,

    /// Default organization/owner for operations
    #[arg(long, env = "GITHUB_ORG")]
    org: Option<String>,

    /// Default page size for list tools (capped at 100)
    #[arg(long, default_value_t = config::DEFAULT_MAX_RESULTS)]
    max_results: u32,

    /// GraphQL endpoint (override for GitHub Enterprise)
    #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = mcp_github_projects::graphql::GITHUB_GRAPHQL_URL)]
    graphql_url: String,

    /// Path to the tracking database
    #[arg(long, env = "MCP_GITHUB_PROJECTS_DB")]
    db: Option<PathBuf>,

    /// Keep the tracking list in memory only
    #[arg(long, conflicts_with = "db")]
    in_memory: bool,

    /// Print the tool catalog as JSON and exit
    #[arg(long)]
    list_tools: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let token = config::resolve_token(cli.token, cli.token_env.as_deref(), |name| {
        std::env::var(name).ok()
    });

    let database = if cli.in_memory || cli.list_tools {
        DatabaseLocation::InMemory
    } else {
        DatabaseLocation::File(cli.db.unwrap_or_else(config::default_database_path))
    };

    let config = Config {
        token,
        default_org: cli.org,
        max_results: cli.max_results,
        graphql_url: cli.graphql_url,
        database,
    };

    let service = McpGithubServer::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    if cli.list_tools {
        let catalog = service
            .tool_catalog(None)
            .map_err(|e| anyhow::anyhow!("Failed to describe tools: {}", e))?;
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    if config.token.is_none() {
        tracing::warn!("No GitHub token provided, only tracking tools will work");
    }

    tracing::info!(
        authenticated = config.token.is_some(),
        org = config.default_org.as_deref().unwrap_or("none"),
        max_results = config.max_results,
        endpoint = %config.graphql_url,
        database = %config.database,
        "Starting mcp-github-projects server"
    );

    let running = service.serve(stdio()).await?;
    running.waiting().await?;

    Ok(())
}
