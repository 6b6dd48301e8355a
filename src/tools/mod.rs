//! MCP tool handlers, one router per area.
//!
//! Each module adds an `impl McpGithubServer` block with its own tool router;
//! the routers are merged in [`crate::server::McpGithubServer::new`].

pub mod issues;
pub mod metadata;
pub mod projects;
pub mod tracking;

use serde_json::Value;

/// Extract `nodes` from a GraphQL connection, or an empty list.
pub(crate) fn connection_nodes(connection: Option<&Value>) -> Vec<Value> {
    connection
        .and_then(|c| c.get("nodes"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// `pageInfo` of a connection, reshaped for tool output.
pub(crate) fn page_info(connection: Option<&Value>) -> Value {
    serde_json::json!({
        "has_next_page": connection
            .and_then(|c| c.pointer("/pageInfo/hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        "end_cursor": connection.and_then(|c| c.pointer("/pageInfo/endCursor")),
    })
}

/// Names from a `{ nodes { <field> } }` connection.
pub(crate) fn node_strings(connection: Option<&Value>, field: &str) -> Vec<String> {
    connection_nodes(connection)
        .iter()
        .filter_map(|n| n.get(field).and_then(Value::as_str).map(String::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_nodes_missing() {
        assert!(connection_nodes(None).is_empty());
        assert!(connection_nodes(Some(&json!({"totalCount": 0}))).is_empty());
    }

    #[test]
    fn test_page_info() {
        let conn = json!({"pageInfo": {"hasNextPage": true, "endCursor": "Y3Vyc29y"}});
        assert_eq!(
            page_info(Some(&conn)),
            json!({"has_next_page": true, "end_cursor": "Y3Vyc29y"})
        );
        assert_eq!(
            page_info(None),
            json!({"has_next_page": false, "end_cursor": null})
        );
    }

    #[test]
    fn test_node_strings() {
        let conn = json!({"nodes": [{"login": "a"}, {"login": "b"}, {}]});
        assert_eq!(node_strings(Some(&conn), "login"), vec!["a", "b"]);
    }
}
