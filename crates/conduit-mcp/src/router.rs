//! Dispatch of public tool names to the owning server.

use serde_json::{Map, Value};

use crate::connection::ServerConnection;
use crate::error::{McpError, RouteError};
use crate::protocol::ToolContent;
use crate::registry::{CatalogEntry, ToolRegistry};

/// Normalized result of a routed call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Server that executed the call.
    pub server: String,
    /// Operation name as the server knows it.
    pub tool: String,
    /// All content items rendered as text.
    pub text: String,
    /// Raw content items.
    pub content: Vec<ToolContent>,
    /// Structured output, when the tool returned one.
    pub structured: Option<Value>,
}

/// Routes calls through a registry snapshot to the live connections.
#[derive(Debug, Clone, Copy)]
pub struct CallRouter<'a> {
    registry: &'a ToolRegistry,
    connections: &'a [ServerConnection],
}

impl<'a> CallRouter<'a> {
    /// Create a router over a registry and the connections it refers to.
    pub fn new(registry: &'a ToolRegistry, connections: &'a [ServerConnection]) -> Self {
        Self {
            registry,
            connections,
        }
    }

    /// The catalog the model should see.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.registry.catalog()
    }

    /// Invoke the tool registered under `public_name`.
    ///
    /// Unknown names fail before any server is contacted. `null` arguments
    /// are sent as an empty object.
    pub async fn route(&self, public_name: &str, arguments: Value) -> Result<ToolOutput, RouteError> {
        let target =
            self.registry
                .resolve(public_name)
                .map_err(|_| RouteError::UnknownTool {
                    name: public_name.to_string(),
                })?;

        let arguments = match arguments {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(Map::new()),
            other => {
                return Err(RouteError::InvalidArguments {
                    name: public_name.to_string(),
                    reason: format!("expected a JSON object, got {}", json_kind(&other)),
                });
            }
        };

        let connection = self
            .connections
            .iter()
            .find(|c| c.name() == target.server)
            .ok_or_else(|| RouteError::Invocation {
                server: target.server.to_string(),
                tool: target.operation.to_string(),
                source: McpError::NotOpen {
                    server: target.server.to_string(),
                },
            })?;

        tracing::debug!(
            tool = %public_name,
            server = %target.server,
            operation = %target.operation,
            "routing tool call"
        );

        let result = connection
            .invoke(target.operation, arguments)
            .await
            .map_err(|source| RouteError::Invocation {
                server: target.server.to_string(),
                tool: target.operation.to_string(),
                source,
            })?;

        Ok(ToolOutput {
            server: target.server.to_string(),
            tool: target.operation.to_string(),
            text: result.rendered_text(),
            content: result.content,
            structured: result.structured_content,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CallToolResult, ToolInfo};
    use crate::session::McpServerConfig;
    use crate::testing::{FakeConnector, FakeServer};
    use serde_json::json;

    async fn setup(connector: &FakeConnector, servers: &[&str]) -> (ToolRegistry, Vec<ServerConnection>) {
        let mut registry = ToolRegistry::new();
        let mut connections = Vec::new();
        for name in servers {
            let conn = ServerConnection::connect(&McpServerConfig::new(*name, "x"), connector)
                .await
                .unwrap();
            registry.register(name, conn.catalog()).unwrap();
            connections.push(conn);
        }
        (registry, connections)
    }

    fn fetch_servers() -> FakeConnector {
        FakeConnector::new()
            .with_server(
                FakeServer::new("files")
                    .with_tool(ToolInfo::new("fetch"))
                    .with_response("fetch", CallToolResult::text("from files")),
            )
            .with_server(
                FakeServer::new("web")
                    .with_tool(ToolInfo::new("fetch"))
                    .with_response("fetch", CallToolResult::text("from web")),
            )
    }

    #[tokio::test]
    async fn test_same_operation_routes_to_owner() {
        let connector = fetch_servers();
        let (registry, connections) = setup(&connector, &["files", "web"]).await;
        let router = CallRouter::new(&registry, &connections);

        let out = router.route("files__fetch", json!({})).await.unwrap();
        assert_eq!(out.server, "files");
        assert_eq!(out.tool, "fetch");
        assert_eq!(out.text, "from files");

        let out = router.route("web__fetch", json!({})).await.unwrap();
        assert_eq!(out.text, "from web");

        let calls = connector.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!((calls[0].server.as_str(), calls[0].tool.as_str()), ("files", "fetch"));
        assert_eq!((calls[1].server.as_str(), calls[1].tool.as_str()), ("web", "fetch"));
    }

    #[tokio::test]
    async fn test_unknown_tool_never_reaches_a_server() {
        let connector = fetch_servers();
        let (registry, connections) = setup(&connector, &["files", "web"]).await;
        let router = CallRouter::new(&registry, &connections);

        let err = router.route("fetch", json!({})).await.unwrap_err();
        assert!(matches!(err, RouteError::UnknownTool { ref name } if name == "fetch"));
        assert!(err.is_recoverable());
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_null_arguments_become_empty_object() {
        let connector = fetch_servers();
        let (registry, connections) = setup(&connector, &["files"]).await;
        let router = CallRouter::new(&registry, &connections);

        router.route("files__fetch", Value::Null).await.unwrap();
        assert_eq!(connector.calls()[0].arguments, json!({}));
    }

    #[tokio::test]
    async fn test_non_object_arguments_are_rejected() {
        let connector = fetch_servers();
        let (registry, connections) = setup(&connector, &["files"]).await;
        let router = CallRouter::new(&registry, &connections);

        let err = router.route("files__fetch", json!([1, 2])).await.unwrap_err();
        match &err {
            RouteError::InvalidArguments { name, reason } => {
                assert_eq!(name, "files__fetch");
                assert!(reason.contains("an array"));
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
        assert!(!err.is_recoverable());
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_server_and_tool() {
        let connector = FakeConnector::new().with_server(
            FakeServer::new("files")
                .with_tool(ToolInfo::new("fetch"))
                .with_response("fetch", CallToolResult::error("disk on fire")),
        );
        let (registry, connections) = setup(&connector, &["files"]).await;
        let router = CallRouter::new(&registry, &connections);

        let err = router.route("files__fetch", json!({})).await.unwrap_err();
        match &err {
            RouteError::Invocation {
                server,
                tool,
                source: McpError::RemoteTool { message },
            } => {
                assert_eq!(server, "files");
                assert_eq!(tool, "fetch");
                assert_eq!(message, "disk on fire");
            }
            other => panic!("expected remote tool failure, got {other:?}"),
        }
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_closed_connection_is_not_open() {
        let connector = fetch_servers();
        let (registry, connections) = setup(&connector, &["files"]).await;
        connections[0].close().await.unwrap();
        let router = CallRouter::new(&registry, &connections);

        let err = router.route("files__fetch", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            RouteError::Invocation { source: McpError::NotOpen { .. }, .. }
        ));
        assert!(err.is_recoverable());
    }
}
