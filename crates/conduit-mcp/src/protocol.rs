//! JSON-RPC 2.0 protocol types for MCP.
//!
//! The stdio transport carries one JSON object per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC Base Types
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID for correlating responses.
    pub id: u64,
    /// Method name to call.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC response, either received from a server or sent back to it.
///
/// Server-initiated requests may use string ids, so the id stays untyped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID this response is for.
    pub id: Value,
    /// Result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success reply.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error reply.
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Get the result, or the error object if this is an error response.
    ///
    /// A response carrying neither is reported as `None` in the `Ok` arm so
    /// the caller can decide whether an empty result is acceptable.
    pub fn into_result(self) -> Result<Option<Value>, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
impl JsonRpcError {
    /// Parse error - Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request - Not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Create an error object.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Any message a server may write to its stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    /// Present on responses and server-initiated requests.
    #[serde(default)]
    pub id: Option<Value>,
    /// Present on server-initiated requests and notifications.
    #[serde(default)]
    pub method: Option<String>,
    /// Success payload of a response.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload of a response.
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// What an [`IncomingMessage`] turned out to be.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Reply to one of our requests.
    Response(JsonRpcResponse),
    /// Request from the server that expects a reply.
    Request { id: Value, method: String },
    /// Fire-and-forget message from the server.
    Notification { method: String },
}

impl IncomingMessage {
    /// Classify the message by which members are present.
    pub fn classify(self) -> Option<Incoming> {
        match (self.id, self.method) {
            (Some(id), Some(method)) => Some(Incoming::Request { id, method }),
            (None, Some(method)) => Some(Incoming::Notification { method }),
            (Some(id), None) => Some(Incoming::Response(JsonRpcResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                result: self.result,
                error: self.error,
            })),
            (None, None) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP Protocol Types
// ─────────────────────────────────────────────────────────────────────────────

/// Client capabilities sent during initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Client info sent during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl ClientInfo {
    /// Identify as the given server key, the way each connection names itself.
    pub fn for_server(server: &str) -> Self {
        Self {
            name: format!("conduit-{}", server),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version.
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Client info.
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Handshake parameters for one server connection.
    pub fn for_server(server: &str) -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::for_server(server),
        }
    }
}

/// Server info returned during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    #[serde(default)]
    pub version: String,
}

/// Result of the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version.
    pub protocol_version: String,
    /// Server capabilities, kept opaque.
    #[serde(default)]
    pub capabilities: Value,
    /// Server info.
    pub server_info: ServerInfo,
}

/// A tool (operation) advertised by a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name, unique only within its server.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolInfo {
    /// Create a tool descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// Parameters for the tools/list request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListToolsParams {
    /// Pagination cursor from a previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Result of the tools/list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools on this page.
    pub tools: Vec<ToolInfo>,
    /// Cursor for the next page, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments to pass to the tool.
    pub arguments: Value,
}

/// A resource embedded in a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    /// Resource URI.
    pub uri: String,
    /// Text body, when the resource is textual.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Content item in a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Image content (base64 encoded).
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Audio content (base64 encoded).
    Audio {
        /// Base64-encoded audio data.
        data: String,
        /// MIME type of the audio.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Embedded resource.
    Resource {
        /// The resource itself.
        resource: EmbeddedResource,
    },
    /// Link to a resource the client may fetch.
    ResourceLink {
        /// Resource URI.
        uri: String,
    },
    /// A content type this client does not know.
    #[serde(other)]
    Unsupported,
}

impl ToolContent {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Render the item as text for a text-only consumer.
    pub fn render(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Image { mime_type, .. } => format!("[image: {}]", mime_type),
            Self::Audio { mime_type, .. } => format!("[audio: {}]", mime_type),
            Self::Resource { resource } => match &resource.text {
                Some(text) => text.clone(),
                None => format!("[resource: {}]", resource.uri),
            },
            Self::ResourceLink { uri } => format!("[resource: {}]", uri),
            Self::Unsupported => "[unsupported content]".to_string(),
        }
    }
}

/// Result of the tools/call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool.
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured output, when the tool declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// A successful result with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: None,
            structured_content: None,
        }
    }

    /// A failed result with a single text item.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: Some(true),
            structured_content: None,
        }
    }

    /// All content rendered as text, one item per line.
    pub fn rendered_text(&self) -> String {
        self.content
            .iter()
            .map(ToolContent::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Check if the tool call was an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(1, "initialize", Some(serde_json::json!({"test": true})));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"initialize\""));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_classify_response() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"value":42}}"#;
        let msg: IncomingMessage = serde_json::from_str(json).unwrap();
        match msg.classify() {
            Some(Incoming::Response(resp)) => {
                assert_eq!(resp.id, serde_json::json!(1));
                assert!(!resp.is_error());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let json =
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid Request"}}"#;
        let msg: IncomingMessage = serde_json::from_str(json).unwrap();
        let Some(Incoming::Response(resp)) = msg.classify() else {
            panic!("expected response");
        };
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);
    }

    #[test]
    fn test_classify_server_request_and_notification() {
        let ping: IncomingMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#).unwrap();
        assert!(matches!(
            ping.classify(),
            Some(Incoming::Request { ref method, .. }) if method == "ping"
        ));

        let note: IncomingMessage = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#,
        )
        .unwrap();
        assert!(matches!(
            note.classify(),
            Some(Incoming::Notification { ref method }) if method == "notifications/message"
        ));
    }

    #[test]
    fn test_initialize_params() {
        let params = InitializeParams::for_server("files");
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("protocolVersion"));
        assert!(json.contains("clientInfo"));
        assert!(json.contains("conduit-files"));
    }

    #[test]
    fn test_tool_info_deserialization() {
        let json = r#"{
            "name": "read_file",
            "description": "Read a file from disk",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {"type": "string"}
                },
                "required": ["path"]
            }
        }"#;
        let tool: ToolInfo = serde_json::from_str(json).unwrap();
        assert_eq!(tool.name, "read_file");
        assert!(tool.description.is_some());
        assert_eq!(tool.input_schema.unwrap()["required"][0], "path");
    }

    #[test]
    fn test_list_tools_pagination_cursor() {
        let json = r#"{"tools":[{"name":"a"}],"nextCursor":"page-2"}"#;
        let page: ListToolsResult = serde_json::from_str(json).unwrap();
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));

        let params = ListToolsParams {
            cursor: page.next_cursor,
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"cursor": "page-2"})
        );
    }

    #[test]
    fn test_call_tool_result_mixed_content() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "File contents here"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "resource", "resource": {"uri": "file:///a.txt", "text": "inline"}},
                {"type": "hologram", "beams": 3}
            ],
            "isError": false
        }"#;
        let result: CallToolResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_error());
        assert_eq!(result.content.len(), 4);
        assert_eq!(result.content[3], ToolContent::Unsupported);
        assert_eq!(
            result.rendered_text(),
            "File contents here\n[image: image/png]\ninline\n[unsupported content]"
        );
    }

    #[test]
    fn test_call_tool_result_error_flag() {
        let json = r#"{"content":[{"type":"text","text":"boom"}],"isError":true}"#;
        let result: CallToolResult = serde_json::from_str(json).unwrap();
        assert!(result.is_error());
        assert_eq!(result.rendered_text(), "boom");
    }
}
