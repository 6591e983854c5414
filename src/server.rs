//! HTTP serving side of the tool protocol: exposes a local [`ToolRegistry`]
//! behind a single JSON-RPC endpoint, so the tools can be consumed from
//! another process through [`crate::mcp::McpClient`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{GaggleError, Result};
use crate::mcp::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::tool::ToolRegistry;

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

/// Serves a tool registry over HTTP JSON-RPC.
pub struct ToolServer {
    name: String,
    registry: Arc<ToolRegistry>,
}

impl ToolServer {
    pub fn new(name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(registry),
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/mcp", post(handle))
            .with_state(Arc::new(self))
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "tool server listening");
        axum::serve(listener, app)
            .await
            .map_err(|err| GaggleError::Mcp(format!("server error: {err}")))?;
        Ok(())
    }

    /// Answer a single request. Exposed so the server can be driven
    /// without binding a socket, e.g. from tests or an embedded caller.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": self.name,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),
            "notifications/initialized" => ok(id, json!({})),
            "tools/list" => {
                let tools: Vec<Value> = self
                    .registry
                    .describe()
                    .into_iter()
                    .map(|tool| {
                        json!({
                            "name": tool.name,
                            "description": tool.description,
                            "inputSchema": tool.parameters.unwrap_or_else(|| json!({
                                "type": "object"
                            })),
                        })
                    })
                    .collect();
                ok(id, json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(id, request.params).await,
            other => error(
                id,
                METHOD_NOT_FOUND,
                format!("method `{other}` not supported"),
            ),
        }
    }

    async fn call_tool(&self, id: u64, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or_default();
        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name,
            None => return error(id, INVALID_PARAMS, "missing `name` in tools/call".into()),
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        // Tool failures travel inside the result as `isError`, leaving the
        // caller's loop free to recover; only malformed requests get a
        // JSON-RPC error.
        match self.registry.call(name, arguments).await {
            Ok(output) => {
                let text = match output {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                ok(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": false,
                    }),
                )
            }
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "served tool call failed");
                ok(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": err.to_string() }],
                        "isError": true,
                    }),
                )
            }
        }
    }
}

async fn handle(
    State(server): State<Arc<ToolServer>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(server.dispatch(request).await)
}

fn ok(id: u64, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

fn error(id: u64, code: i32, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message,
            data: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::tool::Tool;

    struct QuackTool;

    #[async_trait]
    impl Tool for QuackTool {
        fn name(&self) -> &str {
            "quack"
        }

        fn description(&self) -> &str {
            "Returns a fixed greeting."
        }

        fn parameters(&self) -> Option<Value> {
            Some(json!({ "type": "object", "properties": {} }))
        }

        async fn call(&self, _input: Value) -> Result<Value> {
            Ok(json!("quack!"))
        }
    }

    fn server() -> ToolServer {
        let mut registry = ToolRegistry::new();
        registry.register(QuackTool);
        ToolServer::new("database_tools", registry)
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let response = server()
            .dispatch(JsonRpcRequest::new("initialize", None))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "database_tools");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn lists_registered_tools_with_schemas() {
        let response = server()
            .dispatch(JsonRpcRequest::new("tools/list", None))
            .await;
        let tools = response.result.unwrap()["tools"].clone();
        assert_eq!(tools[0]["name"], "quack");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn calls_are_relayed_to_the_registry() {
        let request = JsonRpcRequest::new(
            "tools/call",
            Some(json!({ "name": "quack", "arguments": {} })),
        );
        let response = server().dispatch(request).await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], "quack!");
    }

    #[tokio::test]
    async fn unknown_tool_comes_back_as_an_error_result() {
        let request = JsonRpcRequest::new(
            "tools/call",
            Some(json!({ "name": "honk", "arguments": {} })),
        );
        let response = server().dispatch(request).await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("not found"));
    }

    #[tokio::test]
    async fn unknown_method_is_a_json_rpc_error() {
        let response = server()
            .dispatch(JsonRpcRequest::new("resources/list", None))
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
    }
}
