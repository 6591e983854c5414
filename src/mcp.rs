//! MCP (Model Context Protocol) support: a JSON-RPC client for consuming
//! tools hosted behind a remote endpoint, plus the wire types shared with
//! the serving side in [`crate::server`].
//!
//! A registry populated through [`RemoteToolset`] is indistinguishable to
//! the agent loop from one holding in-process tools: the loop never learns
//! whether a handler ran locally or across the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GaggleError, Result};
use crate::tool::{Tool, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: 0,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A tool as advertised by a server: name plus declared argument schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<RemoteToolDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "text")]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Transport layer carrying JSON-RPC requests to a tool server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;
}

/// Transport that POSTs each request to a single HTTP endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, mut request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        request.id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GaggleError::Mcp(format!("HTTP request failed: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| GaggleError::Mcp(format!("failed to parse response: {e}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client that speaks the tool-serving protocol over a transport.
pub struct McpClient<T: McpTransport> {
    transport: T,
    initialized: bool,
    server_info: Option<ServerInfo>,
}

impl<T: McpTransport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            initialized: false,
            server_info: None,
        }
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub async fn initialize(&mut self) -> Result<&ServerInfo> {
        if !self.initialized {
            let request = JsonRpcRequest::new(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "gaggle",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            );
            let response = self.transport.send(request).await?;
            let result: InitializeResult = parse_result(response, "initialize")?;

            self.server_info = Some(result.server_info);
            self.initialized = true;

            let notification = JsonRpcRequest::new("notifications/initialized", None);
            let _ = self.transport.send(notification).await;
        }

        self.server_info
            .as_ref()
            .ok_or_else(|| GaggleError::Mcp("server info not available".into()))
    }

    /// List the tools the server advertises, as name/schema pairs.
    pub async fn list_tools(&mut self) -> Result<Vec<RemoteToolDefinition>> {
        if !self.initialized {
            self.initialize().await?;
        }

        let response = self
            .transport
            .send(JsonRpcRequest::new("tools/list", None))
            .await?;
        let result: ListToolsResult = parse_result(response, "tools/list")?;
        Ok(result.tools)
    }

    /// Invoke a named tool on the server.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        if !self.initialized {
            self.initialize().await?;
        }

        let request = JsonRpcRequest::new(
            "tools/call",
            Some(serde_json::json!({ "name": name, "arguments": arguments })),
        );
        let response = self.transport.send(request).await?;
        parse_result(response, "tools/call")
    }
}

fn parse_result<R: serde::de::DeserializeOwned>(
    response: JsonRpcResponse,
    method: &str,
) -> Result<R> {
    if let Some(error) = response.error {
        return Err(GaggleError::Mcp(format!(
            "{method} failed: {}",
            error.message
        )));
    }
    serde_json::from_value(response.result.unwrap_or_default())
        .map_err(|e| GaggleError::Mcp(format!("failed to parse {method} result: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry integration
// ─────────────────────────────────────────────────────────────────────────────

/// Populates a [`ToolRegistry`] with wrappers around a server's tools, one
/// per advertised definition.
pub struct RemoteToolset<T: McpTransport + 'static> {
    client: Arc<tokio::sync::Mutex<McpClient<T>>>,
}

impl<T: McpTransport + 'static> RemoteToolset<T> {
    pub fn new(client: McpClient<T>) -> Self {
        Self {
            client: Arc::new(tokio::sync::Mutex::new(client)),
        }
    }

    /// Query the server for its tools and register a wrapper for each.
    /// Returns the number of tools registered.
    pub async fn register_tools(&self, registry: &mut ToolRegistry) -> Result<usize> {
        let definitions = self.client.lock().await.list_tools().await?;

        let mut count = 0;
        for definition in definitions {
            let description = definition
                .description
                .clone()
                .unwrap_or_else(|| format!("Remote tool `{}`", definition.name));
            registry.register(RemoteTool {
                name: definition.name,
                description,
                parameters: definition.input_schema,
                client: Arc::clone(&self.client),
            });
            count += 1;
        }

        tracing::info!(count, "registered remote tools");
        Ok(count)
    }
}

/// A registry entry whose handler lives on the other side of a transport.
struct RemoteTool<T: McpTransport + 'static> {
    name: String,
    description: String,
    parameters: Value,
    client: Arc<tokio::sync::Mutex<McpClient<T>>>,
}

#[async_trait]
impl<T: McpTransport + 'static> Tool for RemoteTool<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Option<Value> {
        Some(self.parameters.clone())
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let result = self
            .client
            .lock()
            .await
            .call_tool(&self.name, input)
            .await?;
        let text = result.joined_text();
        if result.is_error {
            // Becomes a recoverable tool-result error turn in the loop.
            return Err(GaggleError::Mcp(text));
        }
        Ok(Value::String(text))
    }
}
