//! The remote deployment mode, exercised in-process: the database tools
//! live behind a `ToolServer`, and the agent's registry is populated by
//! querying that server, exactly as it would be over HTTP.

#![cfg(all(feature = "duckdb", feature = "server"))]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use gaggle::mcp::{JsonRpcRequest, JsonRpcResponse, McpClient, McpTransport, RemoteToolset};
use gaggle::server::ToolServer;
use gaggle::tools::database_toolkit;
use gaggle::{Agent, ModelCompletion, Result, StubModel, ToolRegistry};

/// Transport that hands requests straight to a server's dispatcher.
struct Loopback {
    server: Arc<ToolServer>,
}

#[async_trait]
impl McpTransport for Loopback {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        Ok(self.server.dispatch(request).await)
    }
}

fn remote_client() -> McpClient<Loopback> {
    let server = ToolServer::new("database_tools", database_toolkit());
    McpClient::new(Loopback {
        server: Arc::new(server),
    })
}

#[tokio::test]
async fn registry_is_populated_from_the_server() {
    let mut registry = ToolRegistry::new();
    let count = RemoteToolset::new(remote_client())
        .register_tools(&mut registry)
        .await
        .unwrap();

    assert_eq!(count, 3);
    let mut names = registry.names();
    names.sort();
    assert_eq!(
        names,
        [
            "add_row_to_database",
            "initialize_database",
            "show_database_output"
        ]
    );
}

#[tokio::test]
async fn agent_runs_the_same_exercise_through_the_wire_types() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("temp.db");
    let db_path = db_path.to_string_lossy();

    let mut registry = ToolRegistry::new();
    RemoteToolset::new(remote_client())
        .register_tools(&mut registry)
        .await
        .unwrap();

    let model = StubModel::new(vec![
        ModelCompletion::tool_call("initialize_database", json!({ "database_path": db_path })),
        ModelCompletion::tool_call(
            "add_row_to_database",
            json!({ "database_path": db_path, "message": "duck" }),
        ),
        ModelCompletion::tool_call(
            "add_row_to_database",
            json!({ "database_path": db_path, "message": "goose" }),
        ),
        ModelCompletion::tool_call("show_database_output", json!({ "database_path": db_path })),
        ModelCompletion::text("done"),
    ]);

    let mut agent = Agent::new(model).with_tools(registry);
    let reply = agent.respond("fill the pond").await.unwrap();
    assert_eq!(reply, "done");

    let last_result = agent
        .memory()
        .iter()
        .rev()
        .find_map(|m| m.tool_result.as_ref())
        .unwrap();
    assert_eq!(last_result.output, "duck\ngoose");
}

#[tokio::test]
async fn served_tool_failures_stay_recoverable_across_the_wire() {
    let mut registry = ToolRegistry::new();
    RemoteToolset::new(remote_client())
        .register_tools(&mut registry)
        .await
        .unwrap();

    let model = StubModel::new(vec![
        // Missing `message` makes the served tool fail.
        ModelCompletion::tool_call("add_row_to_database", json!({ "database_path": "x.db" })),
        ModelCompletion::text("understood"),
    ]);

    let mut agent = Agent::new(model).with_tools(registry);
    let reply = agent.respond("add a row").await.unwrap();
    assert_eq!(reply, "understood");

    let result = agent
        .memory()
        .iter()
        .find_map(|m| m.tool_result.as_ref())
        .unwrap();
    assert!(result.is_error);
}
