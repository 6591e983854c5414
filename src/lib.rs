//! Building blocks for running tool-calling agents against a database.
//!
//! The crate provides a minimal runtime with:
//! - A chat model abstraction (`LanguageModel`) with an Ollama client.
//! - A simple tool interface (`Tool` and `ToolRegistry`).
//! - An `Agent` that loops between the model and tools until the model
//!   stops requesting tool calls.
//! - DuckDB-backed database tools and an MCP client/server pair for
//!   hosting the same tools behind an HTTP endpoint.

mod agent;
mod config;
mod error;
mod llm;
pub mod mcp;
mod memory;
mod message;
#[cfg(feature = "server")]
pub mod server;
mod telemetry;
mod tool;
pub mod tools;

pub use agent::Agent;
pub use config::{AgentConfig, DatabaseConfig, GaggleConfig, ModelConfig, ServerConfig};
pub use error::{GaggleError, Result};
pub use llm::{LanguageModel, ModelCompletion, OllamaClient, StubModel};
pub use memory::ConversationMemory;
pub use message::{Message, Role, ToolCall, ToolResult};
pub use telemetry::init_tracing;
pub use tool::{Tool, ToolDescription, ToolRegistry};
