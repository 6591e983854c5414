//! Language model abstractions and clients.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{GaggleError, Result};
use crate::message::{Message, Role, ToolCall};
use crate::tool::ToolDescription;

/// Result of a chat completion request: a natural-language reply, zero or
/// more tool call requests, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelCompletion {
    /// A tool-call-free reply; receiving one terminates the agent loop.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A completion requesting a single tool call with a fresh call id.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                id: Uuid::new_v4().to_string(),
                name: name.into(),
                arguments,
            }],
        }
    }
}

/// Minimal abstraction around a chat completion provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelCompletion>;
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> GaggleError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return GaggleError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    GaggleError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

/// Client for a local Ollama server using its native tool-calling chat API.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(300)) // Local models can be slow
                .build()
                .unwrap_or_default(),
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.base_url = host.into();
        self
    }

    pub fn from_env() -> Self {
        let mut client = Self::new();
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            client.base_url = host;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            client.model = model;
        }
        client
    }

    pub fn from_config(cfg: &crate::config::ModelConfig) -> Self {
        let mut client = Self::new().with_model(cfg.model.clone());
        if let Some(base_url) = &cfg.base_url {
            client.base_url = base_url.clone();
        }
        client
    }

    fn to_ollama_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let mut body = json!({
                    "role": role,
                    "content": m.content.clone(),
                });
                if !m.tool_calls.is_empty() {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments,
                                }
                            })
                        })
                        .collect();
                    body["tool_calls"] = json!(calls);
                }
                body
            })
            .collect()
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete_chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescription],
    ) -> Result<ModelCompletion> {
        let mut body = json!({
            "model": self.model,
            "messages": self.to_ollama_messages(messages),
            "stream": false,
        });

        if !tools.is_empty() {
            let ollama_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(ollama_tools);
        }

        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GaggleError::LanguageModel(format!("Ollama request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "Ollama"));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| GaggleError::LanguageModel(format!("Ollama parse error: {e}")))?;

        let message = &json["message"];
        let content = message["content"].as_str().map(String::from);

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let func = &call["function"];
                let name = func["name"].as_str().unwrap_or("").to_string();
                // Ollama does not assign call ids; mint one so tool results
                // can always reference the call that produced them.
                let id = call["id"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: func["arguments"].clone(),
                });
            }
        }

        tracing::debug!(
            model = %self.model,
            tool_calls = tool_calls.len(),
            "ollama completion received"
        );

        Ok(ModelCompletion {
            content,
            tool_calls,
        })
    }
}

/// Scripted model for tests: returns queued completions in order, then the
/// repeating fallback if one was configured.
pub struct StubModel {
    script: Mutex<VecDeque<ModelCompletion>>,
    fallback: Option<ModelCompletion>,
    calls: AtomicUsize,
}

impl StubModel {
    pub fn new(script: Vec<ModelCompletion>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// A stub that returns the same completion on every call.
    pub fn repeating(completion: ModelCompletion) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(completion),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete_chat(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescription],
    ) -> Result<ModelCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .map_err(|_| GaggleError::LanguageModel("stub lock poisoned".into()))?
            .pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(completion) => Ok(completion),
            None => Err(GaggleError::LanguageModel("stub script exhausted".into())),
        }
    }
}
