use std::sync::Arc;

use serde_json::Value;

use crate::error::{GaggleError, Result};
use crate::llm::LanguageModel;
use crate::memory::ConversationMemory;
use crate::message::{Message, ToolCall};
use crate::tool::ToolRegistry;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant tasked with using tools \
to help someone accomplish database-related tasks.";

/// An agent that alternates between the language model and registered tools
/// until the model replies without requesting a tool call.
pub struct Agent<M: LanguageModel> {
    system_prompt: String,
    model: Arc<M>,
    tools: ToolRegistry,
    memory: ConversationMemory,
    max_steps: usize,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model,
            tools: ToolRegistry::new(),
            memory: ConversationMemory::default(),
            max_steps: 100,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Apply `[agent]` settings from a loaded configuration.
    pub fn with_config(mut self, cfg: &crate::config::AgentConfig) -> Self {
        self.max_steps = cfg.max_steps.max(1);
        if let Some(prompt) = &cfg.system_prompt {
            self.system_prompt = prompt.clone();
        }
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Bound on model calls per `respond`. Guards against a model that
    /// keeps requesting tools forever.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    /// The full transcript so far, including every intermediate assistant
    /// and tool-result turn. Still readable after a `StepLimitExceeded`
    /// failure, so a partial run is never silently dropped.
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Run a single exchange with the agent. Returns the final assistant
    /// reply once the model stops requesting tool calls.
    ///
    /// Tool lookup failures and tool handler failures are surfaced back to
    /// the model as error-flagged tool results; only model client failures
    /// and the step limit abort the run.
    pub async fn respond(&mut self, user_input: impl Into<String>) -> Result<String> {
        if self.memory.is_empty() {
            self.memory.push(Message::system(&self.system_prompt));
        }
        self.memory.push(Message::user(user_input));

        let descriptions = self.tools.describe();
        for step in 0..self.max_steps {
            let completion = self
                .model
                .complete_chat(self.memory.messages(), &descriptions)
                .await?;

            let content = completion.content.unwrap_or_default();
            if completion.tool_calls.is_empty() {
                self.memory.push(Message::assistant(content.clone()));
                tracing::debug!(steps = step + 1, "agent run complete");
                return Ok(content);
            }

            self.memory.push(Message::assistant_with_calls(
                content,
                completion.tool_calls.clone(),
            ));

            // Requests are executed one at a time, in the order the model
            // emitted them; later calls may depend on earlier writes.
            for call in &completion.tool_calls {
                let result = self.execute_call(call).await;
                self.memory.push(result);
            }
        }

        tracing::warn!(limit = self.max_steps, "agent hit the step limit");
        Err(GaggleError::StepLimitExceeded {
            limit: self.max_steps,
        })
    }

    async fn execute_call(&self, call: &ToolCall) -> Message {
        tracing::debug!(tool = %call.name, call_id = %call.id, "executing tool call");
        match self.tools.call(&call.name, call.arguments.clone()).await {
            Ok(output) => Message::tool_result(call, render_output(&output)),
            Err(GaggleError::ToolNotFound(name)) => {
                tracing::warn!(tool = %name, "model requested an unknown tool");
                Message::tool_error(call, format!("unknown tool `{name}`"))
            }
            Err(err) => {
                tracing::warn!(tool = %call.name, error = %err, "tool call failed");
                Message::tool_error(call, err.to_string())
            }
        }
    }
}

/// Tool outputs travel back to the model as text; bare strings are passed
/// through without JSON quoting.
fn render_output(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
