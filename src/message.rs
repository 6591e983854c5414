use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured request from the model to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The outcome of one tool call, answering the call with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

/// One turn in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// An assistant turn that requests one or more tool calls.
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_result: None,
        }
    }

    /// A tool turn answering `call` with a successful output.
    pub fn tool_result(call: &ToolCall, output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            role: Role::Tool,
            content: output.clone(),
            tool_calls: Vec::new(),
            tool_result: Some(ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                output,
                is_error: false,
            }),
        }
    }

    /// A tool turn answering `call` with an error payload. The error is
    /// surfaced to the model on the next iteration rather than aborting
    /// the loop.
    pub fn tool_error(call: &ToolCall, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            role: Role::Tool,
            content: error.clone(),
            tool_calls: Vec::new(),
            tool_result: Some(ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                output: error,
                is_error: true,
            }),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_result_carries_matching_call_id() {
        let call = ToolCall {
            id: "call-1".into(),
            name: "echo".into(),
            arguments: json!({}),
        };
        let msg = Message::tool_result(&call, "ok");
        let result = msg.tool_result.unwrap();
        assert_eq!(result.call_id, "call-1");
        assert!(!result.is_error);

        let err = Message::tool_error(&call, "boom");
        assert!(err.tool_result.unwrap().is_error);
    }

    #[test]
    fn plain_turns_serialize_without_tool_fields() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_result"));
    }
}
