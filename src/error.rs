use thiserror::Error;

pub type Result<T> = std::result::Result<T, GaggleError>;

#[derive(Debug, Error)]
pub enum GaggleError {
    #[error("tool `{0}` not found")]
    ToolNotFound(String),

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("mcp error: {0}")]
    Mcp(String),

    #[error("config error: {0}")]
    Config(String),

    /// The agent made `limit` model calls without producing a tool-call-free
    /// reply. The partial transcript stays in the agent's memory.
    #[error("agent reached the step limit ({limit}) without a final response")]
    StepLimitExceeded { limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
