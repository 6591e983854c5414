use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GaggleError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            system_prompt: None,
        }
    }
}

fn default_max_steps() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "temp.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Top-level configuration, loaded from TOML with environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GaggleConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl GaggleConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|err| GaggleError::Config(format!("invalid config: {err}")))?;
        Ok(config.apply_env())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            GaggleError::Config(format!(
                "failed to read `{}`: {err}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&raw)
    }

    /// `OLLAMA_HOST` and `OLLAMA_MODEL` take precedence over the file.
    fn apply_env(mut self) -> Self {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.model.base_url = Some(host);
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.model.model = model;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = GaggleConfig::from_toml_str("").unwrap();
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.agent.max_steps, 100);
        assert_eq!(config.database.path, "temp.db");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn sections_override_defaults() {
        let raw = r#"
[model]
model = "llama3.1"

[agent]
max_steps = 5
system_prompt = "Be terse."

[database]
path = "flock.db"

[server]
port = 9000
"#;
        let config = GaggleConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.model.model, "llama3.1");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.system_prompt.as_deref(), Some("Be terse."));
        assert_eq!(config.database.path, "flock.db");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = GaggleConfig::from_toml_str("[model\n").unwrap_err();
        assert!(matches!(err, GaggleError::Config(_)));
    }
}
