//! Configuration loading from toolhost.toml.

use mcp::ServerConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_FILE: &str = "toolhost.toml";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the available tools when they help answer the question.";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    /// Tool server to spawn for `chat` and `tools`.
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Model-completion provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    Ollama,
}

/// Backend provider configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Model to use. Defaults depend on the provider.
    pub model: Option<String>,

    /// Anthropic API key. Falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,

    /// Endpoint override (Anthropic messages URL or Ollama base URL).
    pub base_url: Option<String>,

    pub max_tokens: Option<u32>,
}

impl BackendConfig {
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model.as_str(),
            (None, Provider::Anthropic) => "claude-sonnet-4-20250514",
            (None, Provider::Ollama) => "llama3.1",
        }
    }

    /// The configured key, else the environment's.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerSection {
    /// Server executable. Defaults to this binary.
    pub command: Option<String>,

    /// Arguments. Defaults to `["serve"]` when `command` is unset.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServerSection {
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let (command, args) = match &self.command {
            Some(command) => (command.clone(), self.args.clone()),
            None => {
                let exe = std::env::current_exe()?;
                let args = if self.args.is_empty() {
                    vec!["serve".to_string()]
                } else {
                    self.args.clone()
                };
                (exe.to_string_lossy().into_owned(), args)
            }
        };

        Ok(ServerConfig {
            name: Path::new(&command)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| command.clone()),
            command,
            args,
            env: self.env.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Per-request deadline for tool server calls. Unset waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_tool_rounds: default_max_tool_rounds(),
            request_timeout_secs: None,
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_tool_rounds() -> usize {
    runtime::MAX_TOOL_ROUNDS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, else use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set backend.api_key in {CONFIG_FILE} or {API_KEY_ENV}")]
    MissingApiKey,
}
