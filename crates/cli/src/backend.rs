//! Backend selected by configuration.

use runtime::{AnthropicBackend, Backend, ModelError, ModelRequest, ModelResponse, OllamaBackend};

use crate::config::{BackendConfig, ConfigError, Provider};

pub enum ChatBackend {
    Anthropic(AnthropicBackend),
    Ollama(OllamaBackend),
}

impl ChatBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        match config.provider {
            Provider::Anthropic => {
                let mut builder = AnthropicBackend::builder(config.api_key()?, config.model());
                if let Some(url) = &config.base_url {
                    builder = builder.url(url);
                }
                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }
                Ok(Self::Anthropic(builder.build()))
            }
            Provider::Ollama => {
                let mut builder = OllamaBackend::builder(config.model());
                if let Some(url) = &config.base_url {
                    builder = builder.base_url(url);
                }
                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }
                Ok(Self::Ollama(builder.build()))
            }
        }
    }
}

impl std::fmt::Display for ChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic(backend) => write!(f, "{backend}"),
            Self::Ollama(backend) => write!(f, "{backend}"),
        }
    }
}

impl Backend for ChatBackend {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        match self {
            Self::Anthropic(backend) => backend.generate(request).await,
            Self::Ollama(backend) => backend.generate(request).await,
        }
    }
}
