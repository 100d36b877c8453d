//! Ollama `/api/chat` backend.

use super::system_prompt;
use crate::model::{Backend, Message, ModelError, ModelRequest, ModelResponse, Role, Usage};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
}

impl OllamaBackendBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn build(self) -> OllamaBackend {
        OllamaBackend {
            client: reqwest::Client::new(),
            url: format!("{}/api/chat", self.base_url.trim_end_matches('/')),
            model: self.model,
            max_tokens: self.max_tokens,
        }
    }
}

/// Backend for a local Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: Option<u32>,
}

impl OllamaBackend {
    pub fn builder(model: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(model)
    }

    fn message_to_api(msg: &Message) -> Option<ChatMessage<'_>> {
        let role = match msg.role {
            Role::System => return None,
            Role::User | Role::ToolResult => "user",
            Role::Assistant => "assistant",
        };
        Some(ChatMessage {
            role,
            content: &msg.content,
        })
    }

    fn build_request<'a>(
        &'a self,
        request: &'a ModelRequest<'a>,
        system: Option<&'a str>,
    ) -> ChatRequest<'a> {
        let system = system.map(|content| ChatMessage {
            role: "system",
            content,
        });
        ChatRequest {
            model: &self.model,
            messages: system
                .into_iter()
                .chain(request.messages.iter().filter_map(Self::message_to_api))
                .collect(),
            stream: false,
            options: self.max_tokens.map(|num_predict| ChatOptions { num_predict }),
        }
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.model)
    }
}

impl Backend for OllamaBackend {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let system = system_prompt(&request);
        let body = self.build_request(&request, system.as_deref());

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(ModelResponse {
            text: chat.message.content,
            usage: Usage {
                input_tokens: chat.prompt_eval_count,
                output_tokens: chat.eval_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_is_derived_from_base() {
        let backend = OllamaBackend::builder("llama3").base_url("http://gpu:11434/").build();
        assert_eq!(backend.url, "http://gpu:11434/api/chat");
        assert_eq!(OllamaBackend::builder("llama3").build().url, "http://localhost:11434/api/chat");
    }

    #[test]
    fn system_prompt_leads_the_messages() {
        let backend = OllamaBackend::builder("llama3").max_tokens(64).build();
        let messages = [
            Message::system("be brief"),
            Message::user("hi"),
            Message::tool_result("[clock] success: {}"),
        ];
        let request = ModelRequest {
            messages: &messages,
            tools: &[],
        };

        let body = serde_json::to_value(backend.build_request(&request, Some("be brief"))).unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(
            body["messages"],
            json!([
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "hi" },
                { "role": "user", "content": "[clock] success: {}" }
            ])
        );
    }

    #[test]
    fn response_counts_are_optional() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "llama3",
            "message": { "role": "assistant", "content": "hello" },
            "done": true
        }))
        .unwrap();
        assert_eq!(response.message.content, "hello");
        assert_eq!(response.eval_count, 0);
    }
}
