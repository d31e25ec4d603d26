use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// One-shot chat completion: an optional system instruction plus a user
/// message, answered with plain text. Stateless per call.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = system {
            messages.push(ChatMessage {
                role: "system",
                content: instruction,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        debug!(model = %self.model, prompt_chars = user.len(), "chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| LlmError(error.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError(format!("api returned {}", response.status())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError(format!("malformed response: {error}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError("response contained no message content".to_string()))
    }
}
