//! Async chat client for the text-generation service
//!
//! Model-agnostic HTTP client supporting both Anthropic and
//! OpenAI-compatible APIs (DeepSeek, etc). Single-shot request/response;
//! the pipeline needs no streaming. The orchestrator consumes this through
//! the `ChatService` trait so tests can script responses.

use crate::core::error::{DraftError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// One conversation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Narrow seam to the generation service
#[allow(async_fn_in_trait)]
pub trait ChatService {
    /// Send one message list, get the raw text of the single response
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// API format type
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

/// HTTP chat client
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    api_format: ApiFormat,
}

impl LlmClient {
    /// Create a new client with explicit configuration
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            api_format,
        }
    }

    /// Detect API format from URL
    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            // DeepSeek, OpenAI, and other compatible APIs use OpenAI format
            ApiFormat::OpenAI
        }
    }

    /// Create a client from environment variables
    ///
    /// Required: LLM_API_KEY
    /// Optional: LLM_API_URL (defaults to Anthropic API)
    /// Optional: LLM_MODEL (defaults to claude-3-haiku-20240307)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| DraftError::LlmError("LLM_API_KEY not set".into()))?;
        let api_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".into());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "claude-3-haiku-20240307".into());

        Ok(Self::new(api_key, api_url, model))
    }

    async fn chat_anthropic(&self, messages: &[ChatMessage]) -> Result<String> {
        // Anthropic carries the system prompt out of band
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let turns: Vec<WireMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect();

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 8192,
            system,
            messages: turns,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DraftError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DraftError::LlmError(format!("API error: {}", error_text)));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| DraftError::LlmError(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| DraftError::LlmError("Empty response".into()))
    }

    async fn chat_openai(&self, messages: &[ChatMessage]) -> Result<String> {
        // Model-specific max_tokens limits
        let max_tokens = if self.model.contains("reasoner") {
            32768
        } else {
            8192
        };

        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().into(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DraftError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DraftError::LlmError(format!("API error: {}", error_text)));
        }

        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| DraftError::LlmError(e.to_string()))?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| DraftError::LlmError("Empty response".into()))
    }
}

impl ChatService for LlmClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        match self.api_format {
            ApiFormat::Anthropic => self.chat_anthropic(messages).await,
            ApiFormat::OpenAI => self.chat_openai(messages).await,
        }
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

// Shared wire shape
#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com".into(),
            "test-model".into(),
        );
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_format, ApiFormat::OpenAI);
    }

    #[test]
    fn test_anthropic_format_detection() {
        let client = LlmClient::new(
            "k".into(),
            "https://api.anthropic.com/v1/messages".into(),
            "m".into(),
        );
        assert_eq!(client.api_format, ApiFormat::Anthropic);
    }

    #[test]
    fn test_message_constructors() {
        let m = ChatMessage::system("rules");
        assert_eq!(m.role, Role::System);
        let m = ChatMessage::user("hi");
        assert_eq!(m.role, Role::User);
    }

    #[test]
    fn test_from_env_missing_key() {
        let result = LlmClient::from_env();
        if std::env::var("LLM_API_KEY").is_err() {
            assert!(result.is_err());
        }
    }
}
