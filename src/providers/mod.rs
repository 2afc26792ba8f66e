/*!
 * Oracle providers.
 *
 * Every provider answers the same chat-shaped request so the translation
 * client can hold any of them behind `Arc<dyn Provider>`:
 * - OpenAI: any OpenAI-compatible chat completions endpoint (Groq, OpenAI, Maritaca)
 * - Ollama: local LLM server
 * - Mock: scripted provider for tests
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Chat message sent to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
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

/// Provider-independent completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model name
    pub model: String,
    /// Conversation, system message first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum number of generated tokens
    pub max_tokens: Option<u32>,
    /// Ask the provider to constrain its output to a JSON object
    pub json_mode: bool,
}

impl ChatRequest {
    /// Create a request with no messages
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    /// Add a system message
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Add a user message
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request JSON-constrained output
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Content of the last user message, if any
    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Provider-independent completion response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatResponse {
    /// Generated text
    pub text: String,
    /// Prompt tokens, when reported
    pub prompt_tokens: Option<u64>,
    /// Completion tokens, when reported
    pub completion_tokens: Option<u64>,
}

impl ChatResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Common trait for all oracle providers
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short provider name, used in logs
    fn name(&self) -> &str;

    /// Complete a chat request
    ///
    /// # Returns
    /// * `Result<ChatResponse, ProviderError>` - The generated text or a transport/API error
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

pub mod mock;
pub mod ollama;
pub mod openai;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chatRequest_builder_shouldKeepMessageOrder() {
        let request = ChatRequest::new("model")
            .system("rules")
            .user("payload")
            .temperature(0.0)
            .json();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.user_content(), Some("payload"));
        assert!(request.json_mode);
    }

    #[test]
    fn test_chatMessage_shouldSerializeLowercaseRole() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
