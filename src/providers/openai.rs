use std::time::Duration;

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatRequest, ChatResponse, Provider};
use crate::errors::ProviderError;

/// Client for any OpenAI-compatible chat completions API.
///
/// Groq, OpenAI and Maritaca all speak this protocol; only the base URL,
/// the key and the name differ.
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// Bearer token
    api_key: String,
    /// Base URL, e.g. `https://api.groq.com/openai/v1`
    endpoint: String,
    /// Name used in logs
    name: String,
}

/// Chat completions request body
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

/// Requested output format
#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Chat completions response body
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl From<ChatRequest> for OpenAIRequest {
    fn from(request: ChatRequest) -> Self {
        Self {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        }
    }
}

impl OpenAI {
    /// Create a new client
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            name: name.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    /// Extract text from a chat completions response
    pub fn extract_text(response: &OpenAIResponse) -> Option<String> {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
    }
}

/// Map a reqwest failure to a provider error
pub(crate) fn map_send_error(error: reqwest::Error) -> ProviderError {
    if error.is_connect() || error.is_timeout() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

#[async_trait]
impl Provider for OpenAI {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = OpenAIRequest::from(request);

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("{} API error ({}): {}", self.name, status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text = Self::extract_text(&parsed)
            .ok_or_else(|| ProviderError::ParseError("response has no message content".to_string()))?;

        Ok(ChatResponse {
            text,
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ProviderError::from_status(status.as_u16(), error_text))
        }
    }
}
