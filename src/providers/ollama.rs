use std::time::Duration;

use async_trait::async_trait;
use log::{error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::openai::map_send_error;
use super::{ChatMessage, ChatRequest, ChatResponse, Provider};
use crate::errors::ProviderError;

/// Ollama client for interacting with a local Ollama server
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Format to return a response in
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    stream: bool,
}

/// Message in an Ollama chat response
#[derive(Debug, Deserialize)]
pub struct OllamaMessage {
    #[serde(default)]
    pub content: String,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub message: OllamaMessage,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl From<ChatRequest> for OllamaChatRequest {
    fn from(request: ChatRequest) -> Self {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            GenerationOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }
        });

        Self {
            model: request.model,
            messages: request.messages,
            options,
            format: request.json_mode.then(|| "json".to_string()),
            stream: false,
        }
    }
}

impl Ollama {
    /// Create a client from a base URL such as `http://localhost:11434`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(timeout)
                // Ollama uses HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Parse a chat body, accepting a JSONL stream when the server ignored `stream: false`
    pub fn parse_chat_body(body: &str) -> Result<ChatResponse, ProviderError> {
        match serde_json::from_str::<OllamaChatResponse>(body) {
            Ok(response) => Ok(ChatResponse {
                text: response.message.content,
                prompt_tokens: response.prompt_eval_count,
                completion_tokens: response.eval_count,
            }),
            Err(e) => {
                let chunks: Vec<OllamaChatResponse> = body
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .filter_map(|line| serde_json::from_str(line).ok())
                    .collect();

                if chunks.is_empty() {
                    return Err(ProviderError::ParseError(format!(
                        "{}: {}",
                        e,
                        body.chars().take(500).collect::<String>()
                    )));
                }

                warn!("Ollama returned {} streamed chunks, concatenating", chunks.len());
                let text = chunks.iter().map(|c| c.message.content.as_str()).collect();
                let last = chunks.iter().rev().find(|c| c.done);

                Ok(ChatResponse {
                    text,
                    prompt_tokens: last.and_then(|c| c.prompt_eval_count),
                    completion_tokens: last.and_then(|c| c.eval_count),
                })
            }
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest::from(request);

        let response = self.client.post(&url).json(&body).send().await.map_err(map_send_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read Ollama response: {}", e)))?;

        if !status.is_success() {
            error!("Ollama API error ({}): {}", status, text);
            return Err(ProviderError::from_status(status.as_u16(), text));
        }

        Self::parse_chat_body(&text)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.client.get(&url).send().await.map_err(map_send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::from_status(
                status.as_u16(),
                format!("Ollama server at {} answered {}", self.base_url, status),
            ))
        }
    }
}
