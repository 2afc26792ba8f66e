/*!
 * Mock provider for testing.
 *
 * The mock simulates oracle behaviors without network access:
 * - `MockProvider::working()` - translates the record found in the user prompt
 * - `MockProvider::echo_prompt()` - echoes the user prompt back
 * - `MockProvider::invalid_json()` - answers with prose instead of JSON
 * - `MockProvider::intermittent(n)` - every nth call hits a provider rate limit
 * - `MockProvider::failing()` - always fails with an unclassified server error
 *
 * Scripted replies, consumed in call order before the behavior applies,
 * allow sequences such as "fail twice then succeed".
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{ChatRequest, ChatResponse, Provider};
use crate::validation::json::last_json_object;

/// Prefix the working mock puts in front of every translated text value
pub const TRANSLATED_PREFIX: &str = "[TRANSLATED] ";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a well-formed translation
    Working,
    /// Returns the user prompt verbatim
    EchoPrompt,
    /// Returns prose that is not JSON
    InvalidJson,
    /// Every `fail_every`th request fails with a provider rate limit
    Intermittent { fail_every: usize },
    /// Always fails with an HTTP 500
    Failing,
    /// Simulates a slow response before translating
    Slow { delay_ms: u64 },
}

/// Mock provider recording every request it receives
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    request_count: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn echo_prompt() -> Self {
        Self::new(MockBehavior::EchoPrompt)
    }

    pub fn invalid_json() -> Self {
        Self::new(MockBehavior::InvalidJson)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Queue replies returned, in order, before the behavior applies
    pub fn with_script(self, replies: Vec<Result<String, ProviderError>>) -> Self {
        self.script.lock().extend(replies);
        self
    }

    /// Number of `complete` calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose user prompt contains `needle`
    pub fn requests_containing(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.user_content().is_some_and(|u| u.contains(needle)))
            .count()
    }

    /// Translate the record embedded at the end of a user prompt
    pub fn translate_prompt(user: &str) -> Result<String, ProviderError> {
        let document = last_json_object(user)
            .ok_or_else(|| ProviderError::RequestFailed("prompt carries no JSON record".to_string()))?;
        let mut object = match serde_json::from_str::<Value>(document) {
            Ok(Value::Object(object)) => object,
            _ => return Err(ProviderError::RequestFailed("prompt record is not an object".to_string())),
        };

        for value in object.values_mut() {
            if let Value::String(text) = value {
                *text = format!("{}{}", TRANSLATED_PREFIX, text);
            }
        }

        Ok(Value::Object(object).to_string())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let user = request.user_content().unwrap_or_default().to_string();
        self.requests.lock().push(request);

        let scripted = self.script.lock().pop_front();
        if let Some(reply) = scripted {
            return reply.map(ChatResponse::new);
        }

        match self.behavior {
            MockBehavior::Working => Self::translate_prompt(&user).map(ChatResponse::new),

            MockBehavior::EchoPrompt => Ok(ChatResponse::new(user)),

            MockBehavior::InvalidJson => Ok(ChatResponse::new("Sorry, I can only answer in prose.")),

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::RateLimitExceeded(format!(
                        "Simulated rate limit (request #{})",
                        count + 1
                    )))
                } else {
                    Self::translate_prompt(&user).map(ChatResponse::new)
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Self::translate_prompt(&user).map(ChatResponse::new)
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated outage".to_string())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(document: &str) -> ChatRequest {
        ChatRequest::new("mock")
            .system("translate")
            .user(format!("# Document to translate:\n{}", document))
    }

    #[tokio::test]
    async fn test_workingProvider_shouldTranslateTextValuesOnly() {
        let provider = MockProvider::working();
        let response = provider
            .complete(request(r#"{"id": 3, "question": "What is ls?"}"#))
            .await
            .unwrap();

        let value: Value = serde_json::from_str(&response.text).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["question"], "[TRANSLATED] What is ls?");
    }

    #[tokio::test]
    async fn test_echoProvider_shouldReturnUserPrompt() {
        let provider = MockProvider::echo_prompt();
        let response = provider.complete(request("{}")).await.unwrap();
        assert!(response.text.starts_with("# Document to translate:"));
    }

    #[tokio::test]
    async fn test_failingProvider_shouldReturnServerError() {
        let provider = MockProvider::failing();
        let result = provider.complete(request("{}")).await;
        assert!(matches!(result, Err(ProviderError::ApiError { status_code: 500, .. })));
    }

    #[tokio::test]
    async fn test_intermittentProvider_shouldFailPeriodically() {
        let provider = MockProvider::intermittent(3);
        let doc = r#"{"instruction": "a", "output": "b"}"#;

        assert!(provider.complete(request(doc)).await.is_ok());
        assert!(provider.complete(request(doc)).await.is_ok());
        assert!(matches!(
            provider.complete(request(doc)).await,
            Err(ProviderError::RateLimitExceeded(_))
        ));
        assert!(provider.complete(request(doc)).await.is_ok());
    }

    #[tokio::test]
    async fn test_script_shouldBeConsumedBeforeBehavior() {
        let provider = MockProvider::working().with_script(vec![
            Err(ProviderError::RateLimitExceeded("slow down".into())),
            Ok("not json".into()),
        ]);
        let doc = r#"{"instruction": "a", "output": "b"}"#;

        assert!(provider.complete(request(doc)).await.is_err());
        assert_eq!(provider.complete(request(doc)).await.unwrap().text, "not json");
        assert!(provider.complete(request(doc)).await.unwrap().text.contains("[TRANSLATED] a"));
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_clonedProvider_shouldShareRequestLog() {
        let provider = MockProvider::working();
        let cloned = provider.clone();

        cloned.complete(request(r#"{"instruction": "item 7", "output": "x"}"#)).await.unwrap();
        assert_eq!(provider.request_count(), 1);
        assert_eq!(provider.requests_containing("item 7"), 1);
        assert_eq!(provider.requests().len(), 1);
    }
}
