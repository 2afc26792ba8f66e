/*!
 * Provider wrappers used by the integration tests
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dataset_translator::errors::ProviderError;
use dataset_translator::providers::mock::MockProvider;
use dataset_translator::providers::{ChatRequest, ChatResponse, Provider};

/// Records the instant of every call before delegating to a mock
#[derive(Debug, Clone)]
pub struct TimedProvider {
    inner: MockProvider,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl TimedProvider {
    pub fn new(inner: MockProvider) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        let mut calls = self.calls.lock().clone();
        calls.sort();
        calls
    }

    /// Largest number of calls inside any half-open window `(t - period, t]`
    pub fn max_calls_in_window(&self, period: Duration) -> usize {
        let calls = self.call_instants();
        let mut max = 0;
        for (end, t) in calls.iter().enumerate() {
            let in_window = calls[..=end].iter().filter(|c| t.duration_since(**c) < period).count();
            max = max.max(in_window);
        }
        max
    }
}

#[async_trait]
impl Provider for TimedProvider {
    fn name(&self) -> &str {
        "timed-mock"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.lock().push(Instant::now());
        self.inner.complete(request).await
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.inner.test_connection().await
    }
}
