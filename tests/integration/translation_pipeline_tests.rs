/*!
 * Orchestrated runs against mock oracles
 */

use std::sync::Arc;
use std::time::Duration;

use dataset_translator::database::SqliteProgressStore;
use dataset_translator::errors::{ItemFailure, TranslationError};
use dataset_translator::providers::Provider;
use dataset_translator::providers::mock::{MockProvider, TRANSLATED_PREFIX};
use dataset_translator::translation::{
    BatchOrchestrator, FileProgressStore, InstructionPair, PromptTemplate, RateLimiter, RetryPolicy,
    TranslationClient, read_record,
};

use crate::common::mock_providers::TimedProvider;
use crate::common::{SharedStore, create_temp_dir, init_test_logger, sample_instruction_items};

fn orchestrator(
    provider: Arc<dyn Provider>,
    store: SharedStore,
    limiter: RateLimiter,
    max_attempts: u32,
) -> BatchOrchestrator<InstructionPair> {
    let client = TranslationClient::new(
        provider,
        PromptTemplate::instructions(),
        "mock-model",
        "English",
        "Portuguese",
        false,
    );
    BatchOrchestrator::new(
        Arc::new(client),
        store,
        Arc::new(limiter),
        RetryPolicy::new(max_attempts, Duration::from_millis(1)).with_max_backoff(Duration::from_millis(5)),
    )
    .with_batch_size(3)
    .with_workers(2)
}

fn file_store(dir: &std::path::Path) -> SharedStore {
    Arc::new(FileProgressStore::new(dir.join("cache")))
}

#[tokio::test(start_paused = true)]
async fn test_run_withTightRateLimit_shouldNeverExceedWindowAcrossWorkers() {
    init_test_logger();
    let dir = create_temp_dir().unwrap();
    let provider = TimedProvider::new(MockProvider::working());
    let period = Duration::from_secs(1);

    let report = orchestrator(
        Arc::new(provider.clone()),
        file_store(dir.path()),
        RateLimiter::new(3, period).unwrap(),
        3,
    )
    .with_batch_size(2)
    .with_workers(4)
    .run(sample_instruction_items(10))
    .await;

    assert!(report.is_complete());
    assert_eq!(provider.call_instants().len(), 10);
    assert!(provider.max_calls_in_window(period) <= 3);
}

#[tokio::test]
async fn test_run_withUnparseableReplies_shouldStopAtMaxAttempts() {
    let dir = create_temp_dir().unwrap();
    let store = file_store(dir.path());
    let provider = MockProvider::invalid_json();

    let report = orchestrator(Arc::new(provider.clone()), store.clone(), RateLimiter::per_seconds(1000, 1).unwrap(), 4)
        .run(sample_instruction_items(3))
        .await;

    assert_eq!(provider.request_count(), 3 * 4);
    assert_eq!(report.failed_indices(), vec![0, 1, 2]);
    for failure in &report.failures {
        assert!(
            matches!(
                &failure.failure,
                ItemFailure::RetryExhausted { attempts: 4, last: TranslationError::Validation(_) }
            ),
            "unexpected failure {:?}",
            failure.failure
        );
    }
    assert!(store.indices("instructions").unwrap().is_empty());
}

#[tokio::test]
async fn test_run_withEchoingOracle_shouldStoreNothing() {
    let dir = create_temp_dir().unwrap();
    let store = file_store(dir.path());
    let provider = MockProvider::echo_prompt();

    let report = orchestrator(Arc::new(provider.clone()), store.clone(), RateLimiter::per_seconds(1000, 1).unwrap(), 2)
        .run(sample_instruction_items(4))
        .await;

    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.failures.len(), 4);
    assert_eq!(provider.request_count(), 8);
    assert!(store.indices("instructions").unwrap().is_empty());
}

#[tokio::test]
async fn test_run_withUnevenBatches_shouldTranslateEveryIndexOnce() {
    let dir = create_temp_dir().unwrap();
    let store = file_store(dir.path());
    let provider = MockProvider::working();

    let report = orchestrator(Arc::new(provider.clone()), store.clone(), RateLimiter::per_seconds(1000, 1).unwrap(), 3)
        .with_workers(4)
        .run(sample_instruction_items(11))
        .await;

    assert_eq!(report.translated, 11);
    assert_eq!(provider.request_count(), 11);
    for index in 0..11 {
        assert_eq!(provider.requests_containing(&format!("task {} on", index)), 1, "index {}", index);
        let stored: InstructionPair = read_record(store.as_ref(), "instructions", index).unwrap().unwrap();
        assert_eq!(stored.instruction, format!("{}How do I run task {} on Linux?", TRANSLATED_PREFIX, index));
    }
}

#[tokio::test]
async fn test_run_withSqliteStore_shouldResumeLikeFileStore() {
    let dir = create_temp_dir().unwrap();
    let store: SharedStore = Arc::new(SqliteProgressStore::open(dir.path().join("progress.db")).unwrap());
    let provider = MockProvider::working();
    let limiter = || RateLimiter::per_seconds(1000, 1).unwrap();

    let first = orchestrator(Arc::new(provider.clone()), store.clone(), limiter(), 3)
        .run(sample_instruction_items(5))
        .await;
    store.invalidate("instructions", 2).unwrap();
    let second = orchestrator(Arc::new(provider.clone()), store.clone(), limiter(), 3)
        .run(sample_instruction_items(5))
        .await;

    assert_eq!(first.translated, 5);
    assert_eq!(second.translated, 1);
    assert_eq!(second.cache_hits, 4);
    assert_eq!(provider.request_count(), 6);
    assert_eq!(provider.requests_containing("task 2 on"), 2);
}

#[tokio::test]
async fn test_run_withIntermittentRateLimits_shouldRecoverEveryItem() {
    let dir = create_temp_dir().unwrap();
    let store = file_store(dir.path());
    let provider = MockProvider::intermittent(3);

    let report = orchestrator(Arc::new(provider.clone()), store.clone(), RateLimiter::per_seconds(1000, 1).unwrap(), 3)
        .with_workers(1)
        .run(sample_instruction_items(6))
        .await;

    assert!(report.is_complete());
    // calls #3 and #6 are rejected and each retried once
    assert_eq!(provider.request_count(), 8);
    assert_eq!(store.indices("instructions").unwrap().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_run_withSlowOracle_shouldOverlapWorkers() {
    let dir = create_temp_dir().unwrap();
    let store = file_store(dir.path());
    let provider = MockProvider::slow(1000);
    let start = tokio::time::Instant::now();

    let report = orchestrator(Arc::new(provider.clone()), store.clone(), RateLimiter::per_seconds(1000, 1).unwrap(), 1)
        .with_batch_size(2)
        .with_workers(4)
        .run(sample_instruction_items(8))
        .await;

    assert!(report.is_complete());
    assert_eq!(provider.request_count(), 8);
    // Four batches of two sequential one-second calls each
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "{:?}", elapsed);
}
