/*!
 * Controller workflows over dataset files on disk
 */

use std::sync::Arc;

use dataset_translator::app_config::CacheBackend;
use dataset_translator::app_controller::{Controller, Pipeline};
use dataset_translator::providers::mock::{MockProvider, TRANSLATED_PREFIX};

use crate::common::{
    create_instruction_dataset, create_multiple_choice_dataset, create_temp_dir, init_test_logger, test_config,
};

fn controller(dir: &std::path::Path, backend: CacheBackend, provider: &MockProvider) -> Controller {
    let config = test_config(dir, backend);
    let store = Controller::build_store(&config).unwrap();
    Controller::with_components(config, Arc::new(provider.clone()), store)
}

#[tokio::test]
async fn test_runInstructions_shouldWriteTranslatedArray() {
    init_test_logger();
    let dir = create_temp_dir().unwrap();
    let input = create_instruction_dataset(dir.path(), "linux.json", 4).unwrap();
    let output = dir.path().join("out").join("linux.pt.json");
    let provider = MockProvider::working();

    let summary = controller(dir.path(), CacheBackend::Files, &provider)
        .run_instructions(&input, &output)
        .await
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.run.translated, 4);
    assert_eq!(summary.export.translated, 4);

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let rows = written.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3]["instruction"], format!("{}How do I run task 3 on Linux?", TRANSLATED_PREFIX));
    assert_eq!(rows[3]["input"], "");
}

#[tokio::test]
async fn test_runMultipleChoice_shouldKeepAnswersAndCategories() {
    let dir = create_temp_dir().unwrap();
    let input = create_multiple_choice_dataset(dir.path(), "linux.csv", 3).unwrap();
    let output = dir.path().join("linux.pt.csv");
    let provider = MockProvider::working();

    let summary = controller(dir.path(), CacheBackend::Sqlite, &provider)
        .run_multiple_choice(&input, &output)
        .await
        .unwrap();

    assert!(summary.is_complete());
    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "id,question,A,B,C,D,answer,category");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("100,[TRANSLATED] Which command does job 0?"));
    assert!(lines[1].ends_with(",A,linux"));
}

#[tokio::test]
async fn test_invalidate_thenRerun_shouldOnlyTranslateInvalidatedItems() {
    let dir = create_temp_dir().unwrap();
    let input = create_instruction_dataset(dir.path(), "linux.json", 5).unwrap();
    let output = dir.path().join("linux.pt.json");
    let provider = MockProvider::working();
    let controller = controller(dir.path(), CacheBackend::Files, &provider);

    controller.run_instructions(&input, &output).await.unwrap();
    let removed = controller.invalidate(Pipeline::Instructions, &[1, 3, 42]).unwrap();
    let status = controller.status(Pipeline::Instructions, &input).unwrap();
    let rerun = controller.run_instructions(&input, &output).await.unwrap();

    assert_eq!(removed, 2);
    assert_eq!(status.pending, vec![1, 3]);
    assert_eq!(status.cached, 3);
    assert_eq!(rerun.run.translated, 2);
    assert_eq!(rerun.run.cache_hits, 3);
    assert_eq!(provider.request_count(), 7);
}

#[tokio::test]
async fn test_runInstructions_withFailingItems_shouldExportPartialResults() {
    let dir = create_temp_dir().unwrap();
    let input = create_instruction_dataset(dir.path(), "linux.json", 3).unwrap();
    let output = dir.path().join("linux.pt.json");
    let provider = MockProvider::echo_prompt();
    let controller = controller(dir.path(), CacheBackend::Files, &provider);

    let summary = controller.run_instructions(&input, &output).await.unwrap();

    assert!(!summary.is_complete());
    assert_eq!(summary.export.missing, vec![0, 1, 2]);
    let failure_log = std::fs::read_to_string(dir.path().join("cache").join("failures.log")).unwrap();
    assert_eq!(failure_log.lines().count(), 3);
    assert!(failure_log.contains("instructions #0"));
}

#[tokio::test]
async fn test_runInstructions_withUnreachableProvider_shouldFailBeforeTranslating() {
    let dir = create_temp_dir().unwrap();
    let input = create_instruction_dataset(dir.path(), "linux.json", 2).unwrap();
    let provider = MockProvider::failing();

    let result = controller(dir.path(), CacheBackend::Files, &provider)
        .run_instructions(&input, &dir.path().join("out.json"))
        .await;

    assert!(result.is_err());
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_export_fromCacheOnlyController_shouldNotNeedProvider() {
    let dir = create_temp_dir().unwrap();
    let input = create_instruction_dataset(dir.path(), "linux.json", 3).unwrap();
    let provider = MockProvider::working();
    controller(dir.path(), CacheBackend::Sqlite, &provider)
        .translate(Pipeline::Instructions, crate::common::sample_instructions(2))
        .await
        .unwrap();

    let cache_only = Controller::for_cache(test_config(dir.path(), CacheBackend::Sqlite)).unwrap();
    let output = dir.path().join("partial.json");
    let export = cache_only.export(Pipeline::Instructions, &input, &output).unwrap();
    let status = cache_only.status(Pipeline::Instructions, &input).unwrap();

    assert_eq!(export.translated, 2);
    assert_eq!(export.missing, vec![2]);
    assert_eq!(status.pending, vec![2]);
    assert!(output.exists());
}

#[test]
fn test_runMultipleChoice_twice_shouldServeSecondRunFromCache() {
    let dir = create_temp_dir().unwrap();
    let input = create_multiple_choice_dataset(dir.path(), "linux.csv", 4).unwrap();
    let output = dir.path().join("linux.pt.csv");
    let provider = MockProvider::working();
    let controller = controller(dir.path(), CacheBackend::Files, &provider);

    let (first, second) = tokio_test::block_on(async {
        let first = controller.run_multiple_choice(&input, &output).await.unwrap();
        let second = controller.run_multiple_choice(&input, &output).await.unwrap();
        (first, second)
    });

    assert_eq!(first.run.translated, 4);
    assert_eq!(second.run.cache_hits, 4);
    assert_eq!(provider.request_count(), 4);
    assert!(second.to_string().contains("multiple-choice"));
}
