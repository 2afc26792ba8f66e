/*!
 * Common test utilities for the dataset-translator test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;
use tempfile::TempDir;

use dataset_translator::app_config::{CacheBackend, Config};
use dataset_translator::translation::{InstructionPair, MultipleChoiceQuestion, WorkItem, enumerate_items};

// Re-export the mock providers module
pub mod mock_providers;

static INIT_LOGGER: Once = Once::new();

/// Route library logs to the test output when RUST_LOG is set
pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// `count` distinct instruction pairs
pub fn sample_instructions(count: usize) -> Vec<InstructionPair> {
    (0..count)
        .map(|i| InstructionPair::new(format!("How do I run task {} on Linux?", i), format!("Use command number {}.", i)))
        .collect()
}

pub fn sample_instruction_items(count: usize) -> Vec<WorkItem<InstructionPair>> {
    enumerate_items(sample_instructions(count))
}

/// `count` distinct multiple-choice questions with ids starting at 100
pub fn sample_questions(count: usize) -> Vec<MultipleChoiceQuestion> {
    (0..count)
        .map(|i| MultipleChoiceQuestion {
            id: 100 + i as i64,
            question: format!("Which command does job {}?", i),
            a: "ls".into(),
            b: "cd".into(),
            c: "rm".into(),
            d: "mv".into(),
            answer: "A".into(),
            category: "linux".into(),
        })
        .collect()
}

/// Writes an instruction dataset as a JSON array
pub fn create_instruction_dataset(dir: &Path, filename: &str, count: usize) -> Result<PathBuf> {
    let content = serde_json::to_string_pretty(&sample_instructions(count))?;
    create_test_file(dir, filename, &content)
}

/// Writes a multiple-choice dataset with the spreadsheet's `D.` header
pub fn create_multiple_choice_dataset(dir: &Path, filename: &str, count: usize) -> Result<PathBuf> {
    let mut content = String::from("id,question,A,B,C,D.,answer,category\n");
    for question in sample_questions(count) {
        content.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            question.id, question.question, question.a, question.b, question.c, question.d, question.answer,
            question.category
        ));
    }
    create_test_file(dir, filename, &content)
}

/// Config with a cache under `dir`, no backoff to speak of, and a generous rate limit
pub fn test_config(dir: &Path, backend: CacheBackend) -> Config {
    let mut config = Config::default();
    config.cache.dir = dir.join("cache");
    config.cache.backend = backend;
    config.rate_limit.max_calls = 1000;
    config.rate_limit.period_secs = 1;
    config.batch.batch_size = 3;
    config.batch.workers = 2;
    config.retry.max_attempts = 3;
    config.retry.backoff_base_ms = 1;
    config.retry.max_backoff_ms = 5;
    config
}

/// Shorthand for the store trait object used by the pipeline
pub type SharedStore = Arc<dyn dataset_translator::translation::ProgressStore>;
