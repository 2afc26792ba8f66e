/*!
 * Tests for configuration files
 */

use dataset_translator::app_config::{BackoffStrategy, CacheBackend, Config, TranslationProvider};

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let (config, created) = Config::load_or_create(&path).unwrap();
    assert!(created);
    assert!(path.exists());

    let (reloaded, created_again) = Config::load_or_create(&path).unwrap();
    assert!(!created_again);
    assert_eq!(reloaded.rate_limit.max_calls, config.rate_limit.max_calls);
    assert_eq!(reloaded.translation.provider, TranslationProvider::Groq);
    assert_eq!(reloaded.translation.get_max_tokens(), None);
}

#[test]
fn test_loadOrCreate_withHandWrittenFile_shouldReadEverySection() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "source_language": "en",
            "target_language": "pt-BR",
            "translation": {
                "provider": "maritaca",
                "available_providers": [
                    {"type": "maritaca", "model": "sabia-3", "api_key": "secret", "endpoint": "https://chat.maritaca.ai/api", "max_tokens": 1024}
                ]
            },
            "rate_limit": {"max_calls": 20, "period_secs": 30},
            "batch": {"batch_size": 4, "workers": 2},
            "retry": {"max_attempts": 5, "strategy": "fixed"},
            "cache": {"backend": "sqlite", "dir": "cache"},
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let (config, created) = Config::load_or_create(&path).unwrap();

    assert!(!created);
    assert_eq!(config.translation.provider, TranslationProvider::Maritaca);
    assert_eq!(config.translation.get_api_key(), "secret");
    assert_eq!(config.translation.get_max_tokens(), Some(1024));
    assert_eq!(config.rate_limit.max_calls, 20);
    assert_eq!(config.batch.workers, 2);
    assert_eq!(config.retry.strategy, BackoffStrategy::Fixed);
    assert_eq!(config.retry.backoff_base_ms, 1000);
    assert_eq!(config.cache.backend, CacheBackend::Sqlite);
}

#[test]
fn test_loadOrCreate_withInvalidJson_shouldFail() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    assert!(Config::load_or_create(&path).is_err());
}

#[test]
fn test_getApiKey_withCustomEnvVariable_shouldReadEnvironment() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::OpenAI;
    let provider = config.translation.active_provider_config_mut();
    provider.api_key.clear();
    provider.api_key_env = "DATASET_TRANSLATOR_TEST_OPENAI_KEY".to_string();
    // SAFETY: no other test reads or writes this variable
    unsafe { std::env::set_var("DATASET_TRANSLATOR_TEST_OPENAI_KEY", " sk-test \n") };

    assert_eq!(config.translation.get_api_key(), "sk-test");
    assert!(config.validate().is_ok());
}

#[test]
fn test_save_thenLoad_shouldKeepOverrides() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("conf.json");
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;
    config.batch.batch_size = 25;

    config.save(&path).unwrap();
    let (loaded, _) = Config::load_or_create(&path).unwrap();

    assert_eq!(loaded.translation.provider, TranslationProvider::Ollama);
    assert_eq!(loaded.batch.batch_size, 25);
}
