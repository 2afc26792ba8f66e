/*!
 * # dataset-translator
 *
 * Rate-limited, cached, retrying translation of training datasets through an
 * LLM provider.
 *
 * ## Features
 *
 * - Instruction/response pairs (JSON) and multiple-choice questions (CSV)
 * - Providers:
 *   - OpenAI-compatible chat completions (Groq, OpenAI, Maritaca)
 *   - Ollama (local LLM)
 * - Sliding-window rate limit shared by all workers
 * - Bounded retries with exponential or fixed backoff
 * - Write-once progress store (JSON files or SQLite) that makes runs resumable
 * - Validation of every reply before it is stored
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `dataset`: Source dataset loading
 * - `export`: Aggregation of stored translations into one output file
 * - `translation`: The translation pipeline:
 *   - `translation::rate_limit`: Sliding-window rate limiter
 *   - `translation::cache`: Progress store trait and file backend
 *   - `translation::client`: One typed, validated oracle call
 *   - `translation::retry`: Per-item retry policy
 *   - `translation::batch`: Partitioning and concurrent dispatch
 * - `validation`: Reply parsing and validation rules
 * - `database`: SQLite progress store backend
 * - `providers`: Client implementations for LLM providers
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod dataset;
pub mod errors;
pub mod export;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod translation;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, Pipeline};
pub use errors::{AppError, ItemFailure, ProviderError, TranslationError, ValidationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use translation::{BatchOrchestrator, RateLimiter, RetryPolicy, RunReport, TranslationClient};
