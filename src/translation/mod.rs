/*!
 * Dataset translation through an LLM oracle.
 *
 * This module holds the pipeline core. It is split into several submodules:
 *
 * - `document`: the record types and the contract the pipeline needs from them
 * - `prompts`: prompt templates and schema rendering
 * - `client`: one typed, validated oracle call
 * - `rate_limit`: sliding-window admission control shared by all workers
 * - `retry`: per-item bounded retry with backoff
 * - `cache`: the durable, write-once progress store
 * - `batch`: partitioning and concurrent dispatch of work items
 */

// Re-export main types for easier usage
pub use self::batch::{BatchOrchestrator, ItemOutcome, ItemReport, RunReport, partition};
pub use self::cache::{FileProgressStore, ProgressStore, WriteOutcome, read_record, write_record};
pub use self::client::TranslationClient;
pub use self::rate_limit::RateLimiter;
pub use self::retry::RetryPolicy;

// Re-export document model types
pub use self::document::{
    Document, FieldKind, FieldSpec, InstructionPair, MultipleChoiceQuestion, WorkItem, enumerate_items,
};

// Re-export prompt types
pub use self::prompts::{PromptTemplate, RenderedPrompt};

// Submodules
pub mod batch;
pub mod cache;
pub mod client;
pub mod document;
pub mod prompts;
pub mod rate_limit;
pub mod retry;
