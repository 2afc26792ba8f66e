/*!
 * Validation of oracle replies.
 *
 * - `json`: extraction of the JSON object from the reply text
 * - `rules`: named rules (prompt leakage, required keys, non-empty values)
 * - `service`: the validator combining parsing and rules
 */

pub mod json;
pub mod rules;
pub mod service;

// Re-export main types
pub use rules::{NonEmptyValues, PromptLeakage, RequiredKeys, ValidationRule};
pub use service::ResponseValidator;
