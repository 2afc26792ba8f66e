/*!
 * Prompt templates and schema rendering for oracle calls.
 */

pub mod templates;

pub use templates::{PromptTemplate, RenderedPrompt, render_schema};
