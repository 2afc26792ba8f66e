/*!
 * Prompt templates for record translation.
 *
 * Each template is a system/user pair. The system prompt embeds a JSON schema
 * of the keys the oracle must return; the user prompt embeds the source
 * record verbatim as JSON.
 */

use serde_json::{Map, Value, json};

use crate::translation::document::{FieldKind, FieldSpec};

/// Rendered system/user message pair for one oracle call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// System and user prompt template with placeholders.
///
/// Placeholders: `{source_language}`, `{target_language}`, `{schema}`, `{document}`.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    user: String,
}

impl PromptTemplate {
    /// Tokens substituted by `render`
    pub const PLACEHOLDERS: &'static [&'static str] =
        &["{source_language}", "{target_language}", "{schema}", "{document}"];

    pub const INSTRUCTION_SYSTEM: &'static str = r#"You are a {target_language} translator specialised in information technology. Your only task is to translate while keeping the JSON schema below.
Never answer the instruction and never add comments besides the translation.
Keep technical jargon, code, shell commands, logs and system messages in their original form.
The JSON schema is:
{schema}"#;

    pub const INSTRUCTION_USER: &'static str = r#"Translate the following instruction and answer from {source_language} to {target_language}.
Return only a JSON object whose keys stay in English, with the instruction under "instruction" and the answer under "output".
Remember that you only translate.
# Document to translate:
{document}"#;

    pub const MULTIPLE_CHOICE_SYSTEM: &'static str = r#"You are a translator from {source_language} to {target_language} specialised in information technology and computing.
The output must follow the JSON schema:
{schema}"#;

    pub const MULTIPLE_CHOICE_USER: &'static str = r#"Translate the document below, keeping technical jargon, technology terms and lines of code in their original form.
Do not make any comment, only translate the question and the options and copy the id unchanged.
{document}"#;

    /// Phrases of earlier prompt versions; an answer quoting them is
    /// an echo, whatever template produced the request.
    const LEGACY_MARKERS: &'static [&'static str] = &["Translate the following", "Traduza a seguinte"];

    /// Create a template from raw system and user strings
    pub fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
        }
    }

    /// Template for instruction/response pairs
    pub fn instructions() -> Self {
        Self::new(Self::INSTRUCTION_SYSTEM, Self::INSTRUCTION_USER)
    }

    /// Template for multiple-choice questions
    pub fn multiple_choice() -> Self {
        Self::new(Self::MULTIPLE_CHOICE_SYSTEM, Self::MULTIPLE_CHOICE_USER)
    }

    /// Render both messages
    pub fn render(
        &self,
        source_language: &str,
        target_language: &str,
        schema: &str,
        document: &str,
    ) -> RenderedPrompt {
        let fill = |template: &str| {
            template
                .replace("{source_language}", source_language)
                .replace("{target_language}", target_language)
                .replace("{schema}", schema)
                .replace("{document}", document)
        };

        RenderedPrompt {
            system: fill(&self.system),
            user: fill(&self.user),
        }
    }

    /// Directive sentences of this template that a real translation never contains.
    ///
    /// Only lines without placeholders are used, so the markers are identical
    /// for every rendered request.
    pub fn leakage_markers(&self) -> Vec<String> {
        let mut markers: Vec<String> = self
            .system
            .lines()
            .chain(self.user.lines())
            .map(str::trim)
            .filter(|line| line.len() >= 20 && !line.contains('{') && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        for legacy in Self::LEGACY_MARKERS {
            if !markers.iter().any(|m| m.contains(legacy)) {
                markers.push(legacy.to_string());
            }
        }

        markers
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::instructions()
    }
}

/// Describe the required keys as a JSON schema, pretty printed
pub fn render_schema(fields: &[FieldSpec]) -> String {
    let mut properties = Map::new();
    for field in fields {
        let kind = match field.kind {
            FieldKind::Text => "string",
            FieldKind::Integer => "integer",
        };
        properties.insert(
            field.name.to_string(),
            json!({ "type": kind, "description": field.description }),
        );
    }

    let required: Vec<&str> = fields.iter().map(|f| f.name).collect();
    let schema = json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
        "additionalProperties": false,
    });

    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
}
