/*!
 * Named validation rules for oracle replies.
 *
 * Every rule is independently testable and reports a typed
 * `ValidationError`. Rules see both the raw reply text and the parsed object.
 */

use std::fmt::Debug;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::ValidationError;
use crate::translation::document::{FieldKind, FieldSpec, integer_value};

/// Un-substituted template tokens: `{document}` style placeholders and
/// Python-style subscripts such as `documento['instruction']`
static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{(?:source_language|target_language|schema|document)\}|\bdocumento?\[\s*['"](?:instruction|output|id|question|[ABCD]\.?)['"]\s*\]"#,
    )
    .expect("Invalid placeholder regex")
});

/// A single check applied to an oracle reply
pub trait ValidationRule: Send + Sync + Debug {
    /// Stable rule name, used in logs
    fn name(&self) -> &'static str;

    /// Check the reply
    fn check(&self, raw: &str, object: &Map<String, Value>) -> Result<(), ValidationError>;
}

/// Rejects replies that echo the prompt instead of translating it
#[derive(Debug, Clone)]
pub struct PromptLeakage {
    markers: Vec<String>,
}

impl PromptLeakage {
    pub fn new(markers: Vec<String>) -> Self {
        let markers = markers
            .into_iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    /// Scan raw text; usable before the reply is known to be JSON
    pub fn scan(&self, raw: &str) -> Result<(), ValidationError> {
        if let Some(found) = PLACEHOLDER_REGEX.find(raw) {
            return Err(ValidationError::UnsubstitutedPlaceholder(found.as_str().to_string()));
        }

        let haystack = raw.to_lowercase();
        match self.markers.iter().find(|marker| haystack.contains(marker.as_str())) {
            Some(marker) => Err(ValidationError::PromptLeakage(marker.clone())),
            None => Ok(()),
        }
    }
}

impl ValidationRule for PromptLeakage {
    fn name(&self) -> &'static str {
        "prompt_leakage"
    }

    fn check(&self, raw: &str, _object: &Map<String, Value>) -> Result<(), ValidationError> {
        self.scan(raw)
    }
}

/// The reply must carry exactly the required key set
#[derive(Debug, Clone)]
pub struct RequiredKeys {
    fields: &'static [FieldSpec],
}

impl RequiredKeys {
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }
}

impl ValidationRule for RequiredKeys {
    fn name(&self) -> &'static str {
        "required_keys"
    }

    fn check(&self, _raw: &str, object: &Map<String, Value>) -> Result<(), ValidationError> {
        if let Some(missing) = self.fields.iter().find(|f| !object.contains_key(f.name)) {
            return Err(ValidationError::MissingKey(missing.name.to_string()));
        }

        if let Some(extra) = object.keys().find(|k| !self.fields.iter().any(|f| f.name == k.as_str())) {
            return Err(ValidationError::UnexpectedKey(extra.clone()));
        }

        Ok(())
    }
}

/// Text fields must be non-empty strings, integer fields integers
#[derive(Debug, Clone)]
pub struct NonEmptyValues {
    fields: &'static [FieldSpec],
}

impl NonEmptyValues {
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }
}

impl ValidationRule for NonEmptyValues {
    fn name(&self) -> &'static str {
        "non_empty_values"
    }

    fn check(&self, _raw: &str, object: &Map<String, Value>) -> Result<(), ValidationError> {
        for field in self.fields {
            let Some(value) = object.get(field.name) else {
                continue;
            };

            match field.kind {
                FieldKind::Text => match value {
                    Value::String(s) if s.trim().is_empty() => {
                        return Err(ValidationError::EmptyValue(field.name.to_string()));
                    }
                    Value::String(_) => {}
                    Value::Null => return Err(ValidationError::EmptyValue(field.name.to_string())),
                    _ => {
                        return Err(ValidationError::WrongType {
                            field: field.name.to_string(),
                            expected: "a string",
                        });
                    }
                },
                FieldKind::Integer => {
                    if integer_value(value).is_none() {
                        return Err(ValidationError::WrongType {
                            field: field.name.to_string(),
                            expected: "an integer",
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
