/*!
 * Validator that runs every rule against an oracle reply.
 */

use log::debug;
use serde_json::{Map, Value};

use super::json::parse_object;
use super::rules::{NonEmptyValues, PromptLeakage, RequiredKeys, ValidationRule};
use crate::errors::ValidationError;
use crate::translation::document::Document;
use crate::translation::prompts::PromptTemplate;

/// Parses a reply and applies the configured rules in order
#[derive(Debug)]
pub struct ResponseValidator {
    leakage: PromptLeakage,
    rules: Vec<Box<dyn ValidationRule>>,
    lenient_json: bool,
}

impl ResponseValidator {
    /// Build the standard rule set for a record type and its prompt
    pub fn for_document<D: Document>(template: &PromptTemplate, lenient_json: bool) -> Self {
        let leakage = PromptLeakage::new(template.leakage_markers());
        let rules: Vec<Box<dyn ValidationRule>> = vec![
            Box::new(leakage.clone()),
            Box::new(RequiredKeys::new(D::fields())),
            Box::new(NonEmptyValues::new(D::fields())),
        ];

        Self {
            leakage,
            rules,
            lenient_json,
        }
    }

    /// Names of the active rules, in order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate a raw reply and return its JSON object
    pub fn validate(&self, raw: &str) -> Result<Map<String, Value>, ValidationError> {
        let object = match parse_object(raw, self.lenient_json) {
            Ok(object) => object,
            Err(parse_error) => {
                // An echoed prompt is rarely valid JSON; report the echo rather than the syntax
                self.leakage.scan(raw)?;
                return Err(parse_error);
            }
        };

        for rule in &self.rules {
            if let Err(error) = rule.check(raw, &object) {
                debug!("Rule '{}' rejected reply: {}", rule.name(), error);
                return Err(error);
            }
        }

        Ok(object)
    }
}
