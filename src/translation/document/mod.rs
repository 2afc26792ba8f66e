/*!
 * Dataset records and the contract the pipeline needs from them.
 *
 * A `Document` knows which of its fields are sent to the oracle, which keys
 * the oracle must answer with, and how to rebuild itself from a validated
 * oracle object. Pass-through fields (such as the answer letter of a
 * multiple-choice question) never leave the process.
 */

pub mod model;

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::ValidationError;

pub use model::{InstructionPair, MultipleChoiceQuestion};

/// Type of a field the oracle must return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty translated text
    Text,
    /// Integer copied verbatim from the source
    Integer,
}

/// One required key of an oracle reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Shown to the oracle in the rendered schema
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn text(name: &'static str, description: &'static str) -> Self {
        Self { name, kind: FieldKind::Text, description }
    }

    pub const fn integer(name: &'static str, description: &'static str) -> Self {
        Self { name, kind: FieldKind::Integer, description }
    }
}

/// A dataset record that can be translated by the pipeline
pub trait Document: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Cache namespace of the pipeline translating this record type
    const NAMESPACE: &'static str;

    /// Exact key set the oracle must return
    fn fields() -> &'static [FieldSpec];

    /// Oracle-facing fields of this record, in schema order
    fn payload(&self) -> Map<String, Value>;

    /// Build the translated record from an oracle object that already passed
    /// the key, type and emptiness checks
    fn translated(&self, object: &Map<String, Value>) -> Result<Self, ValidationError>;
}

/// One record plus its stable position in the source dataset
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<D> {
    pub index: usize,
    pub document: D,
}

impl<D> WorkItem<D> {
    pub fn new(index: usize, document: D) -> Self {
        Self { index, document }
    }
}

/// Number a dataset in its original order
pub fn enumerate_items<D>(documents: Vec<D>) -> Vec<WorkItem<D>> {
    documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| WorkItem::new(index, document))
        .collect()
}

/// Read an integer field, accepting integer-valued strings
pub fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Read a text field verbatim, surrounding whitespace included
pub(crate) fn text_field(object: &Map<String, Value>, name: &str) -> Result<String, ValidationError> {
    match object.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::WrongType { field: name.to_string(), expected: "a string" }),
        None => Err(ValidationError::MissingKey(name.to_string())),
    }
}
