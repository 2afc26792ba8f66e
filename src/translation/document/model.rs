/*!
 * The two record shapes handled by the translator.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Document, FieldSpec, integer_value, text_field};
use crate::errors::ValidationError;

/// Instruction/response pair from an instruction-tuning dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPair {
    pub instruction: String,
    pub output: String,
}

impl InstructionPair {
    pub fn new(instruction: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            output: output.into(),
        }
    }
}

const INSTRUCTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("instruction", "translated instruction or question"),
    FieldSpec::text("output", "translated answer"),
];

impl Document for InstructionPair {
    const NAMESPACE: &'static str = "instructions";

    fn fields() -> &'static [FieldSpec] {
        INSTRUCTION_FIELDS
    }

    fn payload(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("instruction".into(), Value::String(self.instruction.clone()));
        map.insert("output".into(), Value::String(self.output.clone()));
        map
    }

    fn translated(&self, object: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            instruction: text_field(object, "instruction")?,
            output: text_field(object, "output")?,
        })
    }
}

/// Multiple-choice question with four labelled options.
///
/// `answer` and `category` are carried through untouched; only the question
/// and the options are translated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleChoiceQuestion {
    pub id: i64,
    pub question: String,
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D", alias = "D.")]
    pub d: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub category: String,
}

const MULTIPLE_CHOICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("id", "integer, copied unchanged from the question"),
    FieldSpec::text("question", "translated question"),
    FieldSpec::text("A", "translated option A"),
    FieldSpec::text("B", "translated option B"),
    FieldSpec::text("C", "translated option C"),
    FieldSpec::text("D", "translated option D"),
];

impl Document for MultipleChoiceQuestion {
    const NAMESPACE: &'static str = "multiple_choice";

    fn fields() -> &'static [FieldSpec] {
        MULTIPLE_CHOICE_FIELDS
    }

    fn payload(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("question".into(), Value::String(self.question.clone()));
        map.insert("A".into(), Value::String(self.a.clone()));
        map.insert("B".into(), Value::String(self.b.clone()));
        map.insert("C".into(), Value::String(self.c.clone()));
        map.insert("D".into(), Value::String(self.d.clone()));
        map
    }

    fn translated(&self, object: &Map<String, Value>) -> Result<Self, ValidationError> {
        let id = object
            .get("id")
            .and_then(integer_value)
            .ok_or_else(|| ValidationError::WrongType { field: "id".into(), expected: "an integer" })?;
        if id != self.id {
            return Err(ValidationError::IdMismatch { expected: self.id, actual: id });
        }

        Ok(Self {
            id,
            question: text_field(object, "question")?,
            a: text_field(object, "A")?,
            b: text_field(object, "B")?,
            c: text_field(object, "C")?,
            d: text_field(object, "D")?,
            answer: self.answer.clone(),
            category: self.category.clone(),
        })
    }
}
