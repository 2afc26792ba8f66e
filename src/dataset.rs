use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use std::io::Read;
use std::path::Path;

use crate::file_utils::{FileManager, FileType};
use crate::translation::document::{InstructionPair, MultipleChoiceQuestion};

// @module: Source dataset loading

/// Columns of a multiple-choice CSV after header normalisation
pub const MULTIPLE_CHOICE_COLUMNS: &[&str] = &["id", "question", "A", "B", "C", "D", "answer", "category"];

/// Load instruction pairs from a JSON array file
pub fn load_instructions<P: AsRef<Path>>(path: P) -> Result<Vec<InstructionPair>> {
    let path = path.as_ref();
    if FileManager::detect_file_type(path) != FileType::Json {
        warn!("{} has no .json extension, parsing it as JSON anyway", path.display());
    }

    let content = FileManager::read_to_string(path)?;
    parse_instructions(&content).with_context(|| format!("Failed to parse instruction dataset {}", path.display()))
}

/// Parse a JSON array of `{instruction, output}` objects; other keys are ignored
pub fn parse_instructions(content: &str) -> Result<Vec<InstructionPair>> {
    let pairs: Vec<InstructionPair> =
        serde_json::from_str(content).context("Expected a JSON array of {instruction, output} objects")?;
    debug!("Loaded {} instruction pairs", pairs.len());
    Ok(pairs)
}

/// Load multiple-choice questions from a CSV file
pub fn load_multiple_choice<P: AsRef<Path>>(path: P) -> Result<Vec<MultipleChoiceQuestion>> {
    let path = path.as_ref();
    if FileManager::detect_file_type(path) != FileType::Csv {
        warn!("{} has no .csv extension, parsing it as CSV anyway", path.display());
    }

    let file = std::fs::File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    parse_multiple_choice(file).with_context(|| format!("Failed to parse multiple-choice dataset {}", path.display()))
}

/// Parse a multiple-choice CSV with header `id,question,A,B,C,D,answer,category`.
///
/// A `D.` header is read as `D` and the answer is cut to its first character.
pub fn parse_multiple_choice<R: Read>(reader: R) -> Result<Vec<MultipleChoiceQuestion>> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(reader);

    let headers = normalize_headers(reader.headers().context("Failed to read CSV header")?);
    for column in MULTIPLE_CHOICE_COLUMNS.iter().take(6) {
        if !headers.iter().any(|h| h == *column) {
            return Err(anyhow!("CSV header is missing the '{}' column", column));
        }
    }

    let mut questions = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", row + 1))?;
        let mut question: MultipleChoiceQuestion = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Invalid multiple-choice row {}", row + 1))?;
        question.answer = first_char(&question.answer);
        questions.push(question);
    }

    debug!("Loaded {} multiple-choice questions", questions.len());
    Ok(questions)
}

fn normalize_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|h| match h.trim() {
            "D." => "D",
            other => other,
        })
        .collect()
}

fn first_char(answer: &str) -> String {
    answer.trim().chars().next().map(String::from).unwrap_or_default()
}
