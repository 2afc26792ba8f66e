/*!
 * Aggregation of stored translations into a single dataset file.
 *
 * Export reads the progress store only; it never calls the oracle and can be
 * run at any point, including while a run is in progress.
 */

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;
use crate::translation::cache::{ProgressStore, read_record};
use crate::translation::document::{Document, InstructionPair, MultipleChoiceQuestion};

/// Outcome of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Records written with a translation
    pub translated: usize,
    /// Source indices that have no stored translation, ascending
    pub missing: Vec<usize>,
}

impl ExportSummary {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} translated records written to {}", self.translated, self.path.display())?;
        if !self.missing.is_empty() {
            write!(f, " ({} missing)", self.missing.len())?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ExportedInstruction<'a> {
    instruction: &'a str,
    input: &'a str,
    output: &'a str,
}

/// Write every stored instruction pair as one JSON array, in index order.
///
/// `source_len` is the size of the source dataset. Stored indices at or beyond
/// it are left out, and indices below it without a record are reported missing.
pub fn export_instructions(store: &dyn ProgressStore, source_len: usize, path: &Path) -> Result<ExportSummary> {
    let (indices, stale): (BTreeSet<usize>, BTreeSet<usize>) = store
        .indices(InstructionPair::NAMESPACE)?
        .into_iter()
        .partition(|&index| index < source_len);
    if !stale.is_empty() {
        warn!(
            "Skipping {} stored records outside the {}-record source: {:?}",
            stale.len(),
            source_len,
            stale
        );
    }

    let mut pairs = Vec::with_capacity(indices.len());
    for &index in &indices {
        if let Some(pair) = read_record::<InstructionPair>(store, InstructionPair::NAMESPACE, index)? {
            pairs.push(pair);
        }
    }

    let exported: Vec<ExportedInstruction<'_>> = pairs
        .iter()
        .map(|pair| ExportedInstruction {
            instruction: &pair.instruction,
            input: "",
            output: &pair.output,
        })
        .collect();

    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    exported
        .serialize(&mut serializer)
        .context("Failed to serialize instruction export")?;
    let content = String::from_utf8(buffer).context("Instruction export is not valid UTF-8")?;
    FileManager::write_to_file(path, &content)?;

    let missing: Vec<usize> = (0..source_len).filter(|i| !indices.contains(i)).collect();
    let summary = ExportSummary {
        path: path.to_path_buf(),
        translated: exported.len(),
        missing,
    };
    log_summary(&summary);
    Ok(summary)
}

/// Write the source questions as CSV with stored translations merged in by index.
///
/// Rows without a stored translation keep their source text and are reported
/// as missing.
pub fn export_multiple_choice(
    store: &dyn ProgressStore,
    source: &[MultipleChoiceQuestion],
    path: &Path,
) -> Result<ExportSummary> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut translated = 0;
    let mut missing = Vec::new();

    for (index, question) in source.iter().enumerate() {
        let row = match read_record::<MultipleChoiceQuestion>(store, MultipleChoiceQuestion::NAMESPACE, index)? {
            Some(stored) => {
                translated += 1;
                stored
            }
            None => {
                missing.push(index);
                question.clone()
            }
        };
        writer
            .serialize(&row)
            .with_context(|| format!("Failed to write CSV row for index {}", index))?;
    }

    let bytes = writer.into_inner().context("Failed to flush CSV export")?;
    let content = String::from_utf8(bytes).context("CSV export is not valid UTF-8")?;
    FileManager::write_to_file(path, &content)?;

    let summary = ExportSummary {
        path: path.to_path_buf(),
        translated,
        missing,
    };
    log_summary(&summary);
    Ok(summary)
}

fn log_summary(summary: &ExportSummary) {
    info!("{}", summary);
    if !summary.missing.is_empty() {
        warn!("Indices without a translation: {:?}", summary.missing);
    }
}
