use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.as_os_str().is_empty() && !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @generates: Output path for a translated dataset
    // @params: input_file, output_dir, target_language, extension
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        target_language: &str,
        extension: &str,
    ) -> PathBuf {
        let input_file = input_file.as_ref();
        let output_dir = output_dir.as_ref();

        let stem = input_file.file_stem().unwrap_or_default();

        // <stem>.<lang>.<ext>
        let mut output_filename = stem.to_string_lossy().to_string();
        output_filename.push('.');
        output_filename.push_str(target_language);
        output_filename.push('.');
        output_filename.push_str(extension);

        output_dir.join(output_filename)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, replacing it atomically.
    ///
    /// The content is staged in a temporary file next to the target and
    /// renamed over it, so readers see either the old or the new file.
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Self::ensure_dir(parent)?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        staged
            .write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to file: {:?}", path))?;
        staged
            .persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write to file: {:?}", path))?;

        Ok(())
    }

    /// Append content to a log file with timestamp
    pub fn append_to_log_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path.as_ref()))?;

        writeln!(file, "[{}] {}", timestamp, content)
            .with_context(|| format!("Failed to write to log file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Detect the dataset format from the file extension
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> FileType {
        match path
            .as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("json") => FileType::Json,
            Some("csv") => FileType::Csv,
            _ => FileType::Unknown,
        }
    }
}

/// Dataset file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// JSON array of records
    Json,
    /// CSV with a header row
    Csv,
    Unknown,
}
