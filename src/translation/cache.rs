/*!
 * Durable progress store for translated records.
 *
 * Records are keyed by `(namespace, dataset index)`. A record is written at
 * most once; later writes for the same key are ignored. The store is the
 * resume mechanism: an index present in the store is never sent to the
 * oracle again.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

/// Result of a write-once store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was persisted
    Written,
    /// A record already existed for the key; nothing was changed
    AlreadyPresent,
}

/// Persistent map from `(namespace, index)` to a translated record
pub trait ProgressStore: Send + Sync + Debug {
    /// Whether a record exists for the key
    fn exists(&self, namespace: &str, index: usize) -> Result<bool>;

    /// Persist a record unless one already exists.
    ///
    /// A reader never observes a partially written record.
    fn write(&self, namespace: &str, index: usize, record: &Value) -> Result<WriteOutcome>;

    /// Read a record back
    fn read(&self, namespace: &str, index: usize) -> Result<Option<Value>>;

    /// Every stored index of a namespace, ascending
    fn indices(&self, namespace: &str) -> Result<BTreeSet<usize>>;

    /// Remove a record so its item is translated again on the next run.
    ///
    /// Returns whether a record was removed.
    fn invalidate(&self, namespace: &str, index: usize) -> Result<bool>;
}

/// Serialize and write a typed record
pub fn write_record<T: Serialize>(
    store: &dyn ProgressStore,
    namespace: &str,
    index: usize,
    record: &T,
) -> Result<WriteOutcome> {
    let value = serde_json::to_value(record).context("Failed to serialize record")?;
    store.write(namespace, index, &value)
}

/// Read and deserialize a typed record
pub fn read_record<T: DeserializeOwned>(
    store: &dyn ProgressStore,
    namespace: &str,
    index: usize,
) -> Result<Option<T>> {
    match store.read(namespace, index)? {
        Some(value) => {
            let record = serde_json::from_value(value)
                .with_context(|| format!("Stored record {}/{} has an unexpected shape", namespace, index))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

const STAGED_PREFIX: &str = ".staged-";
const STAGED_SUFFIX: &str = ".tmp";

/// One JSON file per record under `<root>/<namespace>/<index>.json`
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    /// Create a store rooted at `root`; directories are created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root if needed and remove staged files left behind by an interrupted write
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        FileManager::ensure_dir(&store.root)
            .with_context(|| format!("Failed to create cache directory {:?}", store.root))?;

        let removed = store.remove_staged_files()?;
        if removed > 0 {
            warn!("Removed {} unfinished staged records under {:?}", removed, store.root);
        }
        Ok(store)
    }

    fn remove_staged_files(&self) -> Result<usize> {
        let mut removed = 0;
        for namespace in std::fs::read_dir(&self.root).with_context(|| format!("Failed to list {:?}", self.root))? {
            let namespace = namespace?;
            if !namespace.file_type()?.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(namespace.path())? {
                let path = entry?.path();
                let staged = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(STAGED_PREFIX) && n.ends_with(STAGED_SUFFIX));
                if !staged {
                    continue;
                }

                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e).with_context(|| format!("Failed to remove staged file {:?}", path)),
                }
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    /// Path of the record file for a key
    pub fn record_path(&self, namespace: &str, index: usize) -> PathBuf {
        self.namespace_dir(namespace).join(format!("{}.json", index))
    }
}

impl ProgressStore for FileProgressStore {
    fn exists(&self, namespace: &str, index: usize) -> Result<bool> {
        Ok(FileManager::file_exists(self.record_path(namespace, index)))
    }

    fn write(&self, namespace: &str, index: usize, record: &Value) -> Result<WriteOutcome> {
        let path = self.record_path(namespace, index);
        if FileManager::file_exists(&path) {
            debug!("Record {}/{} already stored, keeping the first one", namespace, index);
            return Ok(WriteOutcome::AlreadyPresent);
        }

        let dir = self.namespace_dir(namespace);
        FileManager::ensure_dir(&dir)?;

        let body = serde_json::to_vec_pretty(record).context("Failed to serialize record")?;

        // Stage in the target directory so the final rename stays on one filesystem
        let mut staged = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(STAGED_SUFFIX)
            .tempfile_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;
        staged.write_all(&body)?;
        staged.as_file().sync_all()?;

        match staged.persist_noclobber(&path) {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("Record {}/{} was stored concurrently, keeping the first one", namespace, index);
                Ok(WriteOutcome::AlreadyPresent)
            }
            Err(e) => Err(e.error).with_context(|| format!("Failed to persist record to {:?}", path)),
        }
    }

    fn read(&self, namespace: &str, index: usize) -> Result<Option<Value>> {
        let path = self.record_path(namespace, index);
        if !FileManager::file_exists(&path) {
            return Ok(None);
        }

        let content = FileManager::read_to_string(&path)?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Stored record {:?} is not valid JSON", path))?;
        Ok(Some(value))
    }

    fn indices(&self, namespace: &str) -> Result<BTreeSet<usize>> {
        let dir = self.namespace_dir(namespace);
        let mut indices = BTreeSet::new();
        if !FileManager::dir_exists(&dir) {
            return Ok(indices);
        }

        for entry in std::fs::read_dir(&dir).with_context(|| format!("Failed to list {:?}", dir))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match path.file_stem().and_then(|s| s.to_str()).map(str::parse::<usize>) {
                Some(Ok(index)) => {
                    indices.insert(index);
                }
                _ => warn!("Ignoring unexpected file in progress store: {:?}", path),
            }
        }

        Ok(indices)
    }

    fn invalidate(&self, namespace: &str, index: usize) -> Result<bool> {
        let path = self.record_path(namespace, index);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", path)),
        }
    }
}
