//! JSON file repository with atomic replacement

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{CategoryResult, OutputError, OutputResult, StoresResult};

/// Writes result documents to a single JSON file.
///
/// The document is written to a temporary file in the target directory and
/// then persisted over the target, so readers never observe a partial file.
#[derive(Debug, Clone)]
pub struct JsonRepository {
    path: PathBuf,
}

impl JsonRepository {
    /// Repository writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a category result.
    pub fn save(&self, result: &CategoryResult) -> OutputResult<()> {
        self.save_value(result)?;
        info!(path = %self.path.display(), count = result.count, "JSON saved");
        Ok(())
    }

    /// Save a store scan result.
    pub fn save_stores(&self, result: &StoresResult) -> OutputResult<()> {
        self.save_value(result)?;
        info!(path = %self.path.display(), count = result.count, "Stores JSON saved");
        Ok(())
    }

    /// Pretty-print `value` with a trailing newline and atomically replace
    /// the target file. Missing parent directories are created.
    pub fn save_value<T: Serialize + ?Sized>(&self, value: &T) -> OutputResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(OutputError::EmptyPath);
        }

        let mut json = serde_json::to_vec_pretty(value)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        json.push(b'\n');

        let parent_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent_dir).map_err(|e| {
            OutputError::IoError(format!("Failed to create {}: {e}", parent_dir.display()))
        })?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&parent_dir)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(&json)
            .map_err(|e| OutputError::IoError(format!("Failed to write temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Document written");
        Ok(())
    }
}
