//! Append-only JSON Lines audit sink.
//!
//! Each entry is one line of JSON. The file is opened in append mode and
//! never rewritten.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{GateError, Result};

use super::entry::AuditEntry;
use super::sink::AuditSink;

/// File-backed audit sink.
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Open (or create) the log at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Io` if the file cannot be opened for append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry of a log file, in order.
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidFileFormat` naming the first bad line.
    pub fn read_all(path: &Path) -> Result<Vec<AuditEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                GateError::InvalidFileFormat(format!(
                    "{} line {}: {e}",
                    path.display(),
                    index + 1
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Sequence number and hash of the last entry, to resume the chain.
    pub fn head(path: &Path) -> Result<Option<(u64, String)>> {
        Ok(Self::read_all(path)?
            .last()
            .map(|e| (e.sequence, e.entry_hash.clone())))
    }
}

impl AuditSink for JsonlAuditSink {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| GateError::SerializationError(e.to_string()))?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| GateError::StorageError("audit file lock poisoned".into()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
