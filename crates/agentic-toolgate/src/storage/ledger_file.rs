//! Confirmation ledger persistence.
//!
//! The whole ledger lives in one JSON file:
//!
//! ```json
//! { "version": 1, "ledger": { "tokens": [ ... ], "approvals": [ ... ] } }
//! ```
//!
//! The file is shared between processes (the operator CLI and any number of
//! gateways), so it is never written from a cached copy. Every change takes
//! an exclusive lock on a sibling `.lock` file, re-reads the current
//! contents, applies the change and writes the result before the lock is
//! released. Readers take the same lock shared.
//!
//! Writes go to a sibling temp file, are synced, and are renamed into
//! place, so a crash mid-write leaves the previous ledger intact and a
//! change that returned `Ok` is on disk.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::confirmation::LedgerSnapshot;
use crate::error::{GateError, Result};

// ── File format constants ─────────────────────────────────────────────────────

const LEDGER_FILE_VERSION: u32 = 1;

// ── On-disk structure ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFileContents {
    version: u32,
    ledger: LedgerSnapshot,
}

// ── LedgerFile ────────────────────────────────────────────────────────────────

/// Locked, file-backed storage for confirmation ledger contents.
///
/// Use it through `ConfirmationLedger::open`, which routes every operation
/// through `load_snapshot` and `update`.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Read the current contents under a shared lock. A missing file is an
    /// empty ledger.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidFileFormat` for malformed files or an
    /// unsupported version, `GateError::StorageError` if the lock cannot be
    /// taken, or `GateError::Io` for filesystem errors.
    pub fn load_snapshot(&self) -> Result<LedgerSnapshot> {
        if !self.path.exists() {
            return Ok(LedgerSnapshot::default());
        }
        let lock_file = self.open_lock()?;
        FileExt::lock_shared(&lock_file).map_err(|e| self.lock_error(e))?;
        let snapshot = self.read_unlocked();
        drop(lock_file);
        snapshot
    }

    /// Apply `operation` to the current contents under an exclusive lock.
    ///
    /// The contents are re-read after the lock is taken, so changes made by
    /// other processes are never overwritten. The result is written only
    /// when `operation` succeeds; on error the file is left as it was.
    ///
    /// # Errors
    ///
    /// Whatever `operation` returns, plus the errors of `load_snapshot` and
    /// `GateError::SerializationError` if the result cannot be encoded.
    pub fn update<T>(
        &self,
        operation: impl FnOnce(&mut LedgerSnapshot) -> Result<T>,
    ) -> Result<T> {
        let lock_file = self.open_lock()?;
        FileExt::lock_exclusive(&lock_file).map_err(|e| self.lock_error(e))?;
        let mut snapshot = self.read_unlocked()?;
        let result = operation(&mut snapshot)?;
        self.write_unlocked(&snapshot)?;
        drop(lock_file);
        Ok(result)
    }

    // ── Internal ──────────────────────────────────────────────────────────────

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?)
    }

    fn lock_error(&self, err: std::io::Error) -> GateError {
        GateError::StorageError(format!(
            "failed to lock {}: {err}",
            self.lock_path().display()
        ))
    }

    fn read_unlocked(&self) -> Result<LedgerSnapshot> {
        if !self.path.exists() {
            return Ok(LedgerSnapshot::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let file: LedgerFileContents = serde_json::from_str(&data).map_err(|e| {
            GateError::InvalidFileFormat(format!("{}: {e}", self.path.display()))
        })?;
        if file.version != LEDGER_FILE_VERSION {
            return Err(GateError::InvalidFileFormat(format!(
                "{}: unsupported ledger version {}",
                self.path.display(),
                file.version
            )));
        }
        Ok(file.ledger)
    }

    fn write_unlocked(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let file = LedgerFileContents {
            version: LEDGER_FILE_VERSION,
            ledger: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| GateError::SerializationError(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut out = File::create(&tmp)?;
        out.write_all(json.as_bytes())?;
        out.sync_all()?;
        drop(out);
        std::fs::rename(&tmp, &self.path)?;
        log::debug!("wrote confirmation ledger to {}", self.path.display());
        Ok(())
    }
}
