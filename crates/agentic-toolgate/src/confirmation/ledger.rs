//! Confirmation ledger: tokens and approval requests.
//!
//! The ledger is the issuer side (`issue`, `approve`, `reject`) and the
//! gateway side (`consume_token`, `consume_approval`) of confirmation.
//! Every check-and-mark runs under one mutex, so two concurrent callers
//! can never both succeed with the same token or approval.
//!
//! A ledger opened with `ConfirmationLedger::open` is backed by a
//! `storage::LedgerFile`. Reads come from the file and every change is a
//! locked read-modify-write of it, so handles in other processes (the
//! operator CLI, other gateways) see each other's changes, and a consume
//! is on disk before it returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::ids::new_id;
use crate::storage::LedgerFile;
use crate::time::{duration_micros, now_micros};

use super::approval::{ApprovalRequest, ApprovalState};
use super::token::ConfirmationToken;

/// Serializable copy of the ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub tokens: Vec<ConfirmationToken>,
    pub approvals: Vec<ApprovalRequest>,
}

#[derive(Default)]
struct LedgerState {
    tokens: HashMap<String, ConfirmationToken>,
    approvals: HashMap<String, ApprovalRequest>,
}

impl From<LedgerSnapshot> for LedgerState {
    fn from(snapshot: LedgerSnapshot) -> Self {
        Self {
            tokens: snapshot
                .tokens
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect(),
            approvals: snapshot
                .approvals
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
        }
    }
}

impl LedgerState {
    /// Tokens and approvals each ordered by creation time.
    fn to_snapshot(&self) -> LedgerSnapshot {
        let mut tokens: Vec<_> = self.tokens.values().cloned().collect();
        tokens.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then(a.id.cmp(&b.id)));
        let mut approvals: Vec<_> = self.approvals.values().cloned().collect();
        approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        LedgerSnapshot { tokens, approvals }
    }
}

/// Store of confirmation tokens and approval requests, in memory or backed
/// by a shared file.
#[derive(Default)]
pub struct ConfirmationLedger {
    state: Mutex<LedgerState>,
    file: Option<LedgerFile>,
}

impl ConfirmationLedger {
    /// In-memory ledger, private to this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory ledger seeded from a snapshot.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            state: Mutex::new(LedgerState::from(snapshot)),
            file: None,
        }
    }

    /// Ledger backed by the file at `path`, shared with every other handle
    /// opened on the same path. A missing file starts empty.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidFileFormat` if an existing file is
    /// malformed, so a bad file is reported at startup rather than on the
    /// first confirmation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let file = LedgerFile::new(path);
        let state = LedgerState::from(file.load_snapshot()?);
        log::debug!("opened confirmation ledger at {}", file.path().display());
        Ok(Self {
            state: Mutex::new(state),
            file: Some(file),
        })
    }

    /// Path of the backing file, `None` for an in-memory ledger.
    pub fn backing_file(&self) -> Option<&Path> {
        self.file.as_ref().map(LedgerFile::path)
    }

    /// Copy the contents, tokens and approvals each ordered by creation time.
    pub fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.read(LedgerState::to_snapshot)
    }

    // ── Tokens ────────────────────────────────────────────────────────────────

    /// Issue a token for `operation` on `target`, valid for `ttl`.
    pub fn issue(&self, operation: &str, target: &str, ttl: Duration) -> Result<ConfirmationToken> {
        self.issue_at(operation, target, ttl, now_micros())
    }

    /// Issue a token as of `now` (microseconds since epoch).
    pub fn issue_at(
        &self,
        operation: &str,
        target: &str,
        ttl: Duration,
        now: u64,
    ) -> Result<ConfirmationToken> {
        let token = ConfirmationToken {
            id: new_id("atok"),
            operation: operation.to_string(),
            target: target.to_string(),
            issued_at: now,
            expires_at: now.saturating_add(duration_micros(ttl)),
            consumed: false,
            consumed_at: None,
        };
        self.mutate(|state| {
            state.tokens.insert(token.id.clone(), token.clone());
            Ok(())
        })?;
        log::info!("issued confirmation token for {operation} on {target}");
        Ok(token)
    }

    /// Atomically validate and consume a token.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Authorization` for an unknown, expired, already
    /// consumed, or differently bound token. A failed check leaves the
    /// token untouched.
    pub fn consume_token(&self, token_id: &str, operation: &str, target: &str) -> Result<ConfirmationToken> {
        self.consume_token_at(token_id, operation, target, now_micros())
    }

    pub fn consume_token_at(
        &self,
        token_id: &str,
        operation: &str,
        target: &str,
        now: u64,
    ) -> Result<ConfirmationToken> {
        self.mutate(|state| {
            let token = state
                .tokens
                .get_mut(token_id)
                .ok_or_else(|| GateError::Authorization("unknown confirmation token".into()))?;
            token.check(operation, target, now)?;
            token.consumed = true;
            token.consumed_at = Some(now);
            Ok(token.clone())
        })
    }

    pub fn token(&self, token_id: &str) -> Result<Option<ConfirmationToken>> {
        self.read(|state| state.tokens.get(token_id).cloned())
    }

    // ── Approvals ─────────────────────────────────────────────────────────────

    /// Create a pending approval request.
    pub fn create_approval(&self, operation: &str, target: &str) -> Result<ApprovalRequest> {
        let request = ApprovalRequest {
            id: new_id("aapr"),
            operation: operation.to_string(),
            target: target.to_string(),
            state: ApprovalState::Pending,
            created_at: now_micros(),
            decided_at: None,
            decided_by: None,
            note: None,
        };
        self.mutate(|state| {
            state.approvals.insert(request.id.clone(), request.clone());
            Ok(())
        })?;
        log::info!("approval requested for {operation} on {target}");
        Ok(request)
    }

    /// Move a pending request to approved.
    ///
    /// # Errors
    ///
    /// Returns `GateError::NotFound` for an unknown id and
    /// `GateError::Conflict` when the request is no longer pending.
    pub fn approve(&self, approval_id: &str, actor: Option<&str>) -> Result<ApprovalRequest> {
        self.decide(approval_id, ApprovalState::Approved, actor, None)
    }

    /// Move a pending request to rejected.
    ///
    /// # Errors
    ///
    /// Same as `approve`.
    pub fn reject(
        &self,
        approval_id: &str,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> Result<ApprovalRequest> {
        self.decide(approval_id, ApprovalState::Rejected, actor, note)
    }

    /// Atomically check an approval and mark it consumed.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Authorization` unless the request exists, is
    /// approved, and is bound to `operation` and `target`.
    pub fn consume_approval(&self, approval_id: &str, operation: &str, target: &str) -> Result<ApprovalRequest> {
        self.mutate(|state| {
            let request = state
                .approvals
                .get_mut(approval_id)
                .ok_or_else(|| GateError::Authorization("unknown approval request".into()))?;
            if request.state != ApprovalState::Approved {
                return Err(GateError::Authorization(format!(
                    "approval request is {}, not approved",
                    request.state.as_str()
                )));
            }
            if request.operation != operation || request.target != target {
                return Err(GateError::Authorization(format!(
                    "approval request is bound to a different operation or target (expected {operation} on {target})"
                )));
            }
            request.state = ApprovalState::Consumed;
            Ok(request.clone())
        })
    }

    pub fn approval(&self, approval_id: &str) -> Result<Option<ApprovalRequest>> {
        self.read(|state| state.approvals.get(approval_id).cloned())
    }

    // ── Maintenance ───────────────────────────────────────────────────────────

    /// Remove tokens past their expiry. Returns how many were removed.
    pub fn sweep_expired(&self, now: u64) -> Result<usize> {
        self.mutate(|state| {
            let before = state.tokens.len();
            state.tokens.retain(|_, t| !t.is_expired(now));
            Ok(before - state.tokens.len())
        })
    }

    fn decide(
        &self,
        approval_id: &str,
        to: ApprovalState,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> Result<ApprovalRequest> {
        let decided = self.mutate(|state| {
            let request = state
                .approvals
                .get_mut(approval_id)
                .ok_or_else(|| GateError::NotFound(format!("approval request {approval_id}")))?;
            if request.state != ApprovalState::Pending {
                return Err(GateError::Conflict(format!(
                    "approval request {approval_id} is already {}",
                    request.state.as_str()
                )));
            }
            request.state = to;
            request.decided_at = Some(now_micros());
            request.decided_by = actor.map(str::to_string);
            request.note = note.map(str::to_string);
            Ok(request.clone())
        })?;
        log::info!(
            "approval request for {} on {} {}",
            decided.operation,
            decided.target,
            to.as_str()
        );
        Ok(decided)
    }

    // ── State access ──────────────────────────────────────────────────────────

    /// Run `op` over the current contents. File-backed ledgers reload first.
    fn read<T>(&self, op: impl FnOnce(&LedgerState) -> T) -> Result<T> {
        let mut state = self.lock()?;
        if let Some(file) = &self.file {
            *state = LedgerState::from(file.load_snapshot()?);
        }
        Ok(op(&*state))
    }

    /// Run `op` over the current contents and keep its changes if it
    /// succeeds. File-backed ledgers do this under the file lock and have
    /// written the result by the time this returns.
    fn mutate<T>(&self, op: impl FnOnce(&mut LedgerState) -> Result<T>) -> Result<T> {
        let mut state = self.lock()?;
        match &self.file {
            None => op(&mut *state),
            Some(file) => file.update(|snapshot| {
                let mut current = LedgerState::from(std::mem::take(snapshot));
                let result = op(&mut current);
                *snapshot = current.to_snapshot();
                *state = current;
                result
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| GateError::StorageError("confirmation ledger lock poisoned".into()))
    }
}
