//! Idempotency: at-most-once execution per caller-supplied key.
//!
//! A record maps (key, tool) to the result of the first successful
//! execution. Repeated calls with the same key replay that result
//! verbatim until it expires. Concurrent calls with the same key are
//! serialized by `reserve`: one caller wins and runs the handler, the
//! others wait for its result or give up with an in-flight status.
//!
//! Each record also keeps a fingerprint of the validated arguments, so a
//! key reused with different arguments is refused instead of replaying a
//! result that belongs to another call.

pub mod memory;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use memory::MemoryIdempotencyStore;

/// Stored result of a completed idempotent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub tool_name: String,
    /// Digest of the validated arguments of the first execution.
    #[serde(default)]
    pub fingerprint: String,
    /// Result returned by the first execution.
    pub result: Value,
    /// Microseconds since epoch.
    pub created_at: u64,
    /// Microseconds since epoch; at or after this the record is a miss.
    pub expires_at: u64,
}

impl IdempotencyRecord {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// True when the record was produced by a call with these arguments.
    pub fn matches(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}

/// Outcome of `IdempotencyStore::reserve`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// The caller holds the key and must `complete` or `release` it.
    Acquired,
    /// A live result exists; replay it.
    Completed(IdempotencyRecord),
    /// Another caller still holds the key after the wait elapsed.
    InFlight,
}

/// Storage for idempotency records.
///
/// Implementations must make `reserve` an atomic check-and-reserve per
/// (key, tool) pair.
pub trait IdempotencyStore: Send + Sync {
    /// Live record for (key, tool), if any. Expired records are misses.
    fn get(&self, key: &str, tool_name: &str, now: u64) -> Result<Option<IdempotencyRecord>>;

    /// Store a result directly, without a reservation.
    ///
    /// Fails with `Conflict` if a live record or a reservation already
    /// exists for (key, tool).
    fn put(
        &self,
        key: &str,
        tool_name: &str,
        fingerprint: &str,
        result: Value,
        ttl: Duration,
        now: u64,
    ) -> Result<IdempotencyRecord>;

    /// Claim (key, tool), waiting up to `wait` for a concurrent holder.
    ///
    /// `now` is the time of the call; after waiting, expiry is judged
    /// against `now` plus the time spent waiting.
    fn reserve(&self, key: &str, tool_name: &str, wait: Duration, now: u64) -> Result<Reservation>;

    /// Store the result for a held reservation and wake waiters.
    fn complete(
        &self,
        key: &str,
        tool_name: &str,
        fingerprint: &str,
        result: Value,
        ttl: Duration,
        now: u64,
    ) -> Result<IdempotencyRecord>;

    /// Drop a held reservation without storing anything.
    fn release(&self, key: &str, tool_name: &str) -> Result<()>;

    /// Delete expired records. Returns how many were removed.
    fn sweep_expired(&self, now: u64) -> Result<usize>;
}
