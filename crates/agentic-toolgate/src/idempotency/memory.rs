//! In-memory idempotency store.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{GateError, Result};
use crate::time::duration_micros;

use super::{IdempotencyRecord, IdempotencyStore, Reservation};

type SlotKey = (String, String);

enum Slot {
    InFlight,
    Done(IdempotencyRecord),
}

/// Mutex-guarded map of (key, tool) slots.
///
/// Waiters for an in-flight key park on a condition variable and are
/// woken by `complete` or `release`.
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    slots: Mutex<HashMap<SlotKey, Slot>>,
    changed: Condvar,
}

impl MemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots held, in flight or done (expired included until swept).
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SlotKey, Slot>>> {
        self.slots
            .lock()
            .map_err(|_| GateError::StorageError("idempotency store lock poisoned".into()))
    }

    fn record(
        key: &str,
        tool_name: &str,
        fingerprint: &str,
        result: Value,
        ttl: Duration,
        now: u64,
    ) -> IdempotencyRecord {
        IdempotencyRecord {
            key: key.to_string(),
            tool_name: tool_name.to_string(),
            fingerprint: fingerprint.to_string(),
            result,
            created_at: now,
            expires_at: now.saturating_add(duration_micros(ttl)),
        }
    }
}

fn slot_key(key: &str, tool_name: &str) -> SlotKey {
    (key.to_string(), tool_name.to_string())
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn get(&self, key: &str, tool_name: &str, now: u64) -> Result<Option<IdempotencyRecord>> {
        let slots = self.lock()?;
        Ok(match slots.get(&slot_key(key, tool_name)) {
            Some(Slot::Done(record)) if !record.is_expired(now) => Some(record.clone()),
            _ => None,
        })
    }

    fn put(
        &self,
        key: &str,
        tool_name: &str,
        fingerprint: &str,
        result: Value,
        ttl: Duration,
        now: u64,
    ) -> Result<IdempotencyRecord> {
        let mut slots = self.lock()?;
        let k = slot_key(key, tool_name);
        match slots.get(&k) {
            Some(Slot::InFlight) => {
                return Err(GateError::Conflict(format!(
                    "idempotency key for {tool_name} is reserved by a running call"
                )));
            }
            Some(Slot::Done(existing)) if !existing.is_expired(now) => {
                return Err(GateError::Conflict(format!(
                    "idempotency key for {tool_name} already has a stored result"
                )));
            }
            _ => {}
        }
        let record = Self::record(key, tool_name, fingerprint, result, ttl, now);
        slots.insert(k, Slot::Done(record.clone()));
        Ok(record)
    }

    fn reserve(&self, key: &str, tool_name: &str, wait: Duration, now: u64) -> Result<Reservation> {
        let k = slot_key(key, tool_name);
        let started = Instant::now();
        let deadline = started + wait;
        let mut slots = self.lock()?;

        loop {
            // A record can expire while we wait on the holder.
            let now = now.saturating_add(duration_micros(started.elapsed()));
            match slots.get(&k) {
                None => {
                    slots.insert(k, Slot::InFlight);
                    return Ok(Reservation::Acquired);
                }
                Some(Slot::Done(record)) if !record.is_expired(now) => {
                    return Ok(Reservation::Completed(record.clone()));
                }
                Some(Slot::Done(_)) => {
                    // expired: behaves as a miss
                    slots.insert(k, Slot::InFlight);
                    return Ok(Reservation::Acquired);
                }
                Some(Slot::InFlight) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(Reservation::InFlight);
                    }
                    let (guard, _) = self
                        .changed
                        .wait_timeout(slots, remaining)
                        .map_err(|_| {
                            GateError::StorageError("idempotency store lock poisoned".into())
                        })?;
                    slots = guard;
                }
            }
        }
    }

    fn complete(
        &self,
        key: &str,
        tool_name: &str,
        fingerprint: &str,
        result: Value,
        ttl: Duration,
        now: u64,
    ) -> Result<IdempotencyRecord> {
        let record = Self::record(key, tool_name, fingerprint, result, ttl, now);
        {
            let mut slots = self.lock()?;
            slots.insert(slot_key(key, tool_name), Slot::Done(record.clone()));
        }
        self.changed.notify_all();
        Ok(record)
    }

    fn release(&self, key: &str, tool_name: &str) -> Result<()> {
        {
            let mut slots = self.lock()?;
            let k = slot_key(key, tool_name);
            if matches!(slots.get(&k), Some(Slot::InFlight)) {
                slots.remove(&k);
            }
        }
        self.changed.notify_all();
        Ok(())
    }

    fn sweep_expired(&self, now: u64) -> Result<usize> {
        let mut slots = self.lock()?;
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Done(record) => !record.is_expired(now),
            Slot::InFlight => true,
        });
        Ok(before - slots.len())
    }
}
