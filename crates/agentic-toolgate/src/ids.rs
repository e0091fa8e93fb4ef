//! Random identifiers and digests.
//!
//! Uses the operating system's cryptographic random source via `rand`.
//! Identifiers follow the `{prefix}_{base58}` convention (`atok_…`,
//! `aapr_…`).

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Generate an opaque identifier: `{prefix}_` followed by 16 random bytes in base58.
pub fn new_id(prefix: &str) -> String {
    let bytes: [u8; 16] = random_bytes();
    format!("{prefix}_{}", bs58::encode(bytes).into_string())
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// First 16 hex characters of the SHA-256 of `data`.
///
/// Enough to correlate audit entries without revealing the input.
pub fn short_hash(data: &[u8]) -> String {
    let mut full = sha256_hex(data);
    full.truncate(16);
    full
}
