//! Deterministic pseudo-random choices for the offline backend.
//!
//! Every value is derived from a SHA-256 digest of the inputs, so identical
//! (model, payload, purpose) triples always reproduce the same output.

use sha2::{Digest, Sha256};

/// A value in [0, 1) derived from `parts`.
pub fn seed_unit(parts: &[&str]) -> f64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes) as f64 / 2f64.powi(64)
}

/// A value in [low, high).
pub fn seed_range(parts: &[&str], low: f64, high: f64) -> f64 {
    low + seed_unit(parts) * (high - low)
}

/// An index in `0..len`; 0 for an empty range.
pub fn seed_index(parts: &[&str], len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ((seed_unit(parts) * len as f64) as usize).min(len - 1)
}
