//! Hashing utilities for deriving stable identifiers.
//!
//! This module provides:
//! - `hash_bytes()`: full 64-character SHA-256 of arbitrary bytes
//! - `short_hash()`: a truncated prefix for readable, path-safe identifiers

use sha2::{Digest, Sha256};

/// Compute the lowercase hexadecimal SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  format!("{:x}", hasher.finalize())
}

/// Compute a SHA-256 of `data` truncated to `len` hex characters.
///
/// `len` is clamped to the full digest length (64).
pub fn short_hash(data: &[u8], len: usize) -> String {
  let mut full = hash_bytes(data);
  full.truncate(len.min(full.len()));
  full
}
