//! Content identifiers via `ring::digest`.

use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY, SHA256};

/// Compute SHA-256 of raw bytes.
///
/// Returns lowercase hex-encoded digest.
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}

/// Compute SHA-1 of raw bytes.
///
/// Only used as a lookup key for engines and feeds that still index by SHA-1.
#[must_use]
pub fn sha1_bytes(data: &[u8]) -> String {
    hex::encode(digest(&SHA1_FOR_LEGACY_USE_ONLY, data).as_ref())
}
