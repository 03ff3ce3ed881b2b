//! Storage keys for cache entries.

use sha2::{Digest, Sha256};

/// Compute the storage key for a cached request.
///
/// The digest covers the method and the absolute URL, so a `HEAD` and a
/// `GET` for the same resource never collide.
pub fn compute_entry_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
