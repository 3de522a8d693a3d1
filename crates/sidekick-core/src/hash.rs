use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, returning lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Fingerprint of a nudge body used for de-duplication.
///
/// Leading/trailing whitespace is ignored so that a reply that only differs in
/// trailing newlines is still recognized as the same nudge.
pub fn nudge_hash(body: &str) -> String {
    sha256_hex(body.trim().as_bytes())
}
