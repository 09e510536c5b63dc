//! SHA-256 checksum utility for script change detection.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 checksum of a string, rendered as uppercase hex.
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let result = hasher.finalize();
    format!("{:X}", result)
}
