// src/hash.rs

//! Content digests for pass manifests
//!
//! The pass format fixes the manifest digest to SHA-1: every entry in
//! `manifest.json` is the lowercase hex SHA-1 of the entry payload, and both
//! signature variants sign the SHA-1 of the manifest bytes. Nothing
//! else in the crate is allowed to pick a different algorithm, so there is
//! no algorithm parameter here.

use sha1::{Digest as _, Sha1};
use std::fmt;

/// Name of the manifest digest algorithm
pub const DIGEST_ALGORITHM: &str = "sha1";

/// Length of a raw digest in bytes
pub const DIGEST_LEN: usize = 20;

/// Compute the raw digest of a byte slice
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha1::digest(data).into()
}

/// Compute the lowercase hex digest of a byte slice
///
/// # Example
/// ```
/// use walletpass::hash::digest_hex;
///
/// assert_eq!(digest_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
/// ```
pub fn digest_hex(data: &[u8]) -> String {
    hex::encode(digest(data))
}

/// Verification result error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatch: expected {}, got {}",
            DIGEST_ALGORITHM, self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Verify bytes match an expected hex digest (case-insensitive)
pub fn verify_bytes(data: &[u8], expected: &str) -> Result<(), VerifyError> {
    let actual = digest_hex(data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(VerifyError {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(digest_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(
            digest_hex(b"The quick brown fox jumps over the lazy dog"),
            "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(digest(b"logo"), digest(b"logo"));
        assert_ne!(digest(b"logo"), digest(b"icon"));
    }

    #[test]
    fn test_verify_bytes() {
        let expected = "A9993E364706816ABA3E25717850C26C9CD0D89D";
        assert!(verify_bytes(b"abc", expected).is_ok());

        let err = verify_bytes(b"abd", expected).unwrap_err();
        assert_eq!(err.expected, expected);
        assert!(err.to_string().starts_with("sha1 mismatch"));
    }
}
