//! PIN verification.
//!
//! Stored PIN secrets are either the plain digits or `sha256:<hex>` of the
//! digits. Comparison runs over the full length of both sides so a mismatch
//! does not return early on the first differing byte.

use bankd_storage::account::{hash_pin, PIN_HASH_PREFIX};

/// Checks supplied PINs against stored secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinVerifier;

impl PinVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Returns whether `supplied` matches the stored secret.
    pub fn verify(&self, supplied: &str, stored: &str) -> bool {
        match stored.strip_prefix(PIN_HASH_PREFIX) {
            Some(hash) => constant_time_eq(
                hash_pin(supplied).as_bytes(),
                hash.to_ascii_lowercase().as_bytes(),
            ),
            None => constant_time_eq(supplied.as_bytes(), stored.as_bytes()),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().max(b.len());
    let mut diff = (a.len() != b.len()) as u8;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankd_storage::account::hashed_pin_secret;

    #[test]
    fn test_verify_plain() {
        let verifier = PinVerifier::new();
        assert!(verifier.verify("4242", "4242"));
        assert!(!verifier.verify("4243", "4242"));
        assert!(!verifier.verify("424", "4242"));
        assert!(!verifier.verify("42420", "4242"));
        assert!(!verifier.verify("", "4242"));
    }

    #[test]
    fn test_verify_hashed() {
        let verifier = PinVerifier::new();
        let stored = hashed_pin_secret("4242");
        assert!(stored.starts_with(PIN_HASH_PREFIX));
        assert!(verifier.verify("4242", &stored));
        assert!(!verifier.verify("0000", &stored));
        // The secret itself is not a valid PIN
        assert!(!verifier.verify(&stored, &stored));
    }

    #[test]
    fn test_verify_hashed_uppercase_hex() {
        let verifier = PinVerifier::new();
        let stored = format!("{}{}", PIN_HASH_PREFIX, hash_pin("1234").to_uppercase());
        assert!(verifier.verify("1234", &stored));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"", b""));
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        // Length difference of 256 must not wrap to equal
        assert!(!constant_time_eq(&[0u8; 256], b""));
    }
}
