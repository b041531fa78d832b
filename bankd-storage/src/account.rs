//! Account records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque account identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cardholder account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Card number, used as the login name.
    pub card_number: String,
    /// PIN secret, either plain digits or `sha256:<hex>`.
    pub pin: String,
    /// Balance in the smallest currency unit.
    pub balance: i64,
}

// Credentials stay out of logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("card_number", &mask_card_number(&self.card_number))
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

/// A single-use withdrawal authorization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    pub owner: AccountId,
    pub code: String,
}

impl fmt::Debug for OneTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneTimeCode")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Prefix marking a hashed PIN secret.
pub const PIN_HASH_PREFIX: &str = "sha256:";

/// Hashes a PIN using SHA-256, returning a lowercase hex string.
pub fn hash_pin(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the stored `sha256:<hex>` secret for `pin`.
pub fn hashed_pin_secret(pin: &str) -> String {
    format!("{}{}", PIN_HASH_PREFIX, hash_pin(pin))
}

/// Masks all but the last four characters of a card number.
pub fn mask_card_number(card_number: &str) -> String {
    let chars: Vec<char> = card_number.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let mut masked = "*".repeat(hidden);
    masked.extend(&chars[hidden..]);
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pin() {
        let hash = hash_pin("4242");
        // SHA-256 produces 64 hex characters
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_pin("4242"));
        assert_ne!(hash, hash_pin("4243"));
    }

    #[test]
    fn test_hashed_pin_secret() {
        let secret = hashed_pin_secret("4242");
        assert_eq!(secret, format!("sha256:{}", hash_pin("4242")));
    }

    #[test]
    fn test_mask_card_number() {
        assert_eq!(mask_card_number("1111222233334444"), "************4444");
        assert_eq!(mask_card_number("123"), "123");
        assert_eq!(mask_card_number(""), "");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let account = Account {
            id: AccountId(7),
            card_number: "1111222233334444".to_string(),
            pin: "4242".to_string(),
            balance: 1000,
        };
        let debug = format!("{:?}", account);
        assert!(!debug.contains("4242"));
        assert!(!debug.contains("11112222"));
        assert!(debug.contains("4444"));

        let code = OneTimeCode {
            owner: AccountId(7),
            code: "9999".to_string(),
        };
        assert!(!format!("{:?}", code).contains("9999"));
    }

    #[test]
    fn test_account_id_serde_transparent() {
        assert_eq!(serde_json::to_string(&AccountId(42)).unwrap(), "42");
    }
}
