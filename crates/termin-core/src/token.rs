//! Single-use confirmation tokens.
//!
//! Every tentative appointment carries one token; presenting it is the only
//! way to confirm or reject the appointment. Tokens are bearer credentials,
//! so issuance uses the OS CSPRNG and comparison runs in constant time.

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Number of random bytes per token (256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// A single-use confirmation token.
///
/// Stored as lowercase hex (64 ASCII characters). The token is shown to the
/// customer exactly once, when the appointment is created, and invalidated
/// the moment the appointment leaves its tentative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmToken(String);

impl ConfirmToken {
    /// Issues a fresh token from the OS CSPRNG.
    ///
    /// An entropy source failure is unrecoverable and aborts the process;
    /// there is no degraded mode that would hand out predictable tokens.
    pub fn issue() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Returns the hex form of the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares a candidate against this token in constant time.
    ///
    /// The comparison touches every byte regardless of where a mismatch
    /// occurs, so response timing reveals nothing about the stored value.
    /// Length is checked first; candidate length is not a secret.
    pub fn verify(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_is_64_hex_chars() {
        let token = ConfirmToken::issue();
        assert_eq!(token.as_str().len(), 64);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn issued_tokens_differ() {
        let a = ConfirmToken::issue();
        let b = ConfirmToken::issue();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn verify_accepts_exact_match() {
        let token = ConfirmToken::issue();
        let copy = token.as_str().to_string();
        assert!(token.verify(&copy));
    }

    #[test]
    fn verify_rejects_mismatch() {
        let token = ConfirmToken::issue();
        let mut tampered = token.as_str().to_string();
        // Flip the last character to a different hex digit.
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(!token.verify(&tampered));
    }

    #[test]
    fn verify_rejects_wrong_length() {
        let token = ConfirmToken::issue();
        assert!(!token.verify(""));
        assert!(!token.verify(&token.as_str()[..32]));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn serde_is_transparent() {
        let token = ConfirmToken::issue();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", token.as_str()));
        let parsed: ConfirmToken = serde_json::from_str(&json).unwrap();
        assert_eq!(token, parsed);
    }
}
