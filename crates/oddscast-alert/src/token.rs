//! Unsubscribe token verification.
//!
//! A deterministic keyed hash of the recipient identifier stands in for a
//! token table: anyone presenting the correct hash for an email proved they
//! received mail at it.

use sha2::{Digest, Sha256};

/// Truncated hex length. 64 bits of a keyed hash is plenty for a
/// low-value, rate-unconstrained unsubscribe link.
const TOKEN_LEN: usize = 16;

/// Keyed unsubscribe token factory.
#[derive(Debug, Clone)]
pub struct UnsubTokens {
    secret: String,
}

impl UnsubTokens {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Token for an email: lowercase hex SHA-256 of `"<email>:<secret>"`,
    /// truncated. Email is case-folded and trimmed first so the token
    /// matches however the address was typed.
    pub fn token_for(&self, email: &str) -> String {
        let canonical = email.trim().to_lowercase();
        let digest = Sha256::digest(format!("{canonical}:{}", self.secret).as_bytes());
        let mut token = hex::encode(digest);
        token.truncate(TOKEN_LEN);
        token
    }

    /// Verify a presented token against the expected one.
    pub fn verify(&self, email: &str, token: &str) -> bool {
        self.token_for(email) == token
    }
}
