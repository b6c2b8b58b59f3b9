//! Calendar access token entity module
//!
//! Tokens grant read-only access to a person's (or org's) ICS feed.
//! Only the SHA-256 digest is ever persisted; the plaintext token is
//! returned to the caller once, at issue or rotation time, and never
//! again.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::PersonId;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarToken {
    pub person_id: PersonId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl CalendarToken {
    /// Generates a fresh random token, returning the entity to persist
    /// (hash only) alongside the plaintext to hand back to the caller.
    pub fn issue(person_id: PersonId, at: DateTime<Utc>) -> (Self, String) {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        let entity = Self {
            person_id,
            token_hash: hash_token(&plaintext),
            created_at: at,
        };
        (entity, plaintext)
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.token_hash == hash_token(candidate)
    }

    /// Same comparison as `matches`, against a bare hash rather than a full
    /// `CalendarToken` — used to check a retired token's hash without
    /// reconstructing an entity for it.
    pub fn hash_matches(hash: &str, candidate: &str) -> bool {
        hash == hash_token(candidate)
    }
}

/// Outcome of resolving a presented plaintext token.
///
/// `Retired` is returned exactly once per rotation: the store flips the
/// retired token's consumed flag the first time it matches, so a second
/// presentation of the same stale token falls through to `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenResolution {
    Active(PersonId),
    Retired(PersonId),
}

fn hash_token(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_matches_its_own_plaintext() {
        let (token, plaintext) = CalendarToken::issue(PersonId::new(), Utc::now());
        assert!(token.matches(&plaintext));
    }

    #[test]
    fn wrong_plaintext_does_not_match() {
        let (token, _) = CalendarToken::issue(PersonId::new(), Utc::now());
        assert!(!token.matches("not-the-token"));
    }

    #[test]
    fn hash_never_stores_plaintext_verbatim() {
        let (token, plaintext) = CalendarToken::issue(PersonId::new(), Utc::now());
        assert_ne!(token.token_hash, plaintext);
    }
}
