//! Salted credential hashing for login secrets.
//!
//! Secrets are never stored or compared in plaintext: a random 16-byte
//! salt is drawn at derivation time and the stored value is
//! `blake3(salt || secret)`. Verification re-derives the hash from the
//! stored salt and compares the 32-byte digests.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random salt bytes drawn per credential.
const SALT_LEN: usize = 16;

/// A salted hash of a login secret, stored on the [`crate::models::User`]
/// record in place of the secret itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Hex-encoded random salt.
    pub salt: String,
    /// Hex-encoded `blake3(salt || secret)` digest.
    pub hash: String,
}

impl Credential {
    /// Derive a credential for `secret` with a fresh random salt.
    pub fn derive(secret: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::derive_with_salt(secret, &salt)
    }

    /// Derive a credential from an explicit salt. Exposed for seeding
    /// deterministic fixtures.
    pub fn derive_with_salt(secret: &str, salt: &[u8]) -> Self {
        Self {
            salt: hex::encode(salt),
            hash: hex::encode(hash_with_salt(secret, salt)),
        }
    }

    /// Check `secret` against the stored salt and digest.
    ///
    /// A credential with an undecodable salt never verifies.
    pub fn verify(&self, secret: &str) -> bool {
        let Ok(salt) = hex::decode(&self.salt) else {
            return false;
        };
        hex::encode(hash_with_salt(secret, &salt)) == self.hash
    }
}

fn hash_with_salt(secret: &str, salt: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    *hasher.finalize().as_bytes()
}
