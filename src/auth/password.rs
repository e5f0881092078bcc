//! Argon2id credential hashing for farmer accounts.
//!
//! Login must cost the same whether or not the email is registered and must
//! fail the same way when a stored hash is unreadable, so verification never
//! returns an error.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::{error, warn};

lazy_static! {
    // Burned on unknown-email logins so they pay the same argon2 cost.
    static ref DECOY_HASH: Option<String> = hash_password("cropdoc-decoy-credential").ok();
}

/// PHC-format argon2id hash with a fresh salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow::anyhow!("password hashing failed: {e}")
        })
}

/// True only when `stored` parses and matches. A corrupt stored hash is
/// logged and treated as a mismatch.
pub fn password_matches(plain: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

/// Runs a verification against a throwaway hash and discards the result.
pub fn burn_verification(plain: &str) {
    if let Some(decoy) = DECOY_HASH.as_deref() {
        let _ = password_matches(plain, decoy);
    }
}
