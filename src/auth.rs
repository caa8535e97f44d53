//! Credential primitives: API key / token generation, digests, and password hashing.
//!
//! Raw secrets are never stored. API keys and tokens are kept as SHA-256 hex
//! digests (the `*_sha` columns double as fast unique lookups); passwords are
//! kept as PBKDF2-HMAC-SHA256 verifiers with a per-client salt.

use pbkdf2::pbkdf2_hmac;
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

/// PBKDF2 iteration count for password verifiers.
const PBKDF2_ROUNDS: u32 = 200_000;

/// SHA-256 hex digest of a secret, used for both storage and lookup.
pub fn sha256_hex(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Generate a new API key: configured prefix + alphanumeric body.
pub fn generate_api_key(prefix: &str, length: usize) -> String {
    format!("{prefix}{}", random_alphanumeric(length))
}

/// Generate a bearer access token for automation clients.
pub fn generate_access_token() -> String {
    random_alphanumeric(40)
}

/// Generate a single-use password-reset token.
pub fn generate_reset_token() -> String {
    random_alphanumeric(32)
}

/// Generate a per-client password salt.
pub fn generate_salt() -> String {
    random_alphanumeric(16)
}

fn random_alphanumeric(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Verify a presented API key against its stored verifier digest.
pub fn verify_api_key(api_key: &str, stored_hash: &str) -> bool {
    constant_time_eq(sha256_hex(api_key).as_bytes(), stored_hash.as_bytes())
}

/// Derive the stored password verifier from a password and salt.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ROUNDS,
        &mut out,
    );
    hex::encode(out)
}

/// Verify a presented password against the stored verifier.
pub fn verify_password(password: &str, salt: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_password(password, salt).as_bytes(), stored_hash.as_bytes())
}

// Comparison must not short-circuit on the first mismatching byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_carries_prefix_and_length() {
        let key = generate_api_key("sk_", 48);
        assert!(key.starts_with("sk_"));
        assert_eq!(key.len(), "sk_".len() + 48);
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(generate_api_key("sk_", 48), generate_api_key("sk_", 48));
        assert_ne!(generate_access_token(), generate_access_token());
    }

    #[test]
    fn sha_digest_is_64_hex_chars() {
        let sha = sha256_hex("sk_example");
        assert_eq!(sha.len(), 64);
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn api_key_verifies_against_own_digest() {
        let key = generate_api_key("sk_", 48);
        let stored = sha256_hex(&key);
        assert!(verify_api_key(&key, &stored));
        assert!(!verify_api_key("sk_other", &stored));
    }

    #[test]
    fn password_roundtrip() {
        let salt = generate_salt();
        let stored = hash_password("StrongPass123", &salt);
        assert!(verify_password("StrongPass123", &salt, &stored));
        assert!(!verify_password("WrongPass123", &salt, &stored));
        // Same password under a different salt yields a different verifier
        assert_ne!(stored, hash_password("StrongPass123", &generate_salt()));
    }
}
