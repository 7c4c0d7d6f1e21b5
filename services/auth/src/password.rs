//! Password hashing and verification using Argon2id

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use anyhow::Result;

/// Hash a plaintext password with a per-call random salt
///
/// Returns the hash in PHC string format, salt embedded.
pub fn hash(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    let digest = argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(digest)
}

/// Verify a plaintext password against a stored digest
///
/// A malformed digest is reported as "no match" rather than a distinct
/// error, so callers cannot tell it apart from a wrong password.
pub fn verify(plaintext: &str, digest: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(digest) else {
        return false;
    };

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let digest = hash("hunter2").unwrap();
        assert!(verify("hunter2", &digest));
    }

    #[test]
    fn wrong_password_does_not_match() {
        let digest = hash("hunter2").unwrap();
        assert!(!verify("wrong", &digest));
    }

    #[test]
    fn salts_are_per_call() {
        let a = hash("same-password").unwrap();
        let b = hash("same-password").unwrap();
        assert_ne!(a, b);
        assert!(verify("same-password", &a));
        assert!(verify("same-password", &b));
    }

    #[test]
    fn malformed_digest_is_no_match() {
        assert!(!verify("anything", "not-a-phc-string"));
    }
}
