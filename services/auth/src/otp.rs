//! One-time verification codes for 2FA and password reset
//!
//! Each call derives a 6-digit code from a fresh random secret on a
//! 30-second step, so consecutive calls do not collide in practice.
//! Expiry is not enforced here: the session layer tracks its own
//! expiry timestamp next to the stored code.

use anyhow::Result;
use totp_rs::{Algorithm, Secret, TOTP};

/// Code length in digits
pub const CODE_DIGITS: usize = 6;

/// Time step in seconds
pub const CODE_STEP: u64 = 30;

/// Generate a fresh 6-digit numeric code
pub fn generate() -> Result<String> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret
        .to_bytes()
        .map_err(|e| anyhow::anyhow!("Failed to derive code secret: {:?}", e))?;

    let totp = TOTP::new(Algorithm::SHA1, CODE_DIGITS, 1, CODE_STEP, secret_bytes)
        .map_err(|e| anyhow::anyhow!("Failed to initialize code generator: {}", e))?;

    let code = totp
        .generate_current()
        .map_err(|e| anyhow::anyhow!("Failed to generate code: {}", e))?;

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_six_digits() {
        let code = generate().unwrap();
        assert_eq!(code.len(), CODE_DIGITS);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn codes_come_from_fresh_secrets() {
        // With independent random secrets, eight identical codes in a
        // row is astronomically unlikely.
        let codes: Vec<String> = (0..8).map(|_| generate().unwrap()).collect();
        let first = &codes[0];
        assert!(codes.iter().any(|c| c != first));
    }
}
