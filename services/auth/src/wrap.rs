//! Reversible keyed wrapping applied around signed tokens
//!
//! Tokens leave the service as `base64url(inner) + "." + base64url(tag)`
//! where the tag is an HMAC-SHA256 over the encoded payload. The wrapper
//! hides the shape of the inner token from casual inspection; it is a
//! secondary layer, authenticity still comes from the token signature
//! underneath.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Raised when a wrapped token cannot be reversed
#[derive(Debug, Error)]
#[error("malformed wrapped token")]
pub struct WrapError;

/// Keyed token wrapper
///
/// The MAC key is derived once from the configured secret and salt.
#[derive(Clone)]
pub struct TokenWrapper {
    key: [u8; 32],
}

impl TokenWrapper {
    pub fn new(secret: &str, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(secret.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }

    /// Wrap a signed token for transport
    pub fn wrap(&self, token: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(token.as_bytes());
        let tag = self.tag(payload.as_bytes());
        format!("{payload}.{tag}")
    }

    /// Reverse a wrapped token, checking the tag in constant time
    pub fn unwrap(&self, wrapped: &str) -> Result<String, WrapError> {
        // The base64url payload contains no '.', so the first dot is
        // the payload/tag boundary.
        let (payload, tag) = wrapped.split_once('.').ok_or(WrapError)?;

        let expected = self.tag(payload.as_bytes());
        let matches: bool = expected.as_bytes().ct_eq(tag.as_bytes()).into();
        if !matches {
            return Err(WrapError);
        }

        let inner = URL_SAFE_NO_PAD.decode(payload).map_err(|_| WrapError)?;
        String::from_utf8(inner).map_err(|_| WrapError)
    }

    fn tag(&self, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload);
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper() -> TokenWrapper {
        TokenWrapper::new("wrapper-secret", "wrapper-salt")
    }

    #[test]
    fn wrap_roundtrip() {
        let w = wrapper();
        let inner = "header.payload.signature";
        let wrapped = w.wrap(inner);
        assert_ne!(wrapped, inner);
        assert_eq!(w.unwrap(&wrapped).unwrap(), inner);
    }

    #[test]
    fn wrapped_form_hides_inner_shape() {
        let w = wrapper();
        let wrapped = w.wrap("eyJhbGci.eyJzdWIi.c2ln");
        // One payload/tag separator only; inner dots are encoded away.
        assert_eq!(wrapped.matches('.').count(), 1);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let w = wrapper();
        let wrapped = w.wrap("some-token");
        let mut chars: Vec<char> = wrapped.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(w.unwrap(&tampered).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let wrapped = wrapper().wrap("some-token");
        let other = TokenWrapper::new("different-secret", "wrapper-salt");
        assert!(other.unwrap(&wrapped).is_err());
    }

    #[test]
    fn missing_separator_is_rejected() {
        assert!(wrapper().unwrap("noseparatorhere").is_err());
    }
}
