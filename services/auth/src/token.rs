//! Signed claims tokens for access and refresh
//!
//! Two composed layers: an HS256 signing layer with a distinct symmetric
//! key per token kind, and the keyed wrapping layer from [`crate::wrap`]
//! applied around the signed string before it leaves the service.
//! Decoding unwraps first, then verifies signature and expiry, keeping
//! the expired/invalid distinction intact for callers.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Role, User};
use crate::wrap::TokenWrapper;

/// Token decode failures
///
/// An expired-but-well-signed token is reported as `Expired`; anything
/// malformed, tampered with, or signed under the wrong key is `Invalid`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token")]
    Invalid,
}

/// Claims embedded in every access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: Uuid,
    pub is_active: bool,
    pub role: Role,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(user: &User, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id,
            is_active: user.is_active,
            role: user.role,
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

/// Claims embedded in every refresh token
///
/// `sid` binds the token to the refresh lineage recorded on the user:
/// once the stored identifier rotates, this token is stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub is_active: bool,
    pub role: Role,
    /// Session identifier
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn new(user: &User, sid: Uuid, ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id,
            is_active: user.is_active,
            role: user.role,
            sid,
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

/// Token codec: per-kind signing keys plus the wrapping layer
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    wrapper: TokenWrapper,
}

impl TokenCodec {
    pub fn new(access_secret: &str, refresh_secret: &str, wrapper: TokenWrapper) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            wrapper,
        }
    }

    /// Sign and wrap an access token
    pub fn encode_access(&self, claims: &AccessClaims) -> Result<String> {
        self.encode(claims, &self.access_encoding)
    }

    /// Sign and wrap a refresh token
    pub fn encode_refresh(&self, claims: &RefreshClaims) -> Result<String> {
        self.encode(claims, &self.refresh_encoding)
    }

    /// Unwrap and verify an access token
    pub fn decode_access(&self, wrapped: &str) -> Result<AccessClaims, TokenError> {
        self.decode(wrapped, &self.access_decoding)
    }

    /// Unwrap and verify a refresh token
    pub fn decode_refresh(&self, wrapped: &str) -> Result<RefreshClaims, TokenError> {
        self.decode(wrapped, &self.refresh_decoding)
    }

    fn encode<T: Serialize>(&self, claims: &T, key: &EncodingKey) -> Result<String> {
        let signed = jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, key)?;
        Ok(self.wrapper.wrap(&signed))
    }

    fn decode<T: DeserializeOwned>(
        &self,
        wrapped: &str,
        key: &DecodingKey,
    ) -> Result<T, TokenError> {
        let signed = self.wrapper.unwrap(wrapped).map_err(|_| TokenError::Invalid)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<T>(&signed, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(
            "access-secret",
            "refresh-secret",
            TokenWrapper::new("wrap-secret", "wrap-salt"),
        )
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            hashed_password: Some("digest".into()),
            is_active: true,
            role: Role::User,
            two_fa_enabled: false,
            two_fa_code: None,
            two_fa_code_expiry: None,
            session_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn access_roundtrip_before_expiry() {
        let codec = test_codec();
        let user = test_user();

        let token = codec.encode_access(&AccessClaims::new(&user, 900)).unwrap();
        let claims = codec.decode_access(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);
        assert!(claims.is_active);
    }

    #[test]
    fn refresh_roundtrip_carries_session_id() {
        let codec = test_codec();
        let user = test_user();
        let sid = Uuid::new_v4();

        let token = codec
            .encode_refresh(&RefreshClaims::new(&user, sid, 3600))
            .unwrap();
        let claims = codec.decode_refresh(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.sid, sid);
    }

    #[test]
    fn expired_token_is_expired_not_invalid() {
        let codec = test_codec();
        let user = test_user();

        let token = codec
            .encode_access(&AccessClaims::new(&user, -120))
            .unwrap();

        assert_eq!(codec.decode_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn access_token_never_validates_as_refresh() {
        let codec = test_codec();
        let user = test_user();

        let token = codec.encode_access(&AccessClaims::new(&user, 900)).unwrap();

        assert_eq!(
            codec.decode_refresh(&token).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn refresh_token_never_validates_as_access() {
        let codec = test_codec();
        let user = test_user();

        let token = codec
            .encode_refresh(&RefreshClaims::new(&user, Uuid::new_v4(), 3600))
            .unwrap();

        assert_eq!(codec.decode_access(&token).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn unwrapped_jwt_is_invalid() {
        let codec = test_codec();
        // A raw signed token that skipped the wrapping layer.
        let raw = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &AccessClaims::new(&test_user(), 900),
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert_eq!(codec.decode_access(&raw).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = test_codec();
        assert_eq!(
            codec.decode_access("definitely-not-a-token").unwrap_err(),
            TokenError::Invalid
        );
    }
}
