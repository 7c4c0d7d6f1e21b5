//! Domain error taxonomy for the authentication service
//!
//! Directory-level "not found" conditions never cross the service
//! boundary; the session layer remaps them before they reach a handler.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::token::TokenError;

/// Authentication failures surfaced to callers
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user with email already exists")]
    AlreadyExists,

    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("incorrect or expired verification code")]
    InvalidOrExpiredCode,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token")]
    TokenInvalid,

    #[error("refresh token no longer matches the active session")]
    StaleSession,

    #[error("incorrect old password")]
    IncorrectPassword,

    #[error("too many attempts, try again later")]
    RateLimited,

    #[error("{0}")]
    Validation(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// HTTP status class for each failure
    fn status(&self) -> StatusCode {
        match self {
            AuthError::AlreadyExists => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidOrExpiredCode => StatusCode::BAD_REQUEST,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::TokenInvalid => StatusCode::BAD_REQUEST,
            AuthError::StaleSession => StatusCode::BAD_REQUEST,
            AuthError::IncorrectPassword => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::TokenInvalid,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the logs, never in the response body.
        let message = match &self {
            AuthError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_and_invalid_tokens_map_to_distinct_statuses() {
        assert_eq!(AuthError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenInvalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::StaleSession.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn credential_failures_are_unauthorized() {
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::IncorrectPassword.status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
