//! Middleware for bearer access-token validation

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::AuthError;
use crate::routes::AppState;

/// Validate the bearer token and expose its claims to handlers
///
/// On success the decoded [`crate::token::AccessClaims`] are inserted
/// into request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = state.service.authenticate(bearer.token())?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
