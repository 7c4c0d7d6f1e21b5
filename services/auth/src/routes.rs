//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::middleware::auth_middleware;
use crate::models::{Role, User};
use crate::oauth::GoogleVerifier;
use crate::repositories::PgUserDirectory;
use crate::service::{IssuedTokens, LoginOutcome, SessionService, SignupRequest};
use crate::token::AccessClaims;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: SessionService<PgUserDirectory>,
    pub verifier: GoogleVerifier,
}

/// Request for account creation
#[derive(Deserialize)]
pub struct SignupDto {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default)]
    pub two_fa_enabled: bool,
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

/// Request for code verification
#[derive(Deserialize)]
pub struct VerifyCodeDto {
    pub email: String,
    pub code: String,
}

/// Query for re-sending the verification code
#[derive(Deserialize)]
pub struct ResendCodeQuery {
    pub email: String,
}

/// OAuth2 password-form token request
#[derive(Deserialize)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

/// Request for password change (authenticated)
#[derive(Deserialize)]
pub struct ChangePasswordDto {
    pub old_password: String,
    pub new_password: String,
}

/// Request for password reset via verification code
#[derive(Deserialize)]
pub struct ResetPasswordDto {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Request for external-identity login
#[derive(Deserialize)]
pub struct GoogleTokenDto {
    pub id_token: String,
}

/// Public view of a user record
#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active,
            role: user.role,
        }
    }
}

/// Response carrying a full token pair
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserSummary,
}

impl TokenResponse {
    fn new(tokens: IssuedTokens, expires_in: i64) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            user: UserSummary::from(&tokens.user),
        }
    }
}

/// Response for access-token-only grants
#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/password/change", post(change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/verify/2fa", post(verify_code))
        .route("/auth/verify/email", get(resend_code))
        .route("/auth/token", post(password_token))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/password/reset", post(reset_password))
        .route("/auth/google/token", post(google_token))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Account creation endpoint
///
/// Never returns tokens; the caller must verify the emailed code first.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupDto>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Signup attempt");

    let user = state
        .service
        .signup(SignupRequest {
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password: payload.password,
            two_fa_enabled: payload.two_fa_enabled,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginDto>,
) -> Result<Response, AuthError> {
    info!("Login attempt");

    match state.service.login(&payload.email, &payload.password).await? {
        LoginOutcome::OtpRequired => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Verification code sent"
            })),
        )
            .into_response()),
        LoginOutcome::Tokens(tokens) => {
            let expires_in = state.service.access_token_expiry();
            Ok((StatusCode::OK, Json(TokenResponse::new(tokens, expires_in))).into_response())
        }
    }
}

/// Code verification endpoint
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeDto>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Code verification attempt");

    let tokens = state
        .service
        .verify_otp(&payload.email, &payload.code)
        .await?;

    let expires_in = state.service.access_token_expiry();
    Ok((
        StatusCode::ACCEPTED,
        Json(TokenResponse::new(tokens, expires_in)),
    ))
}

/// Re-send the verification code for an account
pub async fn resend_code(
    State(state): State<AppState>,
    Query(query): Query<ResendCodeQuery>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Verification code re-send requested");

    state.service.resend_code(&query.email).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "Verification code sent"
        })),
    ))
}

/// OAuth2 password-form token endpoint
pub async fn password_token(
    State(state): State<AppState>,
    axum::extract::Form(form): axum::extract::Form<TokenForm>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Password-form token request");

    let access_token = state
        .service
        .password_token(&form.username, &form.password)
        .await?;

    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.service.access_token_expiry(),
    }))
}

/// Token refresh endpoint
///
/// The refresh token travels in the `refresh-token` header.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    info!("Token refresh request");

    let refresh = headers
        .get("refresh-token")
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::TokenInvalid)?;

    let access_token = state.service.refresh(refresh).await?;

    Ok(Json(AccessTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.service.access_token_expiry(),
    }))
}

/// Logout endpoint (authenticated)
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<impl IntoResponse, AuthError> {
    state.service.logout(claims.sub).await?;

    Ok(Json(serde_json::json!({
        "message": "Logged out successfully"
    })))
}

/// Password change endpoint (authenticated)
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
    Json(payload): Json<ChangePasswordDto>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Password change attempt");

    state
        .service
        .change_password(claims.sub, &payload.old_password, &payload.new_password)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Password changed successfully"
    })))
}

/// Password reset endpoint (verification-code based)
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordDto>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Password reset attempt");

    state
        .service
        .reset_password(&payload.email, &payload.code, &payload.new_password)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "message": "Password reset successfully"
        })),
    ))
}

/// External-identity login endpoint
pub async fn google_token(
    State(state): State<AppState>,
    Json(payload): Json<GoogleTokenDto>,
) -> Result<impl IntoResponse, AuthError> {
    info!("External-identity login attempt");

    let identity = state.verifier.verify(&payload.id_token).await.map_err(|e| {
        warn!("External identity verification failed: {e:#}");
        AuthError::TokenInvalid
    })?;

    let tokens = state.service.external_login(identity).await?;

    let expires_in = state.service.access_token_expiry();
    Ok(Json(TokenResponse::new(tokens, expires_in)))
}
