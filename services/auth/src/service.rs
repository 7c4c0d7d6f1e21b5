//! Session lifecycle operations
//!
//! Every operation here is request-scoped; the user directory is the
//! only shared mutable state. Directory-level `NotFound` never escapes:
//! each operation remaps it to the domain failure appropriate for its
//! caller before returning.

use std::sync::Arc;

use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{NewUser, Role, UpdateUser, User};
use crate::notify::{self, Notifier};
use crate::oauth::ExternalIdentity;
use crate::otp;
use crate::password;
use crate::rate_limiter::RateLimiter;
use crate::repositories::{DirectoryError, UserDirectory};
use crate::token::{AccessClaims, RefreshClaims, TokenCodec};
use crate::validation::{normalize_email, validate_email, validate_password};

/// Signup payload after HTTP-layer deserialization
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub two_fa_enabled: bool,
}

/// Tokens minted for an authenticated session
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// What a login attempt produced
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Credentials were correct but a verification code is required
    OtpRequired,
    /// Credentials were correct and tokens were issued directly
    Tokens(IssuedTokens),
}

/// Session manager over a pluggable user directory
#[derive(Clone)]
pub struct SessionService<D: UserDirectory> {
    directory: D,
    codec: TokenCodec,
    notifier: Arc<dyn Notifier>,
    limiter: RateLimiter,
    config: AuthConfig,
}

/// Directory failures that should never happen mid-operation
fn unexpected(e: DirectoryError) -> AuthError {
    AuthError::Internal(anyhow::Error::new(e))
}

impl<D: UserDirectory> SessionService<D> {
    pub fn new(
        directory: D,
        codec: TokenCodec,
        notifier: Arc<dyn Notifier>,
        limiter: RateLimiter,
        config: AuthConfig,
    ) -> Self {
        Self {
            directory,
            codec,
            notifier,
            limiter,
            config,
        }
    }

    /// Register a new account and send its first verification code
    ///
    /// Never returns tokens; the account stays inactive until the code
    /// is verified.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AuthError> {
        validate_email(&request.email).map_err(AuthError::Validation)?;
        validate_password(&request.password).map_err(AuthError::Validation)?;

        let email = normalize_email(&request.email);

        match self.directory.get_by_email(&email).await {
            Ok(_) => return Err(AuthError::AlreadyExists),
            Err(DirectoryError::NotFound) => {}
            Err(e) => return Err(unexpected(e)),
        }

        let hashed = password::hash(&request.password)?;

        let user = self
            .directory
            .create(NewUser {
                email,
                first_name: request.first_name,
                last_name: request.last_name,
                hashed_password: Some(hashed),
                role: Role::User,
                two_fa_enabled: request.two_fa_enabled,
            })
            .await
            .map_err(|e| match e {
                // A concurrent signup for the same email loses the race
                // at the unique index, not at the lookup above.
                DirectoryError::Backend(sqlx::Error::Database(db))
                    if db.is_unique_violation() =>
                {
                    AuthError::AlreadyExists
                }
                other => unexpected(other),
            })?;

        info!("Created account {}", user.id);

        let user = self.issue_code(&user).await?;
        Ok(user)
    }

    /// Authenticate with email and password
    ///
    /// Unknown email, password-less account and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);

        if !self.limiter.is_allowed(&email).await {
            return Err(AuthError::RateLimited);
        }

        let user = self.check_credentials(&email, password).await?;

        if user.two_fa_enabled {
            self.issue_code(&user).await?;
            return Ok(LoginOutcome::OtpRequired);
        }

        let tokens = self.issue_tokens(&user).await?;
        Ok(LoginOutcome::Tokens(tokens))
    }

    /// Verify a one-time code and open a session
    ///
    /// First successful verification activates the account. The stored
    /// code is cleared, so a code verifies at most once.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<IssuedTokens, AuthError> {
        let email = normalize_email(email);

        if !self.limiter.is_allowed(&email).await {
            return Err(AuthError::RateLimited);
        }

        let user = match self.directory.get_by_email(&email).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Err(AuthError::InvalidOrExpiredCode),
            Err(e) => return Err(unexpected(e)),
        };

        self.check_code(&user, code)?;

        let user = self
            .directory
            .update(
                user.id,
                UpdateUser {
                    is_active: Some(true),
                    two_fa_code: Some(None),
                    two_fa_code_expiry: Some(None),
                    ..Default::default()
                },
            )
            .await
            .map_err(unexpected)?;

        info!("Verified account {}", user.id);

        self.issue_tokens(&user).await
    }

    /// Mint a new access token from a refresh token
    ///
    /// The refresh token must carry the session identifier currently
    /// stored for the user; the session identifier itself does not
    /// rotate here.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.codec.decode_refresh(refresh_token)?;

        let user = match self.directory.get_by_id(claims.sub).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Err(AuthError::TokenInvalid),
            Err(e) => return Err(unexpected(e)),
        };

        if user.session_id != Some(claims.sid) {
            return Err(AuthError::StaleSession);
        }

        let access = self
            .codec
            .encode_access(&AccessClaims::new(&user, self.config.access_token_expiry))?;

        Ok(access)
    }

    /// Close the user's session by clearing the refresh lineage
    ///
    /// Idempotent: logging out twice, or for a user that no longer
    /// exists, succeeds.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        let result = self
            .directory
            .update(
                user_id,
                UpdateUser {
                    session_id: Some(None),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Ok(_) => {
                info!("Logged out user {}", user_id);
                Ok(())
            }
            Err(DirectoryError::NotFound) => {
                warn!("Logout for unknown user {}", user_id);
                Ok(())
            }
            Err(e) => Err(unexpected(e)),
        }
    }

    /// Replace the password after checking the current one
    ///
    /// Existing refresh lineage stays valid.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password).map_err(AuthError::Validation)?;

        let user = match self.directory.get_by_id(user_id).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Err(AuthError::IncorrectPassword),
            Err(e) => return Err(unexpected(e)),
        };

        let digest = user
            .hashed_password
            .as_deref()
            .ok_or(AuthError::IncorrectPassword)?;

        if !password::verify(old_password, digest) {
            return Err(AuthError::IncorrectPassword);
        }

        let hashed = password::hash(new_password)?;

        self.directory
            .update(
                user.id,
                UpdateUser {
                    hashed_password: Some(hashed),
                    ..Default::default()
                },
            )
            .await
            .map_err(unexpected)?;

        info!("Password changed for user {}", user.id);
        Ok(())
    }

    /// Replace the password after verifying a one-time code
    ///
    /// Issues no tokens and does not touch `is_active`.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password).map_err(AuthError::Validation)?;

        let email = normalize_email(email);

        let user = match self.directory.get_by_email(&email).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Err(AuthError::InvalidOrExpiredCode),
            Err(e) => return Err(unexpected(e)),
        };

        self.check_code(&user, code)?;

        let hashed = password::hash(new_password)?;

        self.directory
            .update(
                user.id,
                UpdateUser {
                    hashed_password: Some(hashed),
                    two_fa_code: Some(None),
                    two_fa_code_expiry: Some(None),
                    ..Default::default()
                },
            )
            .await
            .map_err(unexpected)?;

        info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// Open a session from an externally-verified identity
    ///
    /// Creates a password-less account on first login.
    pub async fn external_login(
        &self,
        identity: ExternalIdentity,
    ) -> Result<IssuedTokens, AuthError> {
        let email = normalize_email(&identity.email);

        let user = match self.directory.get_by_email(&email).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => {
                info!("Creating account for external identity");
                self.directory
                    .create(NewUser {
                        email,
                        first_name: identity.first_name,
                        last_name: identity.last_name,
                        hashed_password: None,
                        role: Role::User,
                        two_fa_enabled: false,
                    })
                    .await
                    .map_err(unexpected)?
            }
            Err(e) => return Err(unexpected(e)),
        };

        self.issue_tokens(&user).await
    }

    /// Re-issue the verification code for an existing account
    pub async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let user = match self.directory.get_by_email(&email).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(unexpected(e)),
        };

        self.issue_code(&user).await?;
        Ok(())
    }

    /// Password-form token grant: credentials in, access token out
    ///
    /// Skips code verification and does not rotate the session.
    pub async fn password_token(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);

        let user = self.check_credentials(&email, password).await?;

        let access = self
            .codec
            .encode_access(&AccessClaims::new(&user, self.config.access_token_expiry))?;

        Ok(access)
    }

    /// Verify a bearer access token and return its claims
    pub fn authenticate(&self, token: &str) -> Result<AccessClaims, AuthError> {
        Ok(self.codec.decode_access(token)?)
    }

    /// Access token lifetime in seconds, for response bodies
    pub fn access_token_expiry(&self) -> i64 {
        self.config.access_token_expiry
    }

    /// Look up the user and verify the password
    async fn check_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = match self.directory.get_by_email(email).await {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(unexpected(e)),
        };

        let digest = user
            .hashed_password
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify(password, digest) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Check a submitted code against the stored one and its expiry
    fn check_code(&self, user: &User, code: &str) -> Result<(), AuthError> {
        let stored = user
            .two_fa_code
            .as_deref()
            .ok_or(AuthError::InvalidOrExpiredCode)?;
        let expiry = user
            .two_fa_code_expiry
            .ok_or(AuthError::InvalidOrExpiredCode)?;

        // Constant-time compare; length mismatch is an ordinary miss.
        let matches: bool = stored.as_bytes().ct_eq(code.as_bytes()).into();
        if !matches || Utc::now().timestamp() > expiry {
            return Err(AuthError::InvalidOrExpiredCode);
        }

        Ok(())
    }

    /// Store a fresh code on the user and dispatch it by email
    ///
    /// A fresh code overwrites any earlier one; delivery is best-effort
    /// and never fails the enclosing operation.
    async fn issue_code(&self, user: &User) -> Result<User, AuthError> {
        let code = otp::generate()?;
        let expiry = Utc::now().timestamp() + self.config.otp_expiry;

        let user = self
            .directory
            .update(
                user.id,
                UpdateUser {
                    two_fa_code: Some(Some(code.clone())),
                    two_fa_code_expiry: Some(Some(expiry)),
                    ..Default::default()
                },
            )
            .await
            .map_err(unexpected)?;

        let message =
            notify::verification_email(&user.email, &code, self.config.otp_expiry / 60);
        notify::dispatch(self.notifier.clone(), message);

        Ok(user)
    }

    /// Rotate the session identifier and mint both tokens
    ///
    /// Issuance is the only place the session identifier rotates; any
    /// refresh token from an earlier issuance becomes stale here.
    async fn issue_tokens(&self, user: &User) -> Result<IssuedTokens, AuthError> {
        let session_id = Uuid::new_v4();

        let user = self
            .directory
            .update(
                user.id,
                UpdateUser {
                    session_id: Some(Some(session_id)),
                    ..Default::default()
                },
            )
            .await
            .map_err(unexpected)?;

        let access = self
            .codec
            .encode_access(&AccessClaims::new(&user, self.config.access_token_expiry))?;
        let refresh = self.codec.encode_refresh(&RefreshClaims::new(
            &user,
            session_id,
            self.config.refresh_token_expiry,
        ))?;

        info!("Issued session {} for user {}", session_id, user.id);

        Ok(IssuedTokens {
            access_token: access,
            refresh_token: refresh,
            user,
        })
    }
}
