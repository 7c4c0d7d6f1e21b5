//! Authentication service configuration

use anyhow::Result;

/// Token and session configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Symmetric key for signing access tokens
    pub access_secret: String,
    /// Symmetric key for signing refresh tokens
    pub refresh_secret: String,
    /// Secret for the token wrapping layer
    pub wrapper_secret: String,
    /// Salt for deriving the wrapping key
    pub wrapper_salt: String,
    /// Access token expiry in seconds (default: 15 minutes)
    pub access_token_expiry: i64,
    /// Refresh token expiry in seconds (default: 7 days)
    pub refresh_token_expiry: i64,
    /// Verification code expiry in seconds (default: 5 minutes)
    pub otp_expiry: i64,
    /// Google OAuth client id for ID token audience checks
    pub google_client_id: String,
    /// Address the HTTP server binds to
    pub bind_address: String,
}

impl AuthConfig {
    /// Create a new AuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `ACCESS_TOKEN_SECRET`: Signing key for access tokens (required)
    /// - `REFRESH_TOKEN_SECRET`: Signing key for refresh tokens (required)
    /// - `TOKEN_WRAPPER_SECRET`: Secret for the token wrapping layer (required)
    /// - `TOKEN_WRAPPER_SALT`: Salt for the wrapping key derivation (default: "fundi-token-wrap")
    /// - `ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    /// - `OTP_CODE_EXPIRY`: Verification code expiry in seconds (default: 300)
    /// - `GOOGLE_CLIENT_ID`: OAuth client id for external login (default: empty)
    /// - `AUTH_BIND_ADDRESS`: Listen address (default: "0.0.0.0:3000")
    pub fn from_env() -> Result<Self> {
        let access_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| anyhow::anyhow!("ACCESS_TOKEN_SECRET environment variable not set"))?;

        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| anyhow::anyhow!("REFRESH_TOKEN_SECRET environment variable not set"))?;

        let wrapper_secret = std::env::var("TOKEN_WRAPPER_SECRET")
            .map_err(|_| anyhow::anyhow!("TOKEN_WRAPPER_SECRET environment variable not set"))?;

        let wrapper_salt = std::env::var("TOKEN_WRAPPER_SALT")
            .unwrap_or_else(|_| "fundi-token-wrap".to_string());

        let access_token_expiry = std::env::var("ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "900".to_string()) // 15 minutes
            .parse()
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("REFRESH_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "604800".to_string()) // 7 days
            .parse()
            .unwrap_or(604800);

        let otp_expiry = std::env::var("OTP_CODE_EXPIRY")
            .unwrap_or_else(|_| "300".to_string()) // 5 minutes
            .parse()
            .unwrap_or(300);

        let google_client_id = std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default();

        let bind_address =
            std::env::var("AUTH_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(AuthConfig {
            access_secret,
            refresh_secret,
            wrapper_secret,
            wrapper_salt,
            access_token_expiry,
            refresh_token_expiry,
            otp_expiry,
            google_client_id,
            bind_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required_vars() {
        unsafe {
            std::env::set_var("ACCESS_TOKEN_SECRET", "access-secret");
            std::env::set_var("REFRESH_TOKEN_SECRET", "refresh-secret");
            std::env::set_var("TOKEN_WRAPPER_SECRET", "wrap-secret");
        }
    }

    fn clear_vars() {
        unsafe {
            std::env::remove_var("ACCESS_TOKEN_SECRET");
            std::env::remove_var("REFRESH_TOKEN_SECRET");
            std::env::remove_var("TOKEN_WRAPPER_SECRET");
            std::env::remove_var("TOKEN_WRAPPER_SALT");
            std::env::remove_var("ACCESS_TOKEN_EXPIRY");
            std::env::remove_var("REFRESH_TOKEN_EXPIRY");
            std::env::remove_var("OTP_CODE_EXPIRY");
            std::env::remove_var("GOOGLE_CLIENT_ID");
            std::env::remove_var("AUTH_BIND_ADDRESS");
        }
    }

    #[test]
    #[serial]
    fn from_env_uses_defaults() {
        clear_vars();
        set_required_vars();

        let config = AuthConfig::from_env().unwrap();
        assert_eq!(config.access_token_expiry, 900);
        assert_eq!(config.refresh_token_expiry, 604800);
        assert_eq!(config.otp_expiry, 300);
        assert_eq!(config.bind_address, "0.0.0.0:3000");

        clear_vars();
    }

    #[test]
    #[serial]
    fn from_env_requires_secrets() {
        clear_vars();
        assert!(AuthConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        clear_vars();
        set_required_vars();
        unsafe {
            std::env::set_var("OTP_CODE_EXPIRY", "120");
            std::env::set_var("AUTH_BIND_ADDRESS", "127.0.0.1:8080");
        }

        let config = AuthConfig::from_env().unwrap();
        assert_eq!(config.otp_expiry, 120);
        assert_eq!(config.bind_address, "127.0.0.1:8080");

        clear_vars();
    }
}
