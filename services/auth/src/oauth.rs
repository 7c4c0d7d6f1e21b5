//! External identity verification (Google ID tokens)
//!
//! The frontend obtains an ID token from Google and posts it here; we
//! verify it against Google's `tokeninfo` endpoint and hand the session
//! layer an already-verified identity.

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

/// Identity asserted by an external provider
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub picture: Option<String>,
}

/// Google `tokeninfo` response fields we care about
#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    email: String,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifier for Google-issued ID tokens
#[derive(Clone)]
pub struct GoogleVerifier {
    client: reqwest::Client,
    client_id: String,
    tokeninfo_url: String,
}

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

impl GoogleVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    /// Verify an ID token and extract the user's identity
    ///
    /// Fails when Google rejects the token or when the token was issued
    /// for a different application.
    pub async fn verify(&self, id_token: &str) -> Result<ExternalIdentity> {
        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("identity token rejected: {}", response.status());
        }

        let info: GoogleTokenInfo = response.json().await?;

        if info.aud != self.client_id {
            anyhow::bail!("identity token issued for another application");
        }

        info!("verified external identity");

        Ok(ExternalIdentity {
            email: info.email,
            first_name: info.given_name,
            last_name: info.family_name,
            picture: info.picture,
        })
    }
}
