//! Client-credentials authentication
//!
//! The app identifier and secret are exchanged for a short-lived bearer
//! token, kept until it expires and then exchanged again.

use crate::error::{Result, SpotifyError};
use crate::models::TokenResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Spotify accounts service token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Exchanges tried by one call before giving up
pub const MAX_EXCHANGE_ATTEMPTS: usize = 2;

/// A bearer token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Builds a credential issued at `now` and valid for `expires_in` seconds
    pub fn issued_at(token: impl Into<String>, expires_in: i64, now: DateTime<Utc>) -> Self {
        let expires_at = TimeDelta::try_seconds(expires_in.max(0))
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(now);
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Value of the `Authorization` header sent to the token endpoint
pub fn basic_authorization(client_id: &str, client_secret: &str) -> String {
    let packed = STANDARD.encode(format!("{}:{}", client_id, client_secret));
    format!("Basic {}", packed)
}

/// Owns the app credentials and the current bearer token
pub struct TokenManager {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    current: Mutex<Option<Credential>>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            current: Mutex::new(None),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// The stored credential, expired or not
    pub async fn current(&self) -> Option<Credential> {
        self.current.lock().await.clone()
    }

    /// Returns a credential that is valid now
    ///
    /// The stored credential is returned untouched while it is valid.
    /// Otherwise a new one is exchanged, at most [`MAX_EXCHANGE_ATTEMPTS`]
    /// times; an exchange yielding an already expired token counts as a
    /// failed attempt.
    ///
    /// # Errors
    ///
    /// * `SpotifyError::Unauthorized` - The token endpoint refused the
    ///   credentials, answered without a token, or only with expired ones
    pub async fn get_valid_credential(&self) -> Result<Credential> {
        let mut current = self.current.lock().await;

        if let Some(credential) = current.as_ref() {
            if !credential.is_expired() {
                return Ok(credential.clone());
            }
            debug!("Access token expired at {}", credential.expires_at);
        }

        for attempt in 1..=MAX_EXCHANGE_ATTEMPTS {
            let credential = self.exchange_credentials().await?;
            if !credential.is_expired() {
                info!("Obtained access token valid until {}", credential.expires_at);
                *current = Some(credential.clone());
                return Ok(credential);
            }
            warn!(
                "Token endpoint returned an expired token (attempt {}/{})",
                attempt, MAX_EXCHANGE_ATTEMPTS
            );
        }

        *current = None;
        Err(SpotifyError::Unauthorized(format!(
            "no valid access token after {} attempts",
            MAX_EXCHANGE_ATTEMPTS
        )))
    }

    /// Performs one client-credentials exchange
    pub async fn exchange_credentials(&self) -> Result<Credential> {
        debug!("Requesting access token from {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .header(
                AUTHORIZATION,
                basic_authorization(&self.client_id, &self.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Token request failed ({}): {}", status.as_u16(), text);
            return Err(SpotifyError::Unauthorized(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| SpotifyError::Unauthorized(format!("unreadable token response: {}", e)))?;

        match (body.access_token, body.expires_in) {
            (Some(token), Some(expires_in)) => {
                Ok(Credential::issued_at(token, expires_in, Utc::now()))
            }
            _ => Err(SpotifyError::Unauthorized(
                "token response lacks access_token or expires_in".to_string(),
            )),
        }
    }
}
