//! Low-level access to the Spotify Web API
//!
//! Requests are authenticated with an app-level bearer token obtained through
//! the client-credentials flow (see [`auth::TokenManager`]).

pub mod auth;
pub mod catalog;
pub mod user;

use crate::error::{Result, SpotifyError};
use auth::TokenManager;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Base URL of the Spotify Web API
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Largest page the playlist listing endpoint serves
pub const MAX_PLAYLIST_LIMIT: u32 = 50;

/// Largest page the playlist items endpoint serves
pub const PLAYLIST_TRACKS_LIMIT: u32 = 100;

/// Low-level Spotify API client
#[derive(Debug)]
pub struct SpotifyApi {
    client: Client,
    api_base: String,
    tokens: TokenManager,
    playlist_limit: u32,
}

impl SpotifyApi {
    pub fn new(client: Client, api_base: impl Into<String>, tokens: TokenManager) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            tokens,
            playlist_limit: MAX_PLAYLIST_LIMIT,
        }
    }

    /// Sets how many playlists are read per user (1 to 50)
    pub fn set_playlist_limit(&mut self, limit: u32) {
        self.playlist_limit = limit.clamp(1, MAX_PLAYLIST_LIMIT);
    }

    pub fn playlist_limit(&self) -> u32 {
        self.playlist_limit
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Builds an endpoint URL, percent-encoding each path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)?;
        url.path_segments_mut()
            .map_err(|_| SpotifyError::Other(format!("Invalid API base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Performs an authenticated GET request
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> Result<T> {
        let credential = self.tokens.get_valid_credential().await?;
        let url = self.endpoint(segments)?;

        debug!("GET {} with {} params", url, params.len());

        let response = self
            .client
            .get(url)
            .bearer_auth(&credential.token)
            .query(params)
            .send()
            .await?;

        handle_response(response).await
    }
}

/// Maps non-success statuses to errors and decodes the body
pub(crate) async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let status_code = status.as_u16();

    debug!("Response status: {}", status);

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!("API error ({}): {}", status_code, error_text);
        return Err(SpotifyError::from_status_code(
            status_code,
            error_message(&error_text),
        ));
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!("Failed to parse response: {}", e);
        SpotifyError::JsonParse(e)
    })
}

/// Extracts `error.message` from a Spotify error body, or returns the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
