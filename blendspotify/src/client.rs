//! High-level Spotify client
//!
//! Wraps [`SpotifyApi`] and exposes it as a [`CatalogSource`] for the overlap
//! engine.

use crate::api::auth::{DEFAULT_TOKEN_URL, TokenManager};
use crate::api::{DEFAULT_API_BASE, MAX_PLAYLIST_LIMIT, SpotifyApi};
use crate::config_ext::SpotifyConfigExt;
use crate::error::{Result, SpotifyError};
use async_trait::async_trait;
use blendconfig::Config;
use blendsource::{CatalogError, CatalogSource, Fetched, PlaylistRef, TrackSummary};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default timeout for API requests
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "blendspotify/0.1.0";

/// Spotify catalog client
///
/// # Example
///
/// ```no_run
/// use blendspotify::SpotifyClient;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SpotifyClient::builder()
///     .credentials("client-id", "client-secret")
///     .build()?;
/// let exists = client.api().user_exists("spotify").await?;
/// println!("exists: {}", exists);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SpotifyClient {
    api: SpotifyApi,
}

impl SpotifyClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a client from the `accounts.spotify` and `sources.spotify`
    /// sections of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let (client_id, client_secret) = config.get_spotify_credentials()?;

        Self::builder()
            .credentials(client_id, client_secret)
            .api_base(config.get_spotify_api_base())
            .token_url(config.get_spotify_token_url())
            .timeout(config.get_spotify_request_timeout())
            .playlist_limit(config.get_spotify_playlist_limit())
            .build()
    }

    /// Low-level API access
    pub fn api(&self) -> &SpotifyApi {
        &self.api
    }
}

#[async_trait]
impl CatalogSource for SpotifyClient {
    fn name(&self) -> &str {
        "Spotify"
    }

    async fn user_exists(&self, user_id: &str) -> blendsource::Result<bool> {
        Ok(self.api.user_exists(user_id).await?)
    }

    async fn list_user_playlists(
        &self,
        user_id: &str,
    ) -> blendsource::Result<Fetched<Vec<PlaylistRef>>> {
        let playlists = self.api.get_user_playlists(user_id).await?;
        if let Fetched::Data(ref list) = playlists {
            debug!("User {} exposes {} playlists", user_id, list.len());
        }
        Ok(playlists)
    }

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> blendsource::Result<Fetched<Vec<String>>> {
        Ok(self.api.get_playlist_track_ids(playlist_id).await?)
    }

    async fn get_tracks_by_ids(
        &self,
        ids: &[String],
    ) -> blendsource::Result<Fetched<Vec<TrackSummary>>> {
        self.api.get_tracks(ids).await.map_err(CatalogError::from)
    }
}

/// Builder for [`SpotifyClient`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    client: Option<Client>,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    request_timeout: Duration,
    user_agent: String,
    playlist_limit: u32,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            client_id: String::new(),
            client_secret: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            playlist_limit: MAX_PLAYLIST_LIMIT,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the app credentials used for the client-credentials flow
    pub fn credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Set the Web API base URL
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Set the token endpoint URL
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Playlists read per user (clamped to 1..=50)
    pub fn playlist_limit(mut self, limit: u32) -> Self {
        self.playlist_limit = limit;
        self
    }

    pub fn build(self) -> Result<SpotifyClient> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(SpotifyError::Unauthorized(
                "client id and client secret are required".to_string(),
            ));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.request_timeout)
                .build()?,
        };

        let tokens = TokenManager::new(
            client.clone(),
            self.token_url,
            self.client_id,
            self.client_secret,
        );
        let mut api = SpotifyApi::new(client, self.api_base, tokens);
        api.set_playlist_limit(self.playlist_limit);

        Ok(SpotifyClient { api })
    }
}
