//! Spotify settings on top of blendconfig
//!
//! Adds the `SpotifyConfigExt` trait to `blendconfig::Config` for the app
//! credentials and the endpoints used by the client.

use crate::api::auth::DEFAULT_TOKEN_URL;
use crate::api::{DEFAULT_API_BASE, MAX_PLAYLIST_LIMIT};
use crate::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use anyhow::{Result, anyhow};
use blendconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Extension trait for the Spotify section of the configuration
///
/// # Example
///
/// ```rust,ignore
/// use blendconfig::Config;
/// use blendspotify::SpotifyConfigExt;
///
/// let config = Config::load_config("")?;
/// let (client_id, _secret) = config.get_spotify_credentials()?;
/// println!("Spotify app: {}", client_id);
/// ```
pub trait SpotifyConfigExt {
    /// App client identifier (`accounts.spotify.client_id`)
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is missing or empty
    fn get_spotify_client_id(&self) -> Result<String>;

    /// App client secret (`accounts.spotify.client_secret`)
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing or empty
    fn get_spotify_client_secret(&self) -> Result<String>;

    /// Both app credentials as `(client_id, client_secret)`
    fn get_spotify_credentials(&self) -> Result<(String, String)>;

    fn get_spotify_api_base(&self) -> String;

    fn set_spotify_api_base(&self, url: &str) -> Result<()>;

    fn get_spotify_token_url(&self) -> String;

    fn set_spotify_token_url(&self, url: &str) -> Result<()>;

    /// Timeout applied to every HTTP request
    fn get_spotify_request_timeout(&self) -> Duration;

    /// Playlists read per user, between 1 and 50
    fn get_spotify_playlist_limit(&self) -> u32;
}

impl SpotifyConfigExt for Config {
    fn get_spotify_client_id(&self) -> Result<String> {
        self.get_string(&["accounts", "spotify", "client_id"])
            .ok_or_else(|| anyhow!("Spotify client_id not configured"))
    }

    fn get_spotify_client_secret(&self) -> Result<String> {
        self.get_string(&["accounts", "spotify", "client_secret"])
            .ok_or_else(|| anyhow!("Spotify client_secret not configured"))
    }

    fn get_spotify_credentials(&self) -> Result<(String, String)> {
        Ok((self.get_spotify_client_id()?, self.get_spotify_client_secret()?))
    }

    fn get_spotify_api_base(&self) -> String {
        self.get_string(&["sources", "spotify", "api_base"])
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }

    fn set_spotify_api_base(&self, url: &str) -> Result<()> {
        self.set_value(
            &["sources", "spotify", "api_base"],
            Value::String(url.to_string()),
        )
    }

    fn get_spotify_token_url(&self) -> String {
        self.get_string(&["sources", "spotify", "token_url"])
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string())
    }

    fn set_spotify_token_url(&self, url: &str) -> Result<()> {
        self.set_value(
            &["sources", "spotify", "token_url"],
            Value::String(url.to_string()),
        )
    }

    fn get_spotify_request_timeout(&self) -> Duration {
        let secs = self.get_usize(
            &["sources", "spotify", "request_timeout_secs"],
            DEFAULT_REQUEST_TIMEOUT_SECS as usize,
        );
        Duration::from_secs(secs.max(1) as u64)
    }

    fn get_spotify_playlist_limit(&self) -> u32 {
        let limit = self.get_usize(
            &["sources", "spotify", "playlist_limit"],
            MAX_PLAYLIST_LIMIT as usize,
        );
        limit.clamp(1, MAX_PLAYLIST_LIMIT as usize) as u32
    }
}
