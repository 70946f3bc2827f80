//! Error handling for the Spotify client

use blendsource::CatalogError;
use thiserror::Error;

/// Result type for blendspotify
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Errors raised while talking to the Spotify Web API
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Rejected credentials or token (401, failed token exchange)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Valid token but no access to this resource (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Spotify API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    #[error("Spotify error: {0}")]
    Other(String),
}

impl SpotifyError {
    /// Builds an error from an HTTP status code and the response message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 => Self::Unauthorized(message.into()),
            403 => Self::Forbidden(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimitExceeded,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, SpotifyError::Unauthorized(_))
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SpotifyError::RateLimitExceeded)
    }
}

impl From<SpotifyError> for CatalogError {
    fn from(err: SpotifyError) -> Self {
        match err {
            SpotifyError::Unauthorized(message) => CatalogError::Auth(message),
            SpotifyError::NotFound(message) => CatalogError::NotFound(message),
            SpotifyError::Forbidden(message) => {
                CatalogError::Other(format!("forbidden: {}", message))
            }
            SpotifyError::Http(e) => CatalogError::Transport(e.to_string()),
            SpotifyError::RateLimitExceeded => {
                CatalogError::Transport(SpotifyError::RateLimitExceeded.to_string())
            }
            SpotifyError::JsonParse(e) => CatalogError::Malformed(e.to_string()),
            other => CatalogError::Other(other.to_string()),
        }
    }
}
