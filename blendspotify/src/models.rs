//! Wire structures of the Spotify Web API
//!
//! Only the fields Blend reads are declared. Every field is optional so a
//! missing or null value surfaces as `None` instead of a parse failure.
//! `Paging<T>` relies on the implicit `Option` handling of serde rather than
//! `#[serde(default)]`, which would require `T: Default`.

use serde::Deserialize;

/// Body of `POST /api/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Body of `GET /users/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One page of a paged listing
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    /// Null entries are kept so the caller can skip them
    pub items: Option<Vec<Option<T>>>,
    pub total: Option<u64>,
    pub next: Option<String>,
}

impl<T> Paging<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}

/// Entry of `GET /users/{id}/playlists`
#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedPlaylist {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `GET /playlists/{id}/tracks`
///
/// `track` is null for removed tracks and some local files.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<TrackRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackRef {
    #[serde(default)]
    pub id: Option<String>,
}

/// Body of `GET /tracks?ids=...`
///
/// Unknown identifiers come back as null entries.
#[derive(Debug, Clone, Deserialize)]
pub struct SeveralTracks {
    #[serde(default)]
    pub tracks: Option<Vec<Option<Track>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
