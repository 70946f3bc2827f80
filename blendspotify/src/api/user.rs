//! User profiles and their public playlists

use super::SpotifyApi;
use crate::error::{Result, SpotifyError};
use crate::models::{Paging, SimplifiedPlaylist, UserProfile};
use blendsource::{Fetched, PlaylistRef};
use tracing::debug;

impl SpotifyApi {
    /// Checks that `user_id` names an existing account
    ///
    /// Spotify answers 404, or 400 for identifiers it can't parse, when the
    /// account doesn't exist.
    pub async fn user_exists(&self, user_id: &str) -> Result<bool> {
        match self.get::<UserProfile>(&["users", user_id], &[]).await {
            Ok(profile) => {
                debug!(
                    "Found user {} ({})",
                    user_id,
                    profile.display_name.as_deref().unwrap_or("no display name")
                );
                Ok(true)
            }
            Err(SpotifyError::NotFound(_)) | Err(SpotifyError::ApiError { code: 400, .. }) => {
                debug!("No user {}", user_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Lists the first page of a user's public playlists
    ///
    /// Further pages are not requested.
    pub async fn get_user_playlists(&self, user_id: &str) -> Result<Fetched<Vec<PlaylistRef>>> {
        let limit = self.playlist_limit().to_string();
        let params = [("limit", limit.as_str()), ("offset", "0")];

        let page: Paging<SimplifiedPlaylist> = self
            .get(&["users", user_id, "playlists"], &params)
            .await?;

        if page.has_more() {
            debug!(
                "User {} has {} playlists, only the first {} are read",
                user_id,
                page.total.unwrap_or_default(),
                limit
            );
        }

        let playlists = page.items.map(|items| {
            items
                .into_iter()
                .flatten()
                .filter_map(|playlist| {
                    playlist.id.map(|id| PlaylistRef {
                        id,
                        name: playlist.name,
                    })
                })
                .collect()
        });

        Ok(Fetched::from_field(playlists, "items"))
    }
}
