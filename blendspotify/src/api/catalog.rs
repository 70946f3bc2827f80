//! Playlist contents and track lookups

use super::{PLAYLIST_TRACKS_LIMIT, SpotifyApi};
use crate::error::{Result, SpotifyError};
use crate::models::{Paging, PlaylistItem, SeveralTracks};
use blendsource::{Fetched, MAX_BATCH_SIZE, TrackSummary};
use tracing::debug;

/// Restricts playlist items to the nested track identifier
const PLAYLIST_TRACK_FIELDS: &str = "items(track(id))";

impl SpotifyApi {
    /// Lists the track identifiers of the first page of a playlist
    ///
    /// Items whose track or track identifier is null are dropped.
    pub async fn get_playlist_track_ids(&self, playlist_id: &str) -> Result<Fetched<Vec<String>>> {
        let limit = PLAYLIST_TRACKS_LIMIT.to_string();
        let params = [("fields", PLAYLIST_TRACK_FIELDS), ("limit", limit.as_str())];

        let page: Paging<PlaylistItem> = self
            .get(&["playlists", playlist_id, "tracks"], &params)
            .await?;

        let track_ids = page.items.map(|items| {
            let total = items.len();
            let ids: Vec<String> = items
                .into_iter()
                .flatten()
                .filter_map(|item| item.track.and_then(|track| track.id))
                .collect();
            if ids.len() < total {
                debug!(
                    "Playlist {}: skipped {} items without track id",
                    playlist_id,
                    total - ids.len()
                );
            }
            ids
        });

        Ok(Fetched::from_field(track_ids, "items"))
    }

    /// Resolves up to 25 track identifiers to their names
    ///
    /// Unknown identifiers come back as null and are dropped.
    pub async fn get_tracks(&self, ids: &[String]) -> Result<Fetched<Vec<TrackSummary>>> {
        if ids.len() > MAX_BATCH_SIZE {
            return Err(SpotifyError::Other(format!(
                "{} track ids requested, at most {} per call",
                ids.len(),
                MAX_BATCH_SIZE
            )));
        }
        if ids.is_empty() {
            return Ok(Fetched::Empty);
        }

        let joined = ids.join(",");
        let body: SeveralTracks = self.get(&["tracks"], &[("ids", joined.as_str())]).await?;

        let tracks = body.tracks.map(|tracks| {
            tracks
                .into_iter()
                .flatten()
                .filter_map(|track| match (track.id, track.name) {
                    (Some(id), Some(name)) => Some(TrackSummary::new(id, name)),
                    _ => None,
                })
                .collect()
        });

        Ok(Fetched::from_field(tracks, "tracks"))
    }
}
