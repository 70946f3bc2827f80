//! # blendsource
//!
//! Common traits and types for Blend catalog sources, plus the overlap engine
//! that works on top of them.
//!
//! A catalog source is anything able to answer four questions about a music
//! streaming service: does this user exist, which playlists does this user
//! expose, which tracks are in this playlist, and what are the names of these
//! tracks. `blendspotify` provides the Spotify implementation; tests use an
//! in-memory one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blendsource::{OverlapEngine, OverlapOptions};
//!
//! let engine = OverlapEngine::new(source, OverlapOptions::default());
//! let names = engine.find_overlap(&["alice".to_string(), "bob".to_string()]).await?;
//! ```

pub mod overlap;

use async_trait::async_trait;
use std::fmt::Debug;

pub use overlap::{
    OccurrenceCounter, OverlapEngine, OverlapOptions, OverlapReport, TrackUniverse, batches,
    MAX_BATCH_SIZE,
};

/// Error types for catalog operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0} is an invalid username")]
    InvalidUser(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Catalog error: {0}")]
    Other(String),
}

impl CatalogError {
    /// Whether the error must abort the whole overlap computation.
    ///
    /// Everything else is recovered locally and only reduces the
    /// completeness of the result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Auth(_) | CatalogError::InvalidUser(_))
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Outcome of a listing call that reached the service and got an answer.
///
/// Keeps "the list is empty" and "the expected field was not there" apart so
/// callers decide explicitly what each one means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// The field was present and non-empty
    Data(T),
    /// The field was present but empty
    Empty,
    /// The field was absent or null
    Malformed(String),
}

impl<T> Fetched<Vec<T>> {
    /// Builds an outcome from an optional list field of a response body
    pub fn from_field(field: Option<Vec<T>>, name: &str) -> Self {
        match field {
            None => Fetched::Malformed(format!("missing field `{}`", name)),
            Some(items) if items.is_empty() => Fetched::Empty,
            Some(items) => Fetched::Data(items),
        }
    }

    /// Returns the items, treating `Empty` and `Malformed` as no items
    pub fn into_items(self) -> Vec<T> {
        match self {
            Fetched::Data(items) => items,
            Fetched::Empty | Fetched::Malformed(_) => Vec::new(),
        }
    }
}

/// A playlist as seen in a user's playlist listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: Option<String>,
}

impl PlaylistRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// A track resolved by identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
}

impl TrackSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The music catalog capability the overlap engine calls through.
///
/// Implementations own their transport and credentials. Calls are issued one
/// at a time by the engine.
#[async_trait]
pub trait CatalogSource: Debug + Send + Sync {
    /// Human readable name of the service
    fn name(&self) -> &str;

    /// Checks that a user identifier names an existing account
    async fn user_exists(&self, user_id: &str) -> Result<bool>;

    /// Lists the first page of a user's public playlists
    async fn list_user_playlists(&self, user_id: &str) -> Result<Fetched<Vec<PlaylistRef>>>;

    /// Lists the track identifiers of a playlist
    ///
    /// Items without a track or without a track identifier are dropped.
    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Fetched<Vec<String>>>;

    /// Resolves at most [`MAX_BATCH_SIZE`] track identifiers
    ///
    /// Identifiers the catalog doesn't know are dropped from the answer.
    async fn get_tracks_by_ids(&self, ids: &[String]) -> Result<Fetched<Vec<TrackSummary>>>;
}
