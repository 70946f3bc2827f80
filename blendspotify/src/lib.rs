//! # blendspotify
//!
//! Spotify Web API catalog source for Blend.
//!
//! The client authenticates with the client-credentials flow: no user login,
//! only public data (profiles, public playlists, track metadata) is read.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blendconfig::Config;
//! use blendsource::{OverlapEngine, OverlapOptions};
//! use blendspotify::SpotifyClient;
//!
//! let config = Config::load_config("")?;
//! let client = SpotifyClient::from_config(&config)?;
//! let engine = OverlapEngine::new(client, OverlapOptions::from_config(&config));
//! let shared = engine.find_overlap(&["alice".into(), "bob".into()]).await?;
//! ```
//!
//! ## Known limitation
//!
//! Only the first page of a user's playlists (up to 50) and the first page of
//! each playlist (up to 100 items) are read.

pub mod api;
pub mod client;
pub mod config_ext;
pub mod error;
pub mod models;

pub use api::SpotifyApi;
pub use api::auth::{Credential, TokenManager, basic_authorization};
pub use client::{ClientBuilder, SpotifyClient};
pub use config_ext::SpotifyConfigExt;
pub use error::{Result, SpotifyError};
