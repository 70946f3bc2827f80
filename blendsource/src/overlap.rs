//! Overlap engine
//!
//! Finds the tracks every given user has somewhere in their public playlists:
//! each user's playlists are flattened into a deduplicated track universe,
//! universes are folded into an occurrence counter, and the identifiers seen
//! by every user are resolved to display names in batches.

use crate::{CatalogError, CatalogSource, Fetched, Result};
use blendconfig::Config;
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;
use std::slice::Chunks;
use tracing::{debug, info, warn};

/// Largest number of identifiers a single track lookup accepts
pub const MAX_BATCH_SIZE: usize = 25;

/// Deduplicated track identifiers of one user, in first-seen order
pub type TrackUniverse = IndexSet<String>;

/// Splits `items` into consecutive batches of at most `size` elements.
///
/// Order is preserved and the last batch may be shorter. A `size` of zero is
/// treated as one.
pub fn batches<T>(items: &[T], size: usize) -> Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Number of users whose track universe contains each track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceCounter {
    counts: IndexMap<String, usize>,
}

impl OccurrenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to every track of the universe
    pub fn add_universe(&mut self, universe: &TrackUniverse) {
        for track_id in universe {
            *self.counts.entry(track_id.clone()).or_insert(0) += 1;
        }
    }

    pub fn count(&self, track_id: &str) -> usize {
        self.counts.get(track_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Tracks seen by at least `num_users` users, in first-seen order.
    ///
    /// Always empty when `num_users` is zero.
    pub fn overlap(&self, num_users: usize) -> Vec<String> {
        if num_users == 0 {
            return Vec::new();
        }
        self.counts
            .iter()
            .filter(|(_, count)| **count >= num_users)
            .map(|(track_id, _)| track_id.clone())
            .collect()
    }
}

/// Tuning knobs of the overlap engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapOptions {
    /// Identifiers per track lookup, between 1 and [`MAX_BATCH_SIZE`]
    pub batch_size: usize,
    /// Check every user identifier before fetching anything
    pub validate_users: bool,
}

impl Default for OverlapOptions {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            validate_users: true,
        }
    }
}

impl OverlapOptions {
    pub fn from_config(config: &Config) -> Self {
        Self::default()
            .with_batch_size(config.get_overlap_batch_size())
            .with_validate_users(config.get_overlap_validate_users())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        let clamped = batch_size.clamp(1, MAX_BATCH_SIZE);
        if clamped != batch_size {
            warn!(
                "Batch size {} out of range, using {}",
                batch_size, clamped
            );
        }
        self.batch_size = clamped;
        self
    }

    pub fn with_validate_users(mut self, validate_users: bool) -> Self {
        self.validate_users = validate_users;
        self
    }
}

/// Everything computed during one overlap run
#[derive(Debug, Clone, Default)]
pub struct OverlapReport {
    /// Users in the order they were processed
    pub users: Vec<String>,
    pub counter: OccurrenceCounter,
    /// Track identifiers present in every user's universe
    pub overlap_ids: Vec<String>,
    /// Display names resolved from `overlap_ids`
    pub names: BTreeSet<String>,
    /// Set when a batch lookup failed and later batches were skipped
    pub truncated: bool,
}

/// Computes the tracks shared by a group of users of one catalog
#[derive(Debug)]
pub struct OverlapEngine<S> {
    source: S,
    options: OverlapOptions,
}

impl<S: CatalogSource> OverlapEngine<S> {
    pub fn new(source: S, options: OverlapOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &OverlapOptions {
        &self.options
    }

    /// Names of the tracks present in every user's playlists
    pub async fn find_overlap(&self, user_ids: &[String]) -> Result<BTreeSet<String>> {
        Ok(self.run(user_ids).await?.names)
    }

    /// Runs the whole computation and keeps the intermediate results
    ///
    /// # Errors
    ///
    /// Only fatal catalog errors are returned (see [`CatalogError::is_fatal`]).
    /// Everything else shrinks the result and is logged.
    pub async fn run(&self, user_ids: &[String]) -> Result<OverlapReport> {
        if user_ids.is_empty() {
            info!("No users given, nothing to compare");
            return Ok(OverlapReport::default());
        }

        info!(
            "Computing overlap on {} for users: {}",
            self.source.name(),
            user_ids.join(", ")
        );

        if self.options.validate_users {
            self.validate_users(user_ids).await?;
        }

        let mut counter = OccurrenceCounter::new();
        for user_id in user_ids {
            let universe = self.fetch_user_tracks(user_id).await?;
            debug!("User {} has {} unique tracks", user_id, universe.len());
            counter.add_universe(&universe);
        }

        let overlap_ids = counter.overlap(user_ids.len());
        info!("Overlap size: {}", overlap_ids.len());

        let (names, truncated) = self.resolve_names(&overlap_ids).await?;

        Ok(OverlapReport {
            users: user_ids.to_vec(),
            counter,
            overlap_ids,
            names,
            truncated,
        })
    }

    /// Fails on the first identifier the catalog doesn't know
    pub async fn validate_users(&self, user_ids: &[String]) -> Result<()> {
        for user_id in user_ids {
            match self.source.user_exists(user_id).await {
                Ok(true) => debug!("User {} exists", user_id),
                Ok(false) => return Err(CatalogError::InvalidUser(user_id.clone())),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Could not check user {}, continuing: {}", user_id, e),
            }
        }
        Ok(())
    }

    /// Collects the deduplicated track identifiers of all of a user's playlists.
    ///
    /// A user without playlists, or whose listing can't be read, has an empty
    /// universe. Playlists that can't be read are skipped.
    pub async fn fetch_user_tracks(&self, user_id: &str) -> Result<TrackUniverse> {
        let mut universe = TrackUniverse::new();

        let playlists = match self.source.list_user_playlists(user_id).await {
            Ok(Fetched::Data(playlists)) => playlists,
            Ok(Fetched::Empty) => {
                info!("User {} has no public playlists", user_id);
                return Ok(universe);
            }
            Ok(Fetched::Malformed(reason)) => {
                warn!("Playlist listing of user {} unusable: {}", user_id, reason);
                return Ok(universe);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Could not list playlists of user {}: {}", user_id, e);
                return Ok(universe);
            }
        };

        for playlist in &playlists {
            match self.source.list_playlist_tracks(&playlist.id).await {
                Ok(Fetched::Data(track_ids)) => universe.extend(track_ids),
                Ok(Fetched::Empty) => debug!("Playlist {} is empty", playlist.id),
                Ok(Fetched::Malformed(reason)) => {
                    warn!("Skipping playlist {}: {}", playlist.id, reason)
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Skipping playlist {}: {}", playlist.id, e),
            }
        }

        debug!(
            "Collected {} tracks from {} playlists of user {}",
            universe.len(),
            playlists.len(),
            user_id
        );
        Ok(universe)
    }

    /// Resolves identifiers to names batch by batch.
    ///
    /// The first batch that can't be read stops the resolution; the names
    /// gathered so far are kept and the flag is raised.
    async fn resolve_names(&self, track_ids: &[String]) -> Result<(BTreeSet<String>, bool)> {
        let mut names = BTreeSet::new();

        for (index, batch) in batches(track_ids, self.options.batch_size).enumerate() {
            match self.source.get_tracks_by_ids(batch).await {
                Ok(Fetched::Data(tracks)) => {
                    for track in tracks {
                        info!(track_id = %track.id, "{}", track.name);
                        names.insert(track.name);
                    }
                }
                Ok(Fetched::Empty) => debug!("Batch {} resolved no track", index),
                Ok(Fetched::Malformed(reason)) => {
                    warn!("Batch {} unusable, stopping resolution: {}", index, reason);
                    return Ok((names, true));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Batch {} failed, stopping resolution: {}", index, e);
                    return Ok((names, true));
                }
            }
        }

        Ok((names, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlaylistRef, TrackSummary};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory catalog recording every call it receives
    #[derive(Debug, Default)]
    struct FakeCatalog {
        users: HashMap<String, Result<Fetched<Vec<PlaylistRef>>>>,
        playlists: HashMap<String, Result<Fetched<Vec<String>>>>,
        names: HashMap<String, String>,
        /// Zero-based lookup calls answering without a `tracks` field
        malformed_lookups: Vec<usize>,
        calls: AtomicUsize,
        lookups: Mutex<Vec<Vec<String>>>,
    }

    impl FakeCatalog {
        fn user(mut self, user_id: &str, playlists: &[&str]) -> Self {
            let refs: Vec<PlaylistRef> = playlists.iter().map(|p| PlaylistRef::new(*p)).collect();
            self.users
                .insert(user_id.to_string(), Ok(Fetched::from_field(Some(refs), "items")));
            self
        }

        fn user_listing(mut self, user_id: &str, listing: Result<Fetched<Vec<PlaylistRef>>>) -> Self {
            self.users.insert(user_id.to_string(), listing);
            self
        }

        fn playlist(mut self, playlist_id: &str, tracks: &[&str]) -> Self {
            let ids: Vec<String> = tracks.iter().map(|t| t.to_string()).collect();
            self.playlists.insert(
                playlist_id.to_string(),
                Ok(Fetched::from_field(Some(ids), "items")),
            );
            self
        }

        fn playlist_listing(mut self, playlist_id: &str, listing: Result<Fetched<Vec<String>>>) -> Self {
            self.playlists.insert(playlist_id.to_string(), listing);
            self
        }

        fn named(mut self, track_id: &str, name: &str) -> Self {
            self.names.insert(track_id.to_string(), name.to_string());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn lookups(&self) -> Vec<Vec<String>> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        fn name(&self) -> &str {
            "fake"
        }

        async fn user_exists(&self, user_id: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.users.contains_key(user_id))
        }

        async fn list_user_playlists(&self, user_id: &str) -> Result<Fetched<Vec<PlaylistRef>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.users
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| Err(CatalogError::NotFound(user_id.to_string())))
        }

        async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<Fetched<Vec<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.playlists
                .get(playlist_id)
                .cloned()
                .unwrap_or_else(|| Err(CatalogError::NotFound(playlist_id.to_string())))
        }

        async fn get_tracks_by_ids(&self, ids: &[String]) -> Result<Fetched<Vec<TrackSummary>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(ids.len() <= MAX_BATCH_SIZE);
            let index = {
                let mut lookups = self.lookups.lock().unwrap();
                lookups.push(ids.to_vec());
                lookups.len() - 1
            };
            if self.malformed_lookups.contains(&index) {
                return Ok(Fetched::Malformed("missing field `tracks`".to_string()));
            }
            let tracks = ids
                .iter()
                .filter_map(|id| self.names.get(id).map(|name| TrackSummary::new(id, name)))
                .collect();
            Ok(Fetched::from_field(Some(tracks), "tracks"))
        }
    }

    fn users(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|u| u.to_string()).collect()
    }

    fn alice_and_bob() -> FakeCatalog {
        FakeCatalog::default()
            .user("alice", &["pa1", "pa2"])
            .user("bob", &["pb1"])
            .playlist("pa1", &["t1", "t2"])
            .playlist("pa2", &["t2", "t3"])
            .playlist("pb1", &["t2", "t3", "t4"])
            .named("t1", "One")
            .named("t2", "Two")
            .named("t3", "Three")
            .named("t4", "Four")
    }

    #[tokio::test]
    async fn test_two_users_share_two_tracks() {
        let engine = OverlapEngine::new(alice_and_bob(), OverlapOptions::default());
        let report = engine.run(&users(&["alice", "bob"])).await.unwrap();

        assert_eq!(report.counter.count("t1"), 1);
        assert_eq!(report.counter.count("t2"), 2);
        assert_eq!(report.counter.count("t3"), 2);
        assert_eq!(report.counter.count("t4"), 1);
        assert_eq!(report.overlap_ids, vec!["t2", "t3"]);
        assert_eq!(
            report.names,
            BTreeSet::from(["Two".to_string(), "Three".to_string()])
        );
        assert!(!report.truncated);
        assert_eq!(engine.source().lookups(), vec![vec!["t2", "t3"]]);
    }

    #[tokio::test]
    async fn test_no_users_means_no_calls() {
        let engine = OverlapEngine::new(alice_and_bob(), OverlapOptions::default());
        let names = engine.find_overlap(&[]).await.unwrap();
        assert!(names.is_empty());
        assert_eq!(engine.source().calls(), 0);
    }

    #[tokio::test]
    async fn test_track_in_several_playlists_counts_once_per_user() {
        let engine = OverlapEngine::new(alice_and_bob(), OverlapOptions::default());
        let universe = engine.fetch_user_tracks("alice").await.unwrap();
        assert_eq!(universe.iter().collect::<Vec<_>>(), vec!["t1", "t2", "t3"]);

        let report = engine.run(&users(&["alice"])).await.unwrap();
        assert_eq!(report.counter.count("t2"), 1);
        assert_eq!(report.overlap_ids, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_single_user_gets_whole_universe() {
        let engine = OverlapEngine::new(alice_and_bob(), OverlapOptions::default());
        let names = engine.find_overlap(&users(&["bob"])).await.unwrap();
        assert_eq!(
            names,
            BTreeSet::from(["Two".to_string(), "Three".to_string(), "Four".to_string()])
        );
    }

    #[tokio::test]
    async fn test_missing_playlist_field_is_empty_universe() {
        let catalog = alice_and_bob()
            .user_listing("bob", Ok(Fetched::Malformed("missing field `items`".into())));
        let engine = OverlapEngine::new(catalog, OverlapOptions::default());

        assert!(engine.fetch_user_tracks("bob").await.unwrap().is_empty());
        let names = engine.find_overlap(&users(&["alice", "bob"])).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_user_without_playlists() {
        let catalog = alice_and_bob().user("carol", &[]);
        let engine = OverlapEngine::new(catalog, OverlapOptions::default());
        assert!(engine.fetch_user_tracks("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_playlist_is_skipped() {
        let catalog = alice_and_bob()
            .playlist_listing("pa1", Err(CatalogError::Transport("connection reset".into())))
            .playlist_listing("pa2", Ok(Fetched::Malformed("missing field `items`".into())))
            .user("carol", &["pc1", "pc2"])
            .playlist("pc2", &["t9"]);
        let engine = OverlapEngine::new(catalog, OverlapOptions::default());

        assert!(engine.fetch_user_tracks("alice").await.unwrap().is_empty());
        // pc1 is unknown to the catalog (NotFound), pc2 still counts
        let carol = engine.fetch_user_tracks("carol").await.unwrap();
        assert_eq!(carol.iter().collect::<Vec<_>>(), vec!["t9"]);
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let catalog = alice_and_bob()
            .playlist_listing("pb1", Err(CatalogError::Auth("token revoked".into())));
        let engine = OverlapEngine::new(catalog, OverlapOptions::default());

        let err = engine.find_overlap(&users(&["alice", "bob"])).await.unwrap_err();
        assert_eq!(err, CatalogError::Auth("token revoked".into()));
    }

    #[tokio::test]
    async fn test_malformed_batch_truncates_results() {
        let mut catalog = FakeCatalog::default().user("solo", &["p"]);
        let ids: Vec<String> = (0..30).map(|i| format!("t{:02}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        catalog = catalog.playlist("p", &refs);
        for id in &ids {
            catalog = catalog.named(id, &format!("Song {}", id));
        }
        catalog.malformed_lookups = vec![1];

        let engine = OverlapEngine::new(catalog, OverlapOptions::default());
        let report = engine.run(&users(&["solo"])).await.unwrap();

        assert!(report.truncated);
        assert_eq!(report.overlap_ids.len(), 30);
        assert_eq!(report.names.len(), 25);
        let expected: BTreeSet<String> =
            ids[..25].iter().map(|id| format!("Song {}", id)).collect();
        assert_eq!(report.names, expected);

        let lookups = engine.source().lookups();
        assert_eq!(lookups.len(), 2);
        assert_eq!(lookups[0].len(), 25);
        assert_eq!(lookups[1].len(), 5);
    }

    #[tokio::test]
    async fn test_batches_follow_configured_size() {
        let engine = OverlapEngine::new(
            alice_and_bob(),
            OverlapOptions::default().with_batch_size(1),
        );
        engine.find_overlap(&users(&["alice", "bob"])).await.unwrap();
        assert_eq!(engine.source().lookups(), vec![vec!["t2"], vec!["t3"]]);
    }

    #[tokio::test]
    async fn test_duplicate_names_collapse() {
        let catalog = FakeCatalog::default()
            .user("solo", &["p"])
            .playlist("p", &["a", "b"])
            .named("a", "Intro")
            .named("b", "Intro");
        let engine = OverlapEngine::new(catalog, OverlapOptions::default());
        let report = engine.run(&users(&["solo"])).await.unwrap();
        assert_eq!(report.overlap_ids.len(), 2);
        assert_eq!(report.names, BTreeSet::from(["Intro".to_string()]));
    }

    #[tokio::test]
    async fn test_invalid_user_fails_before_fetching() {
        let engine = OverlapEngine::new(alice_and_bob(), OverlapOptions::default());
        let err = engine
            .find_overlap(&users(&["alice", "ghost"]))
            .await
            .unwrap_err();
        assert_eq!(err, CatalogError::InvalidUser("ghost".into()));
        // two existence checks, no listing
        assert_eq!(engine.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_unvalidated_unknown_user_has_empty_universe() {
        let engine = OverlapEngine::new(
            alice_and_bob(),
            OverlapOptions::default().with_validate_users(false),
        );
        let report = engine.run(&users(&["alice", "ghost"])).await.unwrap();
        assert!(report.overlap_ids.is_empty());
        assert!(report.names.is_empty());
        assert!(engine.source().lookups().is_empty());
    }

    #[tokio::test]
    async fn test_same_input_same_output() {
        let engine = OverlapEngine::new(alice_and_bob(), OverlapOptions::default());
        let group = users(&["bob", "alice"]);
        let first = engine.find_overlap(&group).await.unwrap();
        let second = engine.find_overlap(&group).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_counter_threshold() {
        let mut counter = OccurrenceCounter::new();
        counter.add_universe(&TrackUniverse::from_iter(["x".to_string(), "y".to_string()]));
        counter.add_universe(&TrackUniverse::from_iter(["y".to_string()]));

        assert_eq!(counter.len(), 2);
        assert_eq!(counter.overlap(0), Vec::<String>::new());
        assert_eq!(counter.overlap(1), vec!["x", "y"]);
        assert_eq!(counter.overlap(2), vec!["y"]);
        assert!(counter.overlap(3).is_empty());
        assert_eq!(counter.count("z"), 0);
    }

    #[test]
    fn test_batches_concatenate_back() {
        for len in 0..=80 {
            let items: Vec<usize> = (0..len).collect();
            let chunks: Vec<&[usize]> = batches(&items, MAX_BATCH_SIZE).collect();

            assert_eq!(chunks.len(), len.div_ceil(MAX_BATCH_SIZE));
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= MAX_BATCH_SIZE));
            assert_eq!(chunks.concat(), items);
        }
    }

    #[test]
    fn test_options_clamp_batch_size() {
        assert_eq!(OverlapOptions::default().with_batch_size(0).batch_size, 1);
        assert_eq!(OverlapOptions::default().with_batch_size(100).batch_size, MAX_BATCH_SIZE);
        assert_eq!(OverlapOptions::default().with_batch_size(10).batch_size, 10);
    }

    #[test]
    fn test_options_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(OverlapOptions::from_config(&config), OverlapOptions::default());

        config.set_overlap_batch_size(40).unwrap();
        config.set_overlap_validate_users(false).unwrap();
        let options = OverlapOptions::from_config(&config);
        assert_eq!(options.batch_size, MAX_BATCH_SIZE);
        assert!(!options.validate_users);
    }
}
