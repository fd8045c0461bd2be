//! # Engine
//!
//! The operations the shell calls. An [`Engine`] owns the [`Store`], the
//! [`RuntimeConfig`] and the [`Session`] of whoever is using it; every
//! operation that acts "as the user" reads the identity from the session
//! instead of from global state.
//!
//! Browse sessions borrow the engine's store, so they live no longer than the
//! engine that opened them.

use crate::browser::Browser;
use crate::config::RuntimeConfig;
use crate::db::Store;
use crate::error::{DotifyError, Result};
use crate::friends;
use crate::merge::{
    extract_top_k, merge_streams, MergedEntry, RankEntry, RankGroup, RankSource, RankStream, TopK,
};
use crate::provider::{
    FollowDirection, FollowListing, PlaylistListing, SongFilter, SongOrdering, SongSearch,
};
use crate::recommend::{self, Recommendation};
use crate::song::Song;
use log::{debug, info};
use rand::Rng;

/// Who is logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
}

impl Session {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }
}

/// Profile statistics for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub playlists: u32,
    pub following: u32,
    pub followers: u32,
    pub top_by_listens: RankStream<String>,
    pub top_by_playlists: RankStream<String>,
    pub top_combined: Vec<MergedEntry<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charts {
    pub top_songs_last_30_days: RankStream<String>,
    pub top_genres_this_month: RankStream<String>,
}

pub const CHART_SONGS: usize = 50;
pub const CHART_GENRES: usize = 5;

#[derive(Debug)]
pub struct Engine {
    store: Store,
    config: RuntimeConfig,
    session: Session,
}

impl Engine {
    /// Open the configured database and make sure the session user exists.
    pub fn open(config: RuntimeConfig, session: Session) -> Result<Self> {
        let store = Store::open(&config.db_path)?;
        Self::new(store, config, session)
    }

    pub fn new(store: Store, config: RuntimeConfig, session: Session) -> Result<Self> {
        store.ensure_user(&session.username)?;
        info!("Session started for {}", session.username);
        Ok(Self { store, config, session })
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    fn me(&self) -> &str {
        &self.session.username
    }

    // ------------------------------------------------------------------
    // Browse sessions
    // ------------------------------------------------------------------

    /// Songs matching `filter`. Songs of a playlist are a search with
    /// [`SongFilter::OnPlaylist`].
    pub fn open_song_session(
        &self,
        filter: SongFilter,
        ordering: SongOrdering,
    ) -> Result<Browser<SongSearch<'_>>> {
        debug!("Opening song session: {filter:?} by {ordering:?}");
        Browser::open(SongSearch::new(&self.store, filter, ordering), self.config.page_size)
    }

    /// Songs on one of the session user's playlists.
    pub fn open_playlist_songs(
        &self,
        playlist: &str,
        ordering: SongOrdering,
    ) -> Result<Browser<SongSearch<'_>>> {
        if !self.store.playlist_exists(self.me(), playlist)? {
            return Err(DotifyError::NotFound { kind: "playlist", name: playlist.to_string() });
        }
        self.open_song_session(
            SongFilter::OnPlaylist { owner: self.me().to_string(), name: playlist.to_string() },
            ordering,
        )
    }

    /// Playlists owned by `owner`, or by the session user when `None`. Only the
    /// session user's own playlists can be renamed or deleted from here.
    pub fn open_playlists(&self, owner: Option<&str>) -> Result<Browser<PlaylistListing<'_>>> {
        let owner = owner.unwrap_or(self.me());
        Browser::open(PlaylistListing::new(&self.store, owner, self.me()), self.config.page_size)
    }

    pub fn open_follows(
        &self,
        username: Option<&str>,
        direction: FollowDirection,
    ) -> Result<Browser<FollowListing<'_>>> {
        let username = username.unwrap_or(self.me());
        Browser::open(FollowListing::new(&self.store, username, direction), self.config.page_size)
    }

    // ------------------------------------------------------------------
    // Recommendations
    // ------------------------------------------------------------------

    /// Top artists across listens and playlist occurrences.
    pub fn profile_recommendations(&self, username: &str) -> Result<Vec<MergedEntry<String>>> {
        let combined = self.store.aggregate_scores(RankGroup::CombinedByArtist, username)?;
        let playlist = self.store.aggregate_scores(RankGroup::PlaylistOccurrencesByArtist, username)?;
        let listen = self.store.aggregate_scores(RankGroup::ListensByArtist, username)?;
        Ok(merge_streams(&combined, &playlist, &listen, self.config.profile_top_n))
    }

    /// What the session user's follows listen to most, up to `friend_top_k`
    /// songs. [`TopK::is_short`] tells whether fewer were available.
    pub fn friend_recommendations(&self) -> Result<TopK<Song>> {
        let stream = friends::aggregate(&self.store, self.me())?;
        let top = extract_top_k(stream.into_entries(), self.config.friend_top_k);

        let mut entries = Vec::with_capacity(top.entries.len());
        for entry in top.entries {
            entries.push(RankEntry::new(self.store.song(entry.key)?, entry.score));
        }
        Ok(TopK { entries, requested: top.requested })
    }

    pub fn seed_recommendation(&self, rng: &mut impl Rng) -> Result<Recommendation<'_>> {
        recommend::seed_based(&self.store, self.me(), self.config.recommendation_size, rng)
    }

    pub fn similar_user_recommendation(&self, rng: &mut impl Rng) -> Result<Recommendation<'_>> {
        recommend::similar_user(&self.store, self.me(), self.config.recommendation_size, rng)
    }

    // ------------------------------------------------------------------
    // Profile and charts
    // ------------------------------------------------------------------

    /// Profile of `username`, or of the session user when `None`.
    pub fn profile(&self, username: Option<&str>) -> Result<Profile> {
        let username = username.unwrap_or(self.me());
        let top_n = self.config.profile_top_n;

        let mut top_by_listens = self.store.aggregate_scores(RankGroup::ListensByArtist, username)?;
        let mut top_by_playlists =
            self.store.aggregate_scores(RankGroup::PlaylistOccurrencesByArtist, username)?;
        let top_combined = self.profile_recommendations(username)?;
        top_by_listens.truncate(top_n);
        top_by_playlists.truncate(top_n);

        Ok(Profile {
            username: username.to_string(),
            playlists: self.store.playlist_count(username)?,
            following: self.store.following_count(username)?,
            followers: self.store.follower_count(username)?,
            top_by_listens,
            top_by_playlists,
            top_combined,
        })
    }

    pub fn charts(&self) -> Result<Charts> {
        Ok(Charts {
            top_songs_last_30_days: self.store.top_songs_last_30_days(CHART_SONGS)?,
            top_genres_this_month: self.store.top_genres_this_month(CHART_GENRES)?,
        })
    }

    // ------------------------------------------------------------------
    // Playlists and follows, acting as the session user
    // ------------------------------------------------------------------

    pub fn create_playlist(&self, name: &str) -> Result<()> {
        self.store.create_playlist(self.me(), name)
    }

    pub fn rename_playlist(&self, name: &str, new_name: &str) -> Result<()> {
        self.store.rename_playlist(self.me(), name, new_name)
    }

    pub fn delete_playlist(&self, name: &str) -> Result<()> {
        self.store.delete_playlist(self.me(), name)
    }

    /// Listen to every song on one of the session user's playlists.
    pub fn listen_to_playlist(&self, name: &str) -> Result<usize> {
        self.store.listen_to_playlist(self.me(), name, self.me())
    }

    /// `false` when already following.
    pub fn follow(&self, username: &str) -> Result<bool> {
        self.store.follow(self.me(), username)
    }

    /// `false` when not following.
    pub fn unfollow(&self, username: &str) -> Result<bool> {
        self.store.unfollow(self.me(), username)
    }
}
