//! # Ordered Result Providers
//!
//! An [`OrderedResultProvider`] is a filter plus an ordering bound to the
//! store. It never holds rows itself: every call re-queries, so a browse
//! session always reads the canonical copy.
//!
//! Implementations:
//!
//! - [`SongSearch`]: songs matching a [`SongFilter`], ordered by [`SongOrdering`]
//! - [`PlaylistListing`]: playlists owned by a user
//! - [`FollowListing`]: who a user follows, or who follows them
//! - [`SampledSongs`]: a fixed random sample, used by recommendations

use crate::db::{sql_int, Store};
use crate::error::{DotifyError, Result};
use crate::song::{Song, SONG_COLUMNS, SONG_JOIN};
use log::trace;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read side and write side of a browsable result set.
///
/// Positions handed to [`fetch_by_absolute_position`] are 1-based; offsets
/// handed to [`fetch_range`] are 0-based.
///
/// [`fetch_by_absolute_position`]: OrderedResultProvider::fetch_by_absolute_position
/// [`fetch_range`]: OrderedResultProvider::fetch_range
pub trait OrderedResultProvider {
    type Row;
    type Mutation;

    /// Total number of rows the filter matches.
    fn count(&self) -> Result<usize>;

    /// Up to `len` rows starting at offset `start`, in order.
    fn fetch_range(&self, start: usize, len: usize) -> Result<Vec<Self::Row>>;

    /// The row at 1-based `position`.
    ///
    /// # Errors
    ///
    /// [`DotifyError::OutOfRange`] when no row sits at `position`.
    fn fetch_by_absolute_position(&self, position: usize) -> Result<Self::Row> {
        if position == 0 {
            return Err(DotifyError::OutOfRange { index: 0, len: self.count()? });
        }
        match self.fetch_range(position - 1, 1)?.into_iter().next() {
            Some(row) => Ok(row),
            None => Err(DotifyError::OutOfRange { index: position, len: self.count()? }),
        }
    }

    /// Apply `mutation` to the canonical copy of `row`. Returns `false` when
    /// the store was already in the requested state.
    fn mutate(&self, row: &Self::Row, mutation: &Self::Mutation) -> Result<bool>;

    /// Up to `limit` matching rows in random order.
    fn sample_random(&self, limit: usize) -> Result<Vec<Self::Row>>;
}

// ----------------------------------------------------------------------
// Songs
// ----------------------------------------------------------------------

/// Which songs a [`SongSearch`] matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongFilter {
    /// Substring of the title.
    Title(String),
    /// Substring of any credited artist.
    Artist(String),
    /// Substring of the album name.
    Album(String),
    /// Substring of the genre name.
    Genre(String),
    OnPlaylist { owner: String, name: String },
    /// Other songs in the genre of `song_id`.
    SameGenreAs { song_id: i64 },
    /// Other songs by any artist credited on `song_id`.
    SameArtistAs { song_id: i64 },
    /// Songs `username` has listened to, optionally leaving one out.
    ListenedBy { username: String, excluding: Option<i64> },
}

impl SongFilter {
    fn where_clause(&self) -> (&'static str, Vec<Value>) {
        match self {
            Self::Title(text) => ("s.title LIKE ?", vec![like(text)]),
            Self::Artist(text) => ("sba.artist_name LIKE ?", vec![like(text)]),
            Self::Album(text) => ("a.name LIKE ?", vec![like(text)]),
            Self::Genre(text) => ("g.genre_name LIKE ?", vec![like(text)]),
            Self::OnPlaylist { owner, name } => (
                "s.song_id IN (SELECT song_id FROM song_on_playlist \
                 WHERE playlist_name = ? AND username = ?)",
                vec![Value::Text(name.clone()), Value::Text(owner.clone())],
            ),
            Self::SameGenreAs { song_id } => (
                "s.genre_id = (SELECT genre_id FROM song WHERE song_id = ?) AND s.song_id <> ?",
                vec![Value::Integer(*song_id), Value::Integer(*song_id)],
            ),
            Self::SameArtistAs { song_id } => (
                "sba.artist_name IN (SELECT artist_name FROM song_by_artist WHERE song_id = ?) \
                 AND s.song_id <> ?",
                vec![Value::Integer(*song_id), Value::Integer(*song_id)],
            ),
            Self::ListenedBy { username, excluding } => (
                "s.song_id IN (SELECT song_id FROM user_listens_song WHERE username = ?) \
                 AND s.song_id <> ?",
                // Song ids are positive, so -1 excludes nothing.
                vec![Value::Text(username.clone()), Value::Integer(excluding.unwrap_or(-1))],
            ),
        }
    }
}

fn like(text: &str) -> Value {
    Value::Text(format!("%{text}%"))
}

/// Sort key for song listings. Every ordering ends with the song id so that
/// positions stay stable between fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SongOrdering {
    /// Title, then artist, ascending.
    #[default]
    Default,
    TitleAsc,
    TitleDesc,
    ArtistAsc,
    ArtistDesc,
    GenreAsc,
    GenreDesc,
    ReleaseDateAsc,
    ReleaseDateDesc,
}

impl SongOrdering {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Default => "s.title ASC, sba.artist_name ASC",
            Self::TitleAsc => "s.title ASC",
            Self::TitleDesc => "s.title DESC",
            Self::ArtistAsc => "sba.artist_name ASC",
            Self::ArtistDesc => "sba.artist_name DESC",
            Self::GenreAsc => "g.genre_name ASC",
            Self::GenreDesc => "g.genre_name DESC",
            Self::ReleaseDateAsc => "s.release_date ASC",
            Self::ReleaseDateDesc => "s.release_date DESC",
        }
    }
}

/// What can be done to a selected song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongAction {
    Listen { username: String },
    AddToPlaylist { owner: String, playlist: String, whole_album: bool },
    RemoveFromPlaylist { owner: String, playlist: String, whole_album: bool },
}

fn apply_song_action(store: &Store, song: &Song, action: &SongAction) -> Result<bool> {
    let album = |whole_album: bool| whole_album.then_some(song.album_id);
    match action {
        SongAction::Listen { username } => store.register_listen(username, song.id).map(|()| true),
        SongAction::AddToPlaylist { owner, playlist, whole_album } => {
            Ok(store.add_to_playlist(owner, playlist, song.id, album(*whole_album))? > 0)
        }
        SongAction::RemoveFromPlaylist { owner, playlist, whole_album } => {
            Ok(store.remove_from_playlist(owner, playlist, song.id, album(*whole_album))? > 0)
        }
    }
}

/// Songs matching a filter, in a fixed order.
#[derive(Debug)]
pub struct SongSearch<'a> {
    store: &'a Store,
    filter: SongFilter,
    ordering: SongOrdering,
}

impl<'a> SongSearch<'a> {
    pub const fn new(store: &'a Store, filter: SongFilter, ordering: SongOrdering) -> Self {
        Self { store, filter, ordering }
    }

    pub const fn filter(&self) -> &SongFilter {
        &self.filter
    }

    fn query_songs(&self, tail: &str, extra: Vec<Value>) -> Result<Vec<Song>> {
        let (clause, mut values) = self.filter.where_clause();
        values.extend(extra);
        let sql = format!("SELECT {SONG_COLUMNS} FROM {SONG_JOIN} WHERE {clause} {tail}");
        trace!("Song query: {sql}");

        let mut stmt = self.store.conn().prepare_cached(&sql)?;
        let songs = stmt
            .query_map(params_from_iter(values), Song::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }
}

impl OrderedResultProvider for SongSearch<'_> {
    type Row = Song;
    type Mutation = SongAction;

    fn count(&self) -> Result<usize> {
        let (clause, values) = self.filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM {SONG_JOIN} WHERE {clause}");
        let total: i64 = self
            .store
            .conn()
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(usize::try_from(total).unwrap_or_default())
    }

    fn fetch_range(&self, start: usize, len: usize) -> Result<Vec<Song>> {
        let tail = format!(
            "ORDER BY {}, s.song_id ASC, sba.artist_name ASC, a.album_id ASC LIMIT ? OFFSET ?",
            self.ordering.order_by()
        );
        self.query_songs(&tail, vec![Value::Integer(sql_int(len)), Value::Integer(sql_int(start))])
    }

    fn mutate(&self, row: &Song, mutation: &SongAction) -> Result<bool> {
        apply_song_action(self.store, row, mutation)
    }

    fn sample_random(&self, limit: usize) -> Result<Vec<Song>> {
        self.query_songs("ORDER BY RANDOM() LIMIT ?", vec![Value::Integer(sql_int(limit))])
    }
}

/// A fixed set of already-sampled songs presented as one browse session.
///
/// Selection re-reads the song from the store so counters are current.
#[derive(Debug)]
pub struct SampledSongs<'a> {
    store: &'a Store,
    rows: Vec<Song>,
}

impl<'a> SampledSongs<'a> {
    pub const fn new(store: &'a Store, rows: Vec<Song>) -> Self {
        Self { store, rows }
    }
}

impl OrderedResultProvider for SampledSongs<'_> {
    type Row = Song;
    type Mutation = SongAction;

    fn count(&self) -> Result<usize> {
        Ok(self.rows.len())
    }

    fn fetch_range(&self, start: usize, len: usize) -> Result<Vec<Song>> {
        Ok(self.rows.iter().skip(start).take(len).cloned().collect())
    }

    fn fetch_by_absolute_position(&self, position: usize) -> Result<Song> {
        let sampled = position
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .ok_or(DotifyError::OutOfRange { index: position, len: self.rows.len() })?;
        self.store.song(sampled.id)
    }

    fn mutate(&self, row: &Song, mutation: &SongAction) -> Result<bool> {
        apply_song_action(self.store, row, mutation)
    }

    /// The rows are already a random draw, so any prefix of them is too.
    fn sample_random(&self, limit: usize) -> Result<Vec<Song>> {
        Ok(self.rows.iter().take(limit).cloned().collect())
    }
}

// ----------------------------------------------------------------------
// Playlists
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub name: String,
    pub owner: String,
    pub song_count: u32,
    pub total_length_secs: u32,
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} songs, {}m {}s)",
            self.name,
            self.song_count,
            self.total_length_secs / 60,
            self.total_length_secs % 60
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistAction {
    Rename(String),
    Delete,
    /// Register one listen per song for `username`.
    Listen { username: String },
}

/// Playlists of one owner, by name, as seen by `viewer`.
///
/// Only the owner may rename or delete; anyone may listen.
#[derive(Debug)]
pub struct PlaylistListing<'a> {
    store: &'a Store,
    owner: String,
    viewer: String,
}

impl<'a> PlaylistListing<'a> {
    pub fn new(store: &'a Store, owner: impl Into<String>, viewer: impl Into<String>) -> Self {
        Self { store, owner: owner.into(), viewer: viewer.into() }
    }

    fn check_owner(&self, playlist: &Playlist) -> Result<()> {
        if playlist.owner == self.viewer {
            return Ok(());
        }
        Err(DotifyError::NotOwner { name: playlist.name.clone(), owner: playlist.owner.clone() })
    }

    fn query_playlists(&self, tail: &str, limit: usize, offset: usize) -> Result<Vec<Playlist>> {
        let sql = format!(
            "SELECT p.playlist_name, p.username, COUNT(s.song_id), COALESCE(SUM(s.length), 0)
             FROM playlist p
             LEFT JOIN song_on_playlist sop
                    ON sop.playlist_name = p.playlist_name AND sop.username = p.username
             LEFT JOIN song s ON s.song_id = sop.song_id
             WHERE p.username = ?1
             GROUP BY p.playlist_name, p.username
             {tail} LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = self.store.conn().prepare_cached(&sql)?;
        let playlists = stmt
            .query_map(params![self.owner, sql_int(limit), sql_int(offset)], |row| {
                Ok(Playlist {
                    name: row.get(0)?,
                    owner: row.get(1)?,
                    song_count: row.get(2)?,
                    total_length_secs: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }
}

impl OrderedResultProvider for PlaylistListing<'_> {
    type Row = Playlist;
    type Mutation = PlaylistAction;

    fn count(&self) -> Result<usize> {
        Ok(self.store.playlist_count(&self.owner)? as usize)
    }

    fn fetch_range(&self, start: usize, len: usize) -> Result<Vec<Playlist>> {
        self.query_playlists("ORDER BY p.playlist_name ASC", len, start)
    }

    fn mutate(&self, row: &Playlist, mutation: &PlaylistAction) -> Result<bool> {
        match mutation {
            PlaylistAction::Rename(new_name) => {
                self.check_owner(row)?;
                self.store.rename_playlist(&row.owner, &row.name, new_name)?;
                Ok(true)
            }
            PlaylistAction::Delete => {
                self.check_owner(row)?;
                self.store.delete_playlist(&row.owner, &row.name)?;
                Ok(true)
            }
            PlaylistAction::Listen { username } => {
                Ok(self.store.listen_to_playlist(&row.owner, &row.name, username)? > 0)
            }
        }
    }

    fn sample_random(&self, limit: usize) -> Result<Vec<Playlist>> {
        self.query_playlists("ORDER BY RANDOM()", limit, 0)
    }
}

// ----------------------------------------------------------------------
// Follow edges
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDirection {
    /// Users the listing's owner follows.
    Following,
    /// Users following the listing's owner.
    Followers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowEntry {
    pub username: String,
}

impl fmt::Display for FollowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Edge changes between `follower` and the selected row's user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowAction {
    Unfollow { follower: String },
    Follow { follower: String },
}

#[derive(Debug)]
pub struct FollowListing<'a> {
    store: &'a Store,
    username: String,
    direction: FollowDirection,
}

impl<'a> FollowListing<'a> {
    pub fn new(store: &'a Store, username: impl Into<String>, direction: FollowDirection) -> Self {
        Self { store, username: username.into(), direction }
    }

    const fn select_sql(&self) -> &'static str {
        match self.direction {
            FollowDirection::Following => "SELECT followed_un FROM following WHERE follower_un = ?1",
            FollowDirection::Followers => "SELECT follower_un FROM following WHERE followed_un = ?1",
        }
    }

    fn query_entries(&self, tail: &str, limit: usize, offset: usize) -> Result<Vec<FollowEntry>> {
        let sql = format!("{} {tail} LIMIT ?2 OFFSET ?3", self.select_sql());
        let mut stmt = self.store.conn().prepare_cached(&sql)?;
        let entries = stmt
            .query_map(params![self.username, sql_int(limit), sql_int(offset)], |row| {
                Ok(FollowEntry { username: row.get(0)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl OrderedResultProvider for FollowListing<'_> {
    type Row = FollowEntry;
    type Mutation = FollowAction;

    fn count(&self) -> Result<usize> {
        let total = match self.direction {
            FollowDirection::Following => self.store.following_count(&self.username)?,
            FollowDirection::Followers => self.store.follower_count(&self.username)?,
        };
        Ok(total as usize)
    }

    fn fetch_range(&self, start: usize, len: usize) -> Result<Vec<FollowEntry>> {
        self.query_entries("ORDER BY 1 ASC", len, start)
    }

    fn mutate(&self, row: &FollowEntry, mutation: &FollowAction) -> Result<bool> {
        match mutation {
            FollowAction::Unfollow { follower } => self.store.unfollow(follower, &row.username),
            FollowAction::Follow { follower } => self.store.follow(follower, &row.username),
        }
    }

    fn sample_random(&self, limit: usize) -> Result<Vec<FollowEntry>> {
        self.query_entries("ORDER BY RANDOM()", limit, 0)
    }
}
