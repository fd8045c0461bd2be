//! # Store Module
//!
//! SQLite-backed library store. It owns the schema and the single connection,
//! and every write that must hit the canonical copy of a row (listen counts,
//! playlist membership, follow edges) goes through here.
//!
//! ## Schema
//!
//! ```text
//! users(username)                      genre(genre_id, genre_name)
//! song(song_id, title, length, release_date, genre_id, num_listens)
//! song_by_artist(song_id, artist_name) album(album_id, name, release_date)
//! song_on_album(song_id, album_id, track_number)
//! playlist(playlist_name, username)    song_on_playlist(song_id, playlist_name, username)
//! following(follower_un, followed_un)  user_listens_song(username, song_id, date_listened)
//! ```
//!
//! Browsing and sampling queries live in [`crate::provider`]; aggregation
//! queries used by the merger are exposed through [`RankSource`].

use crate::error::{DotifyError, Result};
use crate::merge::{RankEntry, RankGroup, RankSource, RankStream};
use crate::song::{Song, SONG_COLUMNS, SONG_JOIN};
use log::{debug, trace};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        username    TEXT PRIMARY KEY,
        created_at  TEXT NOT NULL DEFAULT (datetime('now')),
        last_access TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE TABLE IF NOT EXISTS genre (
        genre_id   INTEGER PRIMARY KEY,
        genre_name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS album (
        album_id     INTEGER PRIMARY KEY,
        name         TEXT NOT NULL,
        release_date TEXT
    );
    CREATE TABLE IF NOT EXISTS song (
        song_id      INTEGER PRIMARY KEY,
        title        TEXT NOT NULL,
        length       INTEGER NOT NULL CHECK (length >= 0),
        release_date TEXT NOT NULL,
        genre_id     INTEGER NOT NULL,
        num_listens  INTEGER NOT NULL DEFAULT 0 CHECK (num_listens >= 0)
    );
    CREATE TABLE IF NOT EXISTS song_by_artist (
        song_id     INTEGER NOT NULL,
        artist_name TEXT NOT NULL,
        PRIMARY KEY (song_id, artist_name)
    );
    CREATE TABLE IF NOT EXISTS song_on_album (
        song_id      INTEGER NOT NULL,
        album_id     INTEGER NOT NULL,
        track_number INTEGER,
        PRIMARY KEY (song_id, album_id)
    );
    CREATE TABLE IF NOT EXISTS playlist (
        playlist_name TEXT NOT NULL,
        username      TEXT NOT NULL,
        PRIMARY KEY (playlist_name, username)
    );
    CREATE TABLE IF NOT EXISTS song_on_playlist (
        song_id       INTEGER NOT NULL,
        playlist_name TEXT NOT NULL,
        username      TEXT NOT NULL,
        PRIMARY KEY (song_id, playlist_name, username)
    );
    CREATE TABLE IF NOT EXISTS following (
        follower_un TEXT NOT NULL,
        followed_un TEXT NOT NULL,
        PRIMARY KEY (follower_un, followed_un)
    );
    CREATE TABLE IF NOT EXISTS user_listens_song (
        username      TEXT NOT NULL,
        song_id       INTEGER NOT NULL,
        date_listened TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_listens_user ON user_listens_song(username);
    CREATE INDEX IF NOT EXISTS idx_listens_song ON user_listens_song(song_id);
    CREATE INDEX IF NOT EXISTS idx_sba_artist ON song_by_artist(artist_name);
    CREATE INDEX IF NOT EXISTS idx_song_genre ON song(genre_id);
";

const LISTENS_BY_ARTIST: &str = "SELECT sba.artist_name, COUNT(*) AS total
     FROM song_by_artist sba JOIN user_listens_song uls ON uls.song_id = sba.song_id
     WHERE uls.username = ?1 GROUP BY sba.artist_name";

const PLAYLIST_OCCURRENCES_BY_ARTIST: &str = "SELECT sba.artist_name, COUNT(*) AS total
     FROM song_by_artist sba JOIN song_on_playlist sop ON sop.song_id = sba.song_id
     WHERE sop.username = ?1 GROUP BY sba.artist_name";

/// SQLite integers are signed; row counts and limits never get near the edge.
pub(crate) fn sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn score(total: i64) -> u64 {
    u64::try_from(total).unwrap_or_default()
}

/// Handle to the library database.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and make sure the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening library database at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Throwaway store, used by tests and benchmarks.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub(crate) const fn conn(&self) -> &Connection {
        &self.conn
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Make sure `username` exists and stamp its last access.
    pub fn ensure_user(&self, username: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (username) VALUES (?1)
             ON CONFLICT(username) DO UPDATE SET last_access = datetime('now')",
            [username],
        )?;
        Ok(())
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn usernames(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached("SELECT username FROM users ORDER BY username")?;
        let users = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(users)
    }

    fn require_user(&self, username: &str) -> Result<()> {
        if self.user_exists(username)? {
            Ok(())
        } else {
            Err(DotifyError::NotFound { kind: "user", name: username.to_string() })
        }
    }

    // ------------------------------------------------------------------
    // Listens
    // ------------------------------------------------------------------

    /// Record that `username` listened to `song_id`.
    ///
    /// The history insert and the counter bump share one transaction, and the
    /// bump is a relative `num_listens + 1` so it never works from a stale copy.
    pub fn register_listen(&self, username: &str, song_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO user_listens_song (username, song_id) VALUES (?1, ?2)",
            params![username, song_id],
        )?;
        let updated = tx.execute(
            "UPDATE song SET num_listens = num_listens + 1 WHERE song_id = ?1",
            [song_id],
        )?;
        if updated == 0 {
            return Err(DotifyError::NotFound { kind: "song", name: song_id.to_string() });
        }
        tx.commit()?;
        trace!("{username} listened to song {song_id}");
        Ok(())
    }

    /// Every song `username` has listened to, one entry per listen.
    pub fn listen_history(&self, username: &str) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT song_id FROM user_listens_song WHERE username = ?1")?;
        let history = stmt
            .query_map([username], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(history)
    }

    /// Users other than `username` who listened to at least one song
    /// `username` also listened to, sorted by name.
    pub fn users_sharing_listens(&self, username: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT username FROM user_listens_song
             WHERE username <> ?1
               AND song_id IN (SELECT song_id FROM user_listens_song WHERE username = ?1)
             ORDER BY username",
        )?;
        let users = stmt
            .query_map([username], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    pub fn playlist_exists(&self, owner: &str, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM playlist WHERE playlist_name = ?1 AND username = ?2",
                params![name, owner],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn require_playlist(&self, owner: &str, name: &str) -> Result<()> {
        if self.playlist_exists(owner, name)? {
            Ok(())
        } else {
            Err(DotifyError::NotFound { kind: "playlist", name: name.to_string() })
        }
    }

    /// Playlist names are unique per owner.
    pub fn create_playlist(&self, owner: &str, name: &str) -> Result<()> {
        if self.playlist_exists(owner, name)? {
            return Err(DotifyError::AlreadyExists { kind: "playlist", name: name.to_string() });
        }
        self.conn.execute(
            "INSERT INTO playlist (playlist_name, username) VALUES (?1, ?2)",
            params![name, owner],
        )?;
        debug!("Created playlist '{name}' for {owner}");
        Ok(())
    }

    pub fn rename_playlist(&self, owner: &str, name: &str, new_name: &str) -> Result<()> {
        self.require_playlist(owner, name)?;
        if name != new_name && self.playlist_exists(owner, new_name)? {
            return Err(DotifyError::AlreadyExists { kind: "playlist", name: new_name.to_string() });
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE playlist SET playlist_name = ?1 WHERE playlist_name = ?2 AND username = ?3",
            params![new_name, name, owner],
        )?;
        tx.execute(
            "UPDATE song_on_playlist SET playlist_name = ?1 WHERE playlist_name = ?2 AND username = ?3",
            params![new_name, name, owner],
        )?;
        tx.commit()?;
        debug!("Renamed playlist '{name}' to '{new_name}' for {owner}");
        Ok(())
    }

    pub fn delete_playlist(&self, owner: &str, name: &str) -> Result<()> {
        self.require_playlist(owner, name)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM song_on_playlist WHERE playlist_name = ?1 AND username = ?2",
            params![name, owner],
        )?;
        tx.execute(
            "DELETE FROM playlist WHERE playlist_name = ?1 AND username = ?2",
            params![name, owner],
        )?;
        tx.commit()?;
        debug!("Deleted playlist '{name}' of {owner}");
        Ok(())
    }

    /// Add `song_id` (or, with `album_id`, every song on that album) to a
    /// playlist. Songs already present are left alone. Returns how many rows
    /// were inserted.
    pub fn add_to_playlist(
        &self,
        owner: &str,
        name: &str,
        song_id: i64,
        album_id: Option<i64>,
    ) -> Result<usize> {
        self.require_playlist(owner, name)?;
        let added = match album_id {
            Some(album_id) => self.conn.execute(
                "INSERT INTO song_on_playlist (song_id, playlist_name, username)
                 SELECT song_id, ?2, ?3 FROM song_on_album WHERE album_id = ?1
                 ON CONFLICT DO NOTHING",
                params![album_id, name, owner],
            )?,
            None => self.conn.execute(
                "INSERT INTO song_on_playlist (song_id, playlist_name, username)
                 VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
                params![song_id, name, owner],
            )?,
        };
        trace!("Added {added} song(s) to '{name}' of {owner}");
        Ok(added)
    }

    /// Mirror of [`Store::add_to_playlist`]. Returns how many rows were removed.
    pub fn remove_from_playlist(
        &self,
        owner: &str,
        name: &str,
        song_id: i64,
        album_id: Option<i64>,
    ) -> Result<usize> {
        self.require_playlist(owner, name)?;
        let removed = match album_id {
            Some(album_id) => self.conn.execute(
                "DELETE FROM song_on_playlist
                 WHERE playlist_name = ?2 AND username = ?3
                   AND song_id IN (SELECT song_id FROM song_on_album WHERE album_id = ?1)",
                params![album_id, name, owner],
            )?,
            None => self.conn.execute(
                "DELETE FROM song_on_playlist
                 WHERE song_id = ?1 AND playlist_name = ?2 AND username = ?3",
                params![song_id, name, owner],
            )?,
        };
        trace!("Removed {removed} song(s) from '{name}' of {owner}");
        Ok(removed)
    }

    /// Register one listen by `listener` for every song on the playlist.
    /// Returns the number of songs played.
    pub fn listen_to_playlist(&self, owner: &str, name: &str, listener: &str) -> Result<usize> {
        self.require_playlist(owner, name)?;
        let songs: Vec<i64> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT song_id FROM song_on_playlist WHERE playlist_name = ?1 AND username = ?2
                 ORDER BY song_id",
            )?;
            let ids = stmt
                .query_map(params![name, owner], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            ids
        };
        for song_id in &songs {
            self.register_listen(listener, *song_id)?;
        }
        Ok(songs.len())
    }

    // ------------------------------------------------------------------
    // Follow edges
    // ------------------------------------------------------------------

    /// Returns `false` when `follower` already followed `followed`.
    pub fn follow(&self, follower: &str, followed: &str) -> Result<bool> {
        self.require_user(followed)?;
        let inserted = self.conn.execute(
            "INSERT INTO following (follower_un, followed_un) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![follower, followed],
        )?;
        Ok(inserted > 0)
    }

    /// Returns `false` when there was nothing to unfollow.
    pub fn unfollow(&self, follower: &str, followed: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM following WHERE follower_un = ?1 AND followed_un = ?2",
            params![follower, followed],
        )?;
        Ok(deleted > 0)
    }

    /// Users `follower` follows, in the order the edge table returns them.
    pub fn followed_by(&self, follower: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT followed_un FROM following WHERE follower_un = ?1")?;
        let followed = stmt
            .query_map([follower], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(followed)
    }

    // ------------------------------------------------------------------
    // Profile counters and charts
    // ------------------------------------------------------------------

    fn count_where(&self, sql: &str, username: &str) -> Result<u32> {
        Ok(self.conn.query_row(sql, [username], |row| row.get(0))?)
    }

    pub fn playlist_count(&self, username: &str) -> Result<u32> {
        self.count_where("SELECT COUNT(*) FROM playlist WHERE username = ?1", username)
    }

    pub fn following_count(&self, username: &str) -> Result<u32> {
        self.count_where("SELECT COUNT(*) FROM following WHERE follower_un = ?1", username)
    }

    pub fn follower_count(&self, username: &str) -> Result<u32> {
        self.count_where("SELECT COUNT(*) FROM following WHERE followed_un = ?1", username)
    }

    /// Titles of songs listened to in the last 30 days, ranked by their global
    /// listen counter.
    pub fn top_songs_last_30_days(&self, limit: usize) -> Result<RankStream<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT title, num_listens FROM song
             WHERE song_id IN (SELECT song_id FROM user_listens_song
                               WHERE date_listened >= datetime('now', '-30 days'))
             ORDER BY num_listens DESC, title ASC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map([sql_int(limit)], |row| {
                Ok(RankEntry::new(row.get::<_, String>(0)?, score(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(RankStream::from_entries(entries))
    }

    /// Genres ranked by the summed listen counters of their songs that were
    /// listened to during the current calendar month.
    pub fn top_genres_this_month(&self, limit: usize) -> Result<RankStream<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT g.genre_name, SUM(s.num_listens) AS genre_listens
             FROM song s JOIN genre g ON g.genre_id = s.genre_id
             WHERE s.song_id IN (SELECT song_id FROM user_listens_song
                                 WHERE strftime('%Y-%m', date_listened) = strftime('%Y-%m', 'now'))
             GROUP BY g.genre_id
             ORDER BY genre_listens DESC, g.genre_name ASC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map([sql_int(limit)], |row| {
                Ok(RankEntry::new(row.get::<_, String>(0)?, score(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(RankStream::from_entries(entries))
    }

    /// Canonical row for `song_id`. A song with several artists or albums
    /// resolves to its first pairing.
    pub fn song(&self, song_id: i64) -> Result<Song> {
        let sql = format!(
            "SELECT {SONG_COLUMNS} FROM {SONG_JOIN} WHERE s.song_id = ?1
             ORDER BY sba.artist_name ASC, a.album_id ASC LIMIT 1"
        );
        self.conn
            .query_row(&sql, [song_id], Song::from_row)
            .optional()?
            .ok_or_else(|| DotifyError::NotFound { kind: "song", name: song_id.to_string() })
    }
}

impl RankSource for Store {
    fn aggregate_scores(&self, group: RankGroup, username: &str) -> Result<RankStream<String>> {
        let sql = match group {
            RankGroup::ListensByArtist => {
                format!("{LISTENS_BY_ARTIST} ORDER BY total DESC, sba.artist_name ASC")
            }
            RankGroup::PlaylistOccurrencesByArtist => {
                format!("{PLAYLIST_OCCURRENCES_BY_ARTIST} ORDER BY total DESC, sba.artist_name ASC")
            }
            RankGroup::CombinedByArtist => format!(
                "SELECT l.artist_name, l.total + p.total AS total
                 FROM ({LISTENS_BY_ARTIST}) l
                 JOIN ({PLAYLIST_OCCURRENCES_BY_ARTIST}) p ON p.artist_name = l.artist_name
                 ORDER BY total DESC, l.artist_name ASC"
            ),
        };
        trace!("Aggregating {group:?} for {username}");

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let entries = stmt
            .query_map([username], |row| {
                Ok(RankEntry::new(row.get::<_, String>(0)?, score(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(RankStream::from_entries(entries))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-built library shared by unit tests across modules.

    use super::Store;

    /// Songs 1-6, three artists, two genres, users ann/bob/cat/dan.
    pub fn library() -> Store {
        let store = Store::open_in_memory().expect("in-memory store");
        store
            .conn()
            .execute_batch(
                "INSERT INTO genre VALUES (1, 'Jazz'), (2, 'Rock');
                 INSERT INTO album VALUES (1, 'Kind of Blue', '1959-08-17'), (2, 'Houses', '1973-03-28');
                 INSERT INTO song VALUES
                    (1, 'So What', 562, '1959-08-17', 1, 0),
                    (2, 'Blue in Green', 337, '1959-08-17', 1, 0),
                    (3, 'All Blues', 693, '1959-08-17', 1, 0),
                    (4, 'The Song Remains', 330, '1973-03-28', 2, 0),
                    (5, 'The Rain Song', 459, '1973-03-28', 2, 0),
                    (6, 'Flamenco Sketches', 566, '1959-08-17', 1, 0);
                 INSERT INTO song_by_artist VALUES
                    (1, 'Miles Davis'), (2, 'Miles Davis'), (3, 'Miles Davis'),
                    (4, 'Led Zeppelin'), (5, 'Led Zeppelin'), (6, 'Bill Evans');
                 INSERT INTO song_on_album VALUES
                    (1, 1, 1), (2, 1, 3), (3, 1, 4), (6, 1, 5), (4, 2, 1), (5, 2, 2);
                 INSERT INTO users (username) VALUES ('ann'), ('bob'), ('cat'), ('dan');",
            )
            .expect("fixture rows");
        store
    }
}
