use std::fmt;

/// How a song, joined with its artist, album and genre, comes out of the store.
///
/// A song credited to several artists (or on several albums) shows up once per
/// pairing, the same way the join does.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: i64,
    pub title: String,
    /// Length in seconds.
    pub length_secs: u32,
    /// `YYYY-MM-DD`, as stored.
    pub release_date: String,
    /// Global listen counter, bumped on every registered listen.
    pub listens: u32,
    pub genre: String,
    pub artist: String,
    pub album_id: i64,
    pub album: String,
}

/// Column list every song query selects, in the order [`Song::from_row`] reads.
pub(crate) const SONG_COLUMNS: &str = "s.song_id, s.title, s.length, s.release_date, \
     s.num_listens, g.genre_name, sba.artist_name, a.album_id, a.name";

/// Tables and join conditions behind [`SONG_COLUMNS`].
pub(crate) const SONG_JOIN: &str = "song s \
     JOIN song_by_artist sba ON sba.song_id = s.song_id \
     JOIN song_on_album soa ON soa.song_id = s.song_id \
     JOIN album a ON a.album_id = soa.album_id \
     JOIN genre g ON g.genre_id = s.genre_id";

impl Song {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            length_secs: row.get(2)?,
            release_date: row.get(3)?,
            listens: row.get(4)?,
            genre: row.get(5)?,
            artist: row.get(6)?,
            album_id: row.get(7)?,
            album: row.get(8)?,
        })
    }

    /// `(minutes, seconds)`
    #[must_use]
    pub const fn length(&self) -> (u32, u32) {
        (self.length_secs / 60, self.length_secs % 60)
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (minutes, seconds) = self.length();
        write!(
            f,
            "{} by {}, Album: {}, Length: {minutes}m {seconds}s, Listen Count: {}, Release Date: {}, Genre: {}",
            self.title, self.artist, self.album, self.listens, self.release_date, self.genre
        )
    }
}
