//! # Recommendation Selector
//!
//! Two "for you" flows, both starting from a seed song picked at random from
//! the caller's own listen history:
//!
//! - **Seed-based**: a coin flip chooses the axis (same genre or same artist)
//!   and up to `size` other songs on that axis are sampled.
//! - **Similar user**: another user who shares at least one listened song is
//!   picked, and up to `size` of their songs (minus the seed) are sampled.
//!
//! The result is presented as a single-page browse session so the shell can
//! select and act on rows like any other listing. Randomness is injected so
//! callers (and tests) control it.

use crate::browser::Browser;
use crate::db::Store;
use crate::error::{DotifyError, Result};
use crate::provider::{OrderedResultProvider, SampledSongs, SongFilter, SongOrdering, SongSearch};
use crate::song::Song;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    SameGenre { genre: String },
    SameArtist { artist: String },
    SimilarUser { username: String },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameGenre { genre } => write!(f, "more {genre}"),
            Self::SameArtist { artist } => write!(f, "more from {artist}"),
            Self::SimilarUser { username } => write!(f, "what {username} listens to"),
        }
    }
}

#[derive(Debug)]
pub struct Recommendation<'a> {
    pub reason: Reason,
    pub seed: Song,
    pub session: Browser<SampledSongs<'a>>,
}

impl Recommendation<'_> {
    /// Heading line shown above the sampled songs.
    #[must_use]
    pub fn header(&self) -> String {
        match &self.reason {
            Reason::SimilarUser { username } => format!(
                "Found a similar user '{username}' who also listened to '{}'. Here's what they like:",
                self.seed.title
            ),
            reason => format!("Because you listened to '{}' recently ({reason}):", self.seed.title),
        }
    }
}

/// Pick a seed uniformly from `username`'s listen history. Songs listened to
/// more often are proportionally more likely.
///
/// # Errors
///
/// [`DotifyError::NoHistory`] when the user has never listened to anything.
pub fn pick_seed(store: &Store, username: &str, rng: &mut impl Rng) -> Result<Song> {
    let history = store.listen_history(username)?;
    let song_id = *history
        .choose(rng)
        .ok_or_else(|| DotifyError::NoHistory(username.to_string()))?;
    store.song(song_id)
}

fn present<'a>(store: &'a Store, search: &SongSearch<'_>, size: usize) -> Result<Browser<SampledSongs<'a>>> {
    let rows = search.sample_random(size)?;
    debug!("Sampled {} songs for {:?}", rows.len(), search.filter());
    Browser::open(SampledSongs::new(store, rows), size)
}

/// Seed song, coin flip between genre and artist, then up to `size` songs.
pub fn seed_based<'a>(
    store: &'a Store,
    username: &str,
    size: usize,
    rng: &mut impl Rng,
) -> Result<Recommendation<'a>> {
    let seed = pick_seed(store, username, rng)?;
    let (filter, reason) = if rng.gen_bool(0.5) {
        (SongFilter::SameGenreAs { song_id: seed.id }, Reason::SameGenre { genre: seed.genre.clone() })
    } else {
        (SongFilter::SameArtistAs { song_id: seed.id }, Reason::SameArtist { artist: seed.artist.clone() })
    };

    let search = SongSearch::new(store, filter, SongOrdering::Default);
    let session = present(store, &search, size)?;
    Ok(Recommendation { reason, seed, session })
}

/// Seed song first (so a user without history gets
/// [`DotifyError::NoHistory`]), then a random user sharing a listen.
///
/// # Errors
///
/// [`DotifyError::NoSimilarUser`] when nobody else shares a listened song.
pub fn similar_user<'a>(
    store: &'a Store,
    username: &str,
    size: usize,
    rng: &mut impl Rng,
) -> Result<Recommendation<'a>> {
    let seed = pick_seed(store, username, rng)?;
    let candidates = store.users_sharing_listens(username)?;
    let other = candidates
        .choose(rng)
        .ok_or_else(|| DotifyError::NoSimilarUser(username.to_string()))?
        .clone();

    let search = SongSearch::new(
        store,
        SongFilter::ListenedBy { username: other.clone(), excluding: Some(seed.id) },
        SongOrdering::Default,
    );
    let session = present(store, &search, size)?;
    Ok(Recommendation { reason: Reason::SimilarUser { username: other }, seed, session })
}
