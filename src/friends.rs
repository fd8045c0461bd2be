//! Friend listen aggregation: what the people you follow have been playing.

use crate::db::Store;
use crate::error::Result;
use crate::merge::{RankEntry, RankStream};
use log::debug;
use std::collections::HashMap;

/// Where follow edges and listen histories come from.
pub trait ListenHistorySource {
    fn followed_by(&self, username: &str) -> Result<Vec<String>>;

    /// Song ids, one per listen, duplicates included.
    fn listen_history(&self, username: &str) -> Result<Vec<i64>>;
}

impl ListenHistorySource for Store {
    fn followed_by(&self, username: &str) -> Result<Vec<String>> {
        Store::followed_by(self, username)
    }

    fn listen_history(&self, username: &str) -> Result<Vec<i64>> {
        Store::listen_history(self, username)
    }
}

/// Count listens per song across everyone `follower` follows.
///
/// The stream is ordered by score descending, then song id ascending. It is
/// empty when `follower` follows nobody or nobody they follow has listened
/// to anything.
pub fn aggregate(source: &impl ListenHistorySource, follower: &str) -> Result<RankStream<i64>> {
    let mut counts: HashMap<i64, u64> = HashMap::new();
    let followed = source.followed_by(follower)?;

    for user in &followed {
        for song_id in source.listen_history(user)? {
            *counts.entry(song_id).or_insert(0) += 1;
        }
    }
    debug!(
        "{follower} follows {} users who listened to {} distinct songs",
        followed.len(),
        counts.len()
    );

    let mut entries: Vec<RankEntry<i64>> = counts
        .into_iter()
        .map(|(song_id, score)| RankEntry::new(song_id, score))
        .collect();
    entries.sort_by_key(|entry| entry.key);
    Ok(RankStream::from_entries(entries))
}
