//! Ranked-list merging.
//!
//! A [`RankStream`] is a score-descending list of `(key, score)` pairs. Two
//! merge strategies turn streams into a single deduplicated ranking:
//!
//! - [`merge_streams`] walks three streams that describe the same keys
//!   (combined, playlist-only, listen-only) and greedily emits the highest
//!   live head until `limit` distinct keys are out. Ties go to the stream that
//!   comes first in priority order.
//! - [`extract_top_k`] repeatedly pulls the maximum out of an unordered
//!   candidate set. It is what friend recommendations use.

use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankEntry<K> {
    pub key: K,
    pub score: u64,
}

impl<K> RankEntry<K> {
    pub const fn new(key: K, score: u64) -> Self {
        Self { key, score }
    }
}

/// Score-descending sequence of [`RankEntry`] values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankStream<K> {
    entries: Vec<RankEntry<K>>,
}

impl<K> Default for RankStream<K> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K> RankStream<K> {
    /// Build a stream, sorting by score descending. The sort is stable so
    /// equal scores keep the order they arrived in.
    pub fn from_entries(mut entries: Vec<RankEntry<K>>) -> Self {
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[RankEntry<K>] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankEntry<K>> {
        self.entries.iter()
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<RankEntry<K>> {
        self.entries
    }
}

impl<K> IntoIterator for RankStream<K> {
    type Item = RankEntry<K>;
    type IntoIter = std::vec::IntoIter<RankEntry<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, K> IntoIterator for &'a RankStream<K> {
    type Item = &'a RankEntry<K>;
    type IntoIter = std::slice::Iter<'a, RankEntry<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Which stream produced (or later confirmed) a merged entry.
///
/// Declaration order is tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Combined,
    Playlist,
    Listen,
}

impl Source {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Combined => "listens + playlists",
            Self::Playlist => "playlists",
            Self::Listen => "listens",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEntry<K> {
    pub key: K,
    /// Score of the head that emitted this key.
    pub combined_score: u64,
    /// Emitting stream first, then every stream that hit the key again.
    pub provenance: Vec<Source>,
}

/// Cursor over one stream during a merge.
#[derive(Debug)]
pub struct MergeHead<'a, K> {
    source: Source,
    entries: &'a [RankEntry<K>],
    next: usize,
}

impl<'a, K> MergeHead<'a, K> {
    pub fn new(source: Source, stream: &'a RankStream<K>) -> Self {
        Self { source, entries: stream.entries(), next: 0 }
    }

    pub fn peek(&self) -> Option<&'a RankEntry<K>> {
        self.entries.get(self.next)
    }

    /// `None` once the stream is exhausted.
    pub fn peek_score(&self) -> Option<u64> {
        self.peek().map(|entry| entry.score)
    }

    pub fn advance(&mut self) {
        if self.next < self.entries.len() {
            self.next += 1;
        }
    }

    pub const fn source(&self) -> Source {
        self.source
    }
}

/// Greedy three-stream merge.
///
/// Each round looks at the live heads, takes the greatest score (earlier
/// stream wins ties), emits its key if unseen and advances that stream. A key
/// already emitted only gains the stream in its provenance. Stops at `limit`
/// distinct keys or when every stream is exhausted.
pub fn merge_streams<K>(
    combined: &RankStream<K>,
    playlist: &RankStream<K>,
    listen: &RankStream<K>,
    limit: usize,
) -> Vec<MergedEntry<K>>
where
    K: Clone + Eq + Hash,
{
    let mut heads = [
        MergeHead::new(Source::Combined, combined),
        MergeHead::new(Source::Playlist, playlist),
        MergeHead::new(Source::Listen, listen),
    ];
    let mut merged: Vec<MergedEntry<K>> = Vec::with_capacity(limit);
    let mut seen: HashMap<K, usize> = HashMap::new();

    while merged.len() < limit {
        let mut best: Option<(usize, u64)> = None;
        for (i, head) in heads.iter().enumerate() {
            if let Some(score) = head.peek_score() {
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((i, score));
                }
            }
        }
        let Some((winner, score)) = best else {
            break;
        };

        let head = &mut heads[winner];
        if let Some(entry) = head.peek() {
            match seen.get(&entry.key) {
                Some(&at) => {
                    let provenance = &mut merged[at].provenance;
                    if !provenance.contains(&head.source()) {
                        provenance.push(head.source());
                    }
                }
                None => {
                    seen.insert(entry.key.clone(), merged.len());
                    merged.push(MergedEntry {
                        key: entry.key.clone(),
                        combined_score: score,
                        provenance: vec![head.source()],
                    });
                }
            }
        }
        head.advance();
    }

    merged
}

/// Outcome of [`extract_top_k`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopK<K> {
    pub entries: Vec<RankEntry<K>>,
    pub requested: usize,
}

impl<K> TopK<K> {
    /// How many entries were actually available, at most `requested`.
    #[must_use]
    pub fn available(&self) -> usize {
        self.entries.len()
    }

    /// True when fewer than `requested` entries existed.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.entries.len() < self.requested
    }
}

/// Pull the maximum out of `candidates` until `k` entries are taken or none
/// remain. On equal scores the earliest candidate wins, and removal keeps the
/// rest in their original order.
pub fn extract_top_k<K>(mut candidates: Vec<RankEntry<K>>, k: usize) -> TopK<K> {
    let mut entries = Vec::with_capacity(k.min(candidates.len()));

    while entries.len() < k && !candidates.is_empty() {
        let mut max_at = 0;
        for (i, candidate) in candidates.iter().enumerate().skip(1) {
            if candidate.score > candidates[max_at].score {
                max_at = i;
            }
        }
        entries.push(candidates.remove(max_at));
    }

    TopK { entries, requested: k }
}

/// Per-user aggregations a store can rank artists by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankGroup {
    ListensByArtist,
    PlaylistOccurrencesByArtist,
    /// Artists present in both of the above, scores summed.
    CombinedByArtist,
}

/// Anything that can produce score-sorted aggregations for a user.
pub trait RankSource {
    /// # Errors
    ///
    /// Returns [`crate::DotifyError::ProviderFailure`] when the underlying
    /// query fails.
    fn aggregate_scores(&self, group: RankGroup, username: &str) -> Result<RankStream<String>>;
}
