//! # Error Taxonomy
//!
//! Every library operation returns [`Result`], whose error side is
//! [`DotifyError`]. The variants map one-to-one onto what the shell has to do
//! about them:
//!
//! - [`DotifyError::EmptyResult`]: print "no results" and skip the paging loop
//! - [`DotifyError::OutOfRange`]: re-prompt for a valid index
//! - [`DotifyError::NoHistory`] / [`DotifyError::NoSimilarUser`]: show guidance
//!   and abandon that recommendation flow
//! - [`DotifyError::ProviderFailure`]: fatal for the current browse session,
//!   never retried
//! - [`DotifyError::NotFound`] / [`DotifyError::AlreadyExists`]: user typed a
//!   name that does not (or already does) exist
//! - [`DotifyError::NotOwner`]: someone else's playlist was selected for an
//!   owner-only change

/// Library-level errors
#[derive(thiserror::Error, Debug)]
pub enum DotifyError {
    #[error("no results")]
    EmptyResult,

    #[error("selection {index} is out of range (valid: 1..={len})")]
    OutOfRange { index: usize, len: usize },

    #[error("user `{0}` has not listened to any songs yet")]
    NoHistory(String),

    #[error("no other user shares a listened song with `{0}`")]
    NoSimilarUser(String),

    #[error("store failure: {0}")]
    ProviderFailure(#[from] rusqlite::Error),

    #[error("no {kind} named `{name}`")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} `{name}` already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("playlist `{name}` belongs to `{owner}`")]
    NotOwner { name: String, owner: String },
}

impl DotifyError {
    /// Whether the current browse session must be abandoned.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ProviderFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, DotifyError>;
