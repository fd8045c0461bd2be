//! Catalog browsing and listening recommendations for a social music library.
//!
//! Core modules:
//! - [`browser`] - Cursor-based paging over ordered result sets
//! - [`provider`] - Filters and orderings bound to the store
//! - [`merge`] - Rank streams and the two merge strategies
//! - [`friends`] - Listen aggregation across followed users
//! - [`recommend`] - Seed-based and similar-user recommendations
//! - [`engine`] - Session-bound facade the shell talks to
//!
//! ### Supporting Modules
//!
//! - [`db`] - SQLite schema, canonical mutations and aggregations
//! - [`config`] - Data directory and runtime tunables
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`prompt`] - Interactive paging prompt
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use dotify::browser::Direction;
//! use dotify::config::RuntimeConfig;
//! use dotify::engine::{Engine, Session};
//! use dotify::provider::{SongFilter, SongOrdering};
//!
//! let engine = Engine::open(RuntimeConfig::load()?, Session::new("ann"))?;
//! let mut songs = engine.open_song_session(SongFilter::Artist("Miles".into()), SongOrdering::Default)?;
//!
//! let page = songs.navigate(Direction::Next)?;
//! for (index, absolute, song) in page.positioned() {
//!     println!("{index}. [{absolute}] {song}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`Result`] with a [`DotifyError`]. Only
//! [`DotifyError::ProviderFailure`] is fatal to a browse session; the rest
//! are conditions the shell reports and recovers from.

pub mod browser;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod friends;
pub mod merge;
pub mod prompt;
pub mod provider;
pub mod recommend;
pub mod song;

pub use error::{DotifyError, Result};
