//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `dotify` binary.
//!
//! ## Commands
//!
//! - `init`: create the library database
//! - `search`: browse songs by title, artist, album or genre
//! - `playlists` / `playlist`: browse and manage playlists
//! - `follows` / `followers` / `follow` / `unfollow`: the social graph
//! - `profile`, `charts`, `friends`, `for-you`: statistics and recommendations
//!
//! ## Examples
//!
//! ```bash
//! dotify --user ann search artist "Miles" --order release-date-desc
//! dotify --user ann playlist create "late night"
//! dotify --user ann for-you similar
//! ```

use crate::provider::{SongFilter, SongOrdering};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "dotify")]
#[command(about = "Dotify: browse a social music library and get listening recommendations")]
#[command(version)]
pub struct Args {
    /// Library database to use instead of the platform default
    #[arg(long, global = true, env = "DOTIFY_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Act as this user
    #[arg(short, long, global = true, env = "DOTIFY_USER")]
    pub user: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the library database (and the user, when --user is given)
    Init,

    /// Browse songs matching a search
    ///
    /// Matching is a case-insensitive substring match on the chosen field.
    /// Results are paged; select a row to listen to it or add it to a
    /// playlist.
    Search {
        /// Field to match against
        field: SearchField,

        /// Text to look for
        query: String,

        /// Sort order (defaults to `default_ordering` from config.json)
        #[arg(long, value_enum)]
        order: Option<SortOrder>,
    },

    /// Browse playlists
    Playlists {
        /// Owner of the playlists (defaults to you)
        owner: Option<String>,
    },

    /// Manage one of your playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistCommand,
    },

    /// Browse the users someone follows
    Follows {
        /// Defaults to you
        username: Option<String>,
    },

    /// Browse the users following someone
    Followers {
        /// Defaults to you
        username: Option<String>,
    },

    /// Follow a user
    Follow { username: String },

    /// Stop following a user
    Unfollow { username: String },

    /// Show profile statistics and top artists
    Profile {
        /// Defaults to you
        username: Option<String>,
    },

    /// Top 50 songs of the last 30 days and top 5 genres this month
    Charts,

    /// Songs the people you follow listen to most
    Friends,

    /// Recommendations based on a song you listened to
    ForYou {
        #[arg(value_enum, default_value_t = ForYouMode::Seed)]
        mode: ForYouMode,
    },

    /// Generate shell completions
    ///
    /// Usage: dotify completion bash > ~/.local/share/bash-completion/completions/dotify
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List names for dynamic completion (hidden command)
    #[command(hide = true)]
    CompleteNames {
        kind: NameKind,

        #[arg(long)]
        shell: Option<Shell>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistCommand {
    /// Browse the songs on a playlist
    Show {
        name: String,

        #[arg(long, value_enum)]
        order: Option<SortOrder>,
    },
    /// Create an empty playlist
    Create { name: String },
    /// Rename a playlist
    Rename { name: String, new_name: String },
    /// Delete a playlist
    Delete { name: String },
    /// Listen to every song on a playlist
    Listen { name: String },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum SearchField {
    Title,
    Artist,
    Album,
    Genre,
}

impl SearchField {
    #[must_use]
    pub fn filter(self, query: String) -> SongFilter {
        match self {
            Self::Title => SongFilter::Title(query),
            Self::Artist => SongFilter::Artist(query),
            Self::Album => SongFilter::Album(query),
            Self::Genre => SongFilter::Genre(query),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum SortOrder {
    /// Title, then artist
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

impl From<SortOrder> for SongOrdering {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Default => Self::Default,
            SortOrder::TitleAsc => Self::TitleAsc,
            SortOrder::TitleDesc => Self::TitleDesc,
            SortOrder::ArtistAsc => Self::ArtistAsc,
            SortOrder::ArtistDesc => Self::ArtistDesc,
            SortOrder::GenreAsc => Self::GenreAsc,
            SortOrder::GenreDesc => Self::GenreDesc,
            SortOrder::ReleaseDateAsc => Self::ReleaseDateAsc,
            SortOrder::ReleaseDateDesc => Self::ReleaseDateDesc,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ForYouMode {
    /// Same genre or artist as a song you played
    Seed,
    /// What a user with overlapping taste plays
    Similar,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum NameKind {
    Playlists,
    Users,
}
