//! # Dotify
//!
//! Command-line shell over the `dotify` library: parses arguments, opens the
//! engine for the session user and renders results. Browse commands drop into
//! a small paging prompt on stdin.
//!
//! ## Usage
//!
//! ```bash
//! dotify --user ann init
//! dotify --user ann search title "blue"
//! dotify --user ann playlists
//! dotify --user ann friends
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dotify::browser::{Applied, Browser};
use dotify::cli::{self, Command, ForYouMode, PlaylistCommand, SortOrder};
use dotify::completion;
use dotify::config::RuntimeConfig;
use dotify::db::Store;
use dotify::engine::{Engine, Session};
use dotify::prompt::{self, Act};
use dotify::provider::{
    FollowAction, FollowDirection, OrderedResultProvider, PlaylistAction, SongAction, SongOrdering,
};
use dotify::song::Song;
use dotify::DotifyError;
use log::{debug, info, warn};
use std::io::{self, Write};

const SONG_HELP: &str = "n/p/g <row> to page, s <i> listen, a|A <i> <playlist> add song|album, \
                         r|R <i> <playlist> remove song|album, q quit";
const PLAYLIST_HELP: &str = "n/p/g <row> to page, s <i> listen, m <i> <name> rename, d <i> delete, q quit";
const FOLLOWING_HELP: &str = "n/p/g <row> to page, u <i> unfollow, q quit";
const FOLLOWERS_HELP: &str = "n/p/g <row> to page, f <i> follow back, q quit";

/// Main entry point for Dotify.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug dotify search title blue`
/// - `RUST_LOG=dotify::browser=trace dotify playlists`
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    if let Command::Completion { shell } = args.command {
        let mut cmd = cli::Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let config = match (RuntimeConfig::load(), args.db) {
        (Ok(config), Some(db)) => config.with_db_path(db),
        (Ok(config), None) => config,
        (Err(e), Some(db)) => {
            warn!("{e:#}; using defaults");
            RuntimeConfig::default().with_db_path(db)
        }
        (Err(e), None) => return Err(e.context("Failed to load configuration")),
    };
    debug!("Using database {}", config.db_path.display());

    match args.command {
        Command::Init => {
            let store = Store::open(&config.db_path)
                .with_context(|| format!("Failed to create database at {}", config.db_path.display()))?;
            if let Some(user) = &args.user {
                store.ensure_user(user)?;
            }
            info!("Initialized library database");
            println!("Library ready at {}", config.db_path.display());
            return Ok(());
        }
        Command::CompleteNames { kind, shell } => {
            let Ok(store) = Store::open(&config.db_path) else {
                return Ok(());
            };
            let user = args.user.unwrap_or_default();
            let names = completion::name_completions(&store, kind, &user).unwrap_or_default();
            completion::write_completions(&mut io::stdout(), &names, shell)?;
            return Ok(());
        }
        _ => {}
    }

    let username = args
        .user
        .context("No user given. Pass --user <name> or set DOTIFY_USER")?;
    let engine = Engine::open(config, Session::new(username)).context("Failed to open library")?;

    if let Err(e) = dispatch(&engine, args.command) {
        match e.downcast_ref::<DotifyError>() {
            Some(err) if !err.is_fatal() => println!("{}", friendly(err)),
            _ => return Err(e),
        }
    }
    Ok(())
}

fn dispatch(engine: &Engine, command: Command) -> Result<()> {
    let me = engine.session().username.clone();

    match command {
        Command::Search { field, query, order } => {
            let mut songs = engine.open_song_session(field.filter(query), ordering(engine, order))?;
            browse(&mut songs, SONG_HELP, song_actions(&me))?;
        }
        Command::Playlists { owner } => {
            let mut playlists = engine.open_playlists(owner.as_deref())?;
            browse(&mut playlists, PLAYLIST_HELP, |browser, act| {
                let action = match (act.verb.as_str(), &act.arg) {
                    ("s", _) => PlaylistAction::Listen { username: me.clone() },
                    ("d", _) => PlaylistAction::Delete,
                    ("m", Some(new_name)) => PlaylistAction::Rename(new_name.clone()),
                    ("m", None) => return Ok("usage: m <i> <new name>".to_string()),
                    (verb, _) => return Ok(format!("unknown action '{verb}'")),
                };
                let Applied { row: playlist, changed } = browser.apply(act.index, &action)?;
                Ok(match action {
                    PlaylistAction::Listen { .. } if !changed => format!("'{}' has no songs", playlist.name),
                    PlaylistAction::Listen { .. } => {
                        format!("Listened to {} songs on '{}'", playlist.song_count, playlist.name)
                    }
                    PlaylistAction::Delete => format!("Deleted playlist '{}'", playlist.name),
                    PlaylistAction::Rename(new_name) => format!("Renamed '{}' to '{new_name}'", playlist.name),
                })
            })?;
        }
        Command::Playlist { action } => match action {
            PlaylistCommand::Show { name, order } => {
                let mut songs = engine.open_playlist_songs(&name, ordering(engine, order))?;
                browse(&mut songs, SONG_HELP, song_actions(&me))?;
            }
            PlaylistCommand::Create { name } => {
                engine.create_playlist(&name)?;
                println!("Created playlist '{name}'");
            }
            PlaylistCommand::Rename { name, new_name } => {
                engine.rename_playlist(&name, &new_name)?;
                println!("Renamed '{name}' to '{new_name}'");
            }
            PlaylistCommand::Delete { name } => {
                engine.delete_playlist(&name)?;
                println!("Deleted playlist '{name}'");
            }
            PlaylistCommand::Listen { name } => {
                let played = engine.listen_to_playlist(&name)?;
                println!("Listened to {played} songs on '{name}'");
            }
        },
        Command::Follows { username } => {
            let mut follows = engine.open_follows(username.as_deref(), FollowDirection::Following)?;
            browse(&mut follows, FOLLOWING_HELP, |browser, act| match act.verb.as_str() {
                "u" => {
                    let applied = browser.apply(act.index, &FollowAction::Unfollow { follower: me.clone() })?;
                    Ok(if applied.changed {
                        format!("Unfollowed {}", applied.row)
                    } else {
                        format!("You do not follow {}", applied.row)
                    })
                }
                verb => Ok(format!("unknown action '{verb}'")),
            })?;
        }
        Command::Followers { username } => {
            let mut followers = engine.open_follows(username.as_deref(), FollowDirection::Followers)?;
            browse(&mut followers, FOLLOWERS_HELP, |browser, act| match act.verb.as_str() {
                "f" => {
                    let applied = browser.apply(act.index, &FollowAction::Follow { follower: me.clone() })?;
                    Ok(if applied.changed {
                        format!("Following {}", applied.row)
                    } else {
                        format!("You are already following {}", applied.row)
                    })
                }
                verb => Ok(format!("unknown action '{verb}'")),
            })?;
        }
        Command::Follow { username } => {
            if engine.follow(&username)? {
                println!("You are now following {username}");
            } else {
                println!("You are already following {username}");
            }
        }
        Command::Unfollow { username } => {
            if engine.unfollow(&username)? {
                println!("You unfollowed {username}");
            } else {
                println!("You do not follow {username}");
            }
        }
        Command::Profile { username } => print_profile(engine, username.as_deref())?,
        Command::Charts => print_charts(engine)?,
        Command::Friends => print_friends(engine)?,
        Command::ForYou { mode } => {
            let mut rng = rand::thread_rng();
            let mut recommendation = match mode {
                ForYouMode::Seed => engine.seed_recommendation(&mut rng)?,
                ForYouMode::Similar => engine.similar_user_recommendation(&mut rng)?,
            };
            println!("{}", recommendation.header());
            browse(&mut recommendation.session, SONG_HELP, song_actions(&me))?;
        }
        other => anyhow::bail!("{other:?} is handled before the engine is opened"),
    }
    Ok(())
}

/// `--order` when given, else the configured default.
fn ordering(engine: &Engine, order: Option<SortOrder>) -> SongOrdering {
    order.map_or(engine.config().default_ordering, SongOrdering::from)
}

/// Run the paging prompt on stdin/stdout.
fn browse<P, F>(browser: &mut Browser<P>, help: &str, act: F) -> Result<()>
where
    P: OrderedResultProvider,
    P::Row: std::fmt::Display,
    F: FnMut(&Browser<P>, &Act) -> dotify::Result<String>,
{
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    prompt::run(browser, &mut input, &mut out, help, act)
}

fn song_actions<P>(username: &str) -> impl FnMut(&Browser<P>, &Act) -> dotify::Result<String> + '_
where
    P: OrderedResultProvider<Row = Song, Mutation = SongAction>,
{
    move |browser, act| {
        let playlist = act.arg.clone();
        let action = match (act.verb.as_str(), playlist) {
            ("s", _) => SongAction::Listen { username: username.to_string() },
            ("a" | "A", Some(playlist)) => SongAction::AddToPlaylist {
                owner: username.to_string(),
                playlist,
                whole_album: act.verb == "A",
            },
            ("r" | "R", Some(playlist)) => SongAction::RemoveFromPlaylist {
                owner: username.to_string(),
                playlist,
                whole_album: act.verb == "R",
            },
            ("a" | "A" | "r" | "R", None) => {
                return Ok(format!("usage: {} <i> <playlist>", act.verb));
            }
            (verb, _) => return Ok(format!("unknown action '{verb}'")),
        };
        let Applied { row: song, changed } = browser.apply(act.index, &action)?;
        Ok(match action {
            SongAction::Listen { .. } => format!("Listened to {}", song.title),
            SongAction::AddToPlaylist { playlist, whole_album, .. } => {
                let what = if whole_album { &song.album } else { &song.title };
                if changed {
                    format!("Added {what} to '{playlist}'")
                } else {
                    format!("{what} is already on '{playlist}'")
                }
            }
            SongAction::RemoveFromPlaylist { playlist, whole_album, .. } => {
                let what = if whole_album { &song.album } else { &song.title };
                if changed {
                    format!("Removed {what} from '{playlist}'")
                } else {
                    format!("{what} is not on '{playlist}'")
                }
            }
        })
    }
}

fn print_profile(engine: &Engine, username: Option<&str>) -> Result<()> {
    let profile = engine.profile(username)?;
    let mut out = io::stdout().lock();

    writeln!(out, "Profile of {}", profile.username)?;
    writeln!(out, "Playlists: {}", profile.playlists)?;
    writeln!(out, "Following: {}", profile.following)?;
    writeln!(out, "Followers: {}", profile.followers)?;

    writeln!(out, "\nTop artists by listens:")?;
    for (rank, entry) in profile.top_by_listens.iter().enumerate() {
        writeln!(out, "{:>3}. {} ({} listens)", rank + 1, entry.key, entry.score)?;
    }
    writeln!(out, "\nTop artists by playlist occurrences:")?;
    for (rank, entry) in profile.top_by_playlists.iter().enumerate() {
        writeln!(out, "{:>3}. {} ({} songs)", rank + 1, entry.key, entry.score)?;
    }
    writeln!(out, "\nTop artists overall:")?;
    for (rank, entry) in profile.top_combined.iter().enumerate() {
        let sources: Vec<&str> = entry.provenance.iter().map(|s| s.label()).collect();
        writeln!(
            out,
            "{:>3}. {} ({}, from {})",
            rank + 1,
            entry.key,
            entry.combined_score,
            sources.join(", ")
        )?;
    }
    Ok(())
}

fn print_charts(engine: &Engine) -> Result<()> {
    let charts = engine.charts()?;
    let mut out = io::stdout().lock();

    writeln!(out, "Top songs of the last 30 days:")?;
    for (rank, entry) in charts.top_songs_last_30_days.iter().enumerate() {
        writeln!(out, "{:>3}. {} ({} listens)", rank + 1, entry.key, entry.score)?;
    }
    writeln!(out, "\nTop genres this month:")?;
    for (rank, entry) in charts.top_genres_this_month.iter().enumerate() {
        writeln!(out, "{:>3}. {} ({} listens)", rank + 1, entry.key, entry.score)?;
    }
    Ok(())
}

fn print_friends(engine: &Engine) -> Result<()> {
    let top = engine.friend_recommendations()?;
    if top.entries.is_empty() {
        println!("Unable to recommend song: Your friends have not listened to any songs.");
        return Ok(());
    }
    if top.is_short() {
        println!("Your friends have only listened to {} songs.", top.available());
    }
    for (rank, entry) in top.entries.iter().enumerate() {
        println!("{:>3}. {} ({} friend listens)", rank + 1, entry.key, entry.score);
    }
    Ok(())
}

/// What the user sees for recoverable errors.
fn friendly(err: &DotifyError) -> String {
    match err {
        DotifyError::EmptyResult => "No results.".to_string(),
        DotifyError::NoHistory(_) => "Sorry, you haven't listened to any songs yet!".to_string(),
        DotifyError::NoSimilarUser(_) => "Sorry, we couldn't find any similar users.".to_string(),
        other => other.to_string(),
    }
}
