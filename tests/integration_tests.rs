//! # Integration Tests for Dotify
//!
//! End-to-end tests against an on-disk fixture library: paging through real
//! queries, both merge strategies fed by the store, recommendation
//! preconditions, and the binary itself.

use anyhow::Result;
use dotify::browser::{Browser, Direction, PagePosition};
use dotify::config::RuntimeConfig;
use dotify::db::Store;
use dotify::engine::{Engine, Session};
use dotify::merge::{merge_streams, RankEntry, RankStream, Source};
use dotify::provider::{
    FollowAction, FollowDirection, OrderedResultProvider, PlaylistAction, SongAction, SongFilter,
    SongOrdering, SongSearch,
};
use dotify::DotifyError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Test helper to create an on-disk library with `songs` tracks.
///
/// Every track is on one album by one artist; titles are zero-padded so
/// title order equals id order. Users ann, bob, cat and dan exist.
fn create_test_database(songs: i64) -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_library.db");

    // Store::open lays down the schema.
    drop(Store::open(&db_path)?);

    let mut conn = rusqlite::Connection::open(&db_path)?;
    let tx = conn.transaction()?;
    tx.execute_batch(
        "INSERT INTO genre VALUES (1, 'Ambient'), (2, 'Techno');
         INSERT INTO album VALUES (1, 'Long Player', '2001-01-01');
         INSERT INTO users (username) VALUES ('ann'), ('bob'), ('cat'), ('dan');",
    )?;
    for id in 1..=songs {
        tx.execute(
            "INSERT INTO song (song_id, title, length, release_date, genre_id) VALUES (?1, ?2, 200, '2001-01-01', ?3)",
            rusqlite::params![id, format!("Track {id:03}"), 1 + id % 2],
        )?;
        tx.execute(
            "INSERT INTO song_by_artist VALUES (?1, ?2)",
            rusqlite::params![id, if id % 3 == 0 { "Drone Unit" } else { "Pulse" }],
        )?;
        tx.execute("INSERT INTO song_on_album VALUES (?1, 1, ?1)", [id])?;
    }
    tx.commit()?;

    Ok((temp_dir, db_path))
}

fn engine_for(db_path: &Path, user: &str) -> Result<Engine> {
    let config = RuntimeConfig::default().with_db_path(db_path.to_path_buf());
    Ok(Engine::open(config, Session::new(user))?)
}

#[cfg(test)]
mod paging_tests {
    use super::*;

    #[test]
    fn test_47_rows_page_through_and_back() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(47)?;
        let engine = engine_for(&db_path, "ann")?;
        let mut browser = engine.open_song_session(SongFilter::Title("Track".into()), SongOrdering::TitleAsc)?;

        assert_eq!(browser.total_rows(), 47);
        assert_eq!(browser.cursor().page_count(), 3);

        let first = browser.render_current_page()?;
        assert_eq!(first.len(), 20);
        assert_eq!(first.rows[0].title, "Track 001");
        assert_eq!(browser.cursor().page_position(), PagePosition::First);

        let second = browser.navigate(Direction::Next)?;
        assert_eq!((second.start, second.len()), (21, 20));

        let third = browser.navigate(Direction::Next)?;
        assert_eq!((third.start, third.len()), (41, 7));
        assert_eq!(third.rows.last().map(|s| s.title.as_str()), Some("Track 047"));
        assert_eq!(browser.cursor().page_position(), PagePosition::Last);

        let again = browser.navigate(Direction::Next)?;
        assert_eq!(again.start, 41, "next on the last page is a no-op");

        let back = browser.navigate(Direction::Previous)?;
        assert_eq!(back.start, 21);
        assert_eq!(back.rows[0].title, "Track 021");
        Ok(())
    }

    #[test]
    fn test_jump_and_select_hit_the_canonical_row() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(47)?;
        let engine = engine_for(&db_path, "ann")?;
        let mut browser = engine.open_song_session(SongFilter::Title("Track".into()), SongOrdering::TitleDesc)?;

        let page = browser.navigate(Direction::Absolute(45))?;
        assert_eq!(page.start, 41);
        assert_eq!(page.rows[0].title, "Track 007");

        let song = browser.apply(2, &SongAction::Listen { username: "ann".into() })?.row;
        assert_eq!(song.title, "Track 006");
        assert_eq!(browser.select(2)?.listens, 1);

        for bad in [0, 8] {
            assert!(matches!(browser.select(bad), Err(DotifyError::OutOfRange { len: 7, .. })));
        }
        assert!(matches!(browser.jump_to(48), Err(DotifyError::OutOfRange { .. })));
        Ok(())
    }

    #[test]
    fn test_removal_during_session_keeps_page_count() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(25)?;
        let engine = engine_for(&db_path, "ann")?;
        engine.create_playlist("all")?;
        engine.store().add_to_playlist("ann", "all", 1, Some(1))?;

        let mut browser = engine.open_playlist_songs("all", SongOrdering::Default)?;
        let removed = browser.apply(
            1,
            &SongAction::RemoveFromPlaylist { owner: "ann".into(), playlist: "all".into(), whole_album: false },
        )?;
        assert!(removed.changed);

        assert_eq!(browser.total_rows(), 25, "row count is fixed for the session");
        assert_eq!(browser.cursor().page_count(), 2);
        let last = browser.navigate(Direction::Next)?;
        assert_eq!(last.len(), 4, "the vanished row shortens the re-fetched page");
        Ok(())
    }

    #[test]
    fn test_empty_search() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(5)?;
        let store = Store::open(&db_path)?;
        let search = SongSearch::new(&store, SongFilter::Artist("Nobody".into()), SongOrdering::Default);

        assert_eq!(search.count()?, 0);
        assert!(matches!(Browser::open(search, 20), Err(DotifyError::EmptyResult)));
        Ok(())
    }
}

#[cfg(test)]
mod listing_tests {
    use super::*;

    #[test]
    fn test_other_users_playlists_are_read_only() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(5)?;
        let bob = engine_for(&db_path, "bob")?;
        bob.create_playlist("bobs mix")?;
        bob.store().add_to_playlist("bob", "bobs mix", 2, None)?;

        let ann = engine_for(&db_path, "ann")?;
        let browser = ann.open_playlists(Some("bob"))?;

        for action in [PlaylistAction::Delete, PlaylistAction::Rename("stolen".into())] {
            assert!(matches!(
                browser.apply(1, &action),
                Err(DotifyError::NotOwner { ref name, ref owner }) if name == "bobs mix" && owner == "bob"
            ));
        }
        assert!(ann.store().playlist_exists("bob", "bobs mix")?);

        let listened = browser.apply(1, &PlaylistAction::Listen { username: "ann".into() })?;
        assert!(listened.changed);
        assert_eq!(ann.store().listen_history("ann")?, vec![2]);
        Ok(())
    }

    #[test]
    fn test_follow_back_reports_existing_edge() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(5)?;
        let ann = engine_for(&db_path, "ann")?;
        let bob = engine_for(&db_path, "bob")?;
        ann.follow("bob")?;
        bob.follow("ann")?;

        let followers = ann.open_follows(None, FollowDirection::Followers)?;
        let follow_back = FollowAction::Follow { follower: "ann".into() };
        let applied = followers.apply(1, &follow_back)?;
        assert_eq!(applied.row.username, "bob");
        assert!(!applied.changed, "ann already follows bob");

        let unfollow = FollowAction::Unfollow { follower: "ann".into() };
        assert!(followers.apply(1, &unfollow)?.changed);
        assert!(!followers.apply(1, &unfollow)?.changed, "nothing left to unfollow");
        assert!(followers.apply(1, &follow_back)?.changed);
        Ok(())
    }

    #[test]
    fn test_adding_a_song_twice_is_a_no_op() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(5)?;
        let engine = engine_for(&db_path, "ann")?;
        engine.create_playlist("mix")?;

        let browser = engine.open_song_session(SongFilter::Title("Track 003".into()), SongOrdering::Default)?;
        let add = SongAction::AddToPlaylist { owner: "ann".into(), playlist: "mix".into(), whole_album: false };
        let remove = SongAction::RemoveFromPlaylist { owner: "ann".into(), playlist: "mix".into(), whole_album: false };

        assert!(browser.apply(1, &add)?.changed);
        assert!(!browser.apply(1, &add)?.changed);
        assert!(browser.apply(1, &remove)?.changed);
        assert!(!browser.apply(1, &remove)?.changed);
        Ok(())
    }
}

mod ranking_tests {
    use super::*;

    #[test]
    fn test_combined_stream_leads_the_merge() {
        let stream = |entries: &[(&str, u64)]| {
            RankStream::from_entries(entries.iter().map(|(k, s)| RankEntry::new((*k).to_string(), *s)).collect())
        };
        let listen = stream(&[("x", 5), ("y", 3)]);
        let playlist = stream(&[("x", 5), ("z", 2)]);
        let combined = stream(&[("x", 10)]);

        let merged = merge_streams(&combined, &playlist, &listen, 10);

        assert_eq!(merged[0].key, "x");
        assert_eq!(merged[0].combined_score, 10);
        assert_eq!(merged[0].provenance[0], Source::Combined);
        let keys: Vec<&str> = merged.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_profile_top_lists_are_bounded() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(30)?;
        let engine = engine_for(&db_path, "ann")?;
        for id in 1..=30 {
            engine.store().register_listen("ann", id)?;
        }
        engine.create_playlist("drones")?;
        for id in [3, 6, 9] {
            engine.store().add_to_playlist("ann", "drones", id, None)?;
        }

        let profile = engine.profile(None)?;

        assert_eq!(profile.top_by_listens.entries()[0], RankEntry::new("Pulse".to_string(), 20));
        // Pulse's listen count outranks Drone Unit's combined score.
        let top: Vec<(&str, u64)> =
            profile.top_combined.iter().map(|m| (m.key.as_str(), m.combined_score)).collect();
        assert_eq!(top, vec![("Pulse", 20), ("Drone Unit", 13)]);
        assert_eq!(profile.top_combined[1].provenance, vec![Source::Combined, Source::Listen, Source::Playlist]);
        Ok(())
    }

    #[test]
    fn test_friend_top_50_of_60() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(60)?;
        let engine = engine_for(&db_path, "ann")?;
        engine.follow("bob")?;
        engine.follow("cat")?;
        for id in 1..=60 {
            engine.store().register_listen("bob", id)?;
        }
        for id in 55..=60 {
            engine.store().register_listen("cat", id)?;
        }

        let top = engine.friend_recommendations()?;

        assert_eq!(top.available(), 50);
        assert!(!top.is_short());
        assert!(top.entries.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(top.entries[0].key.id, 55);
        assert_eq!(top.entries[0].score, 2);
        let ids: HashSet<i64> = top.entries.iter().map(|e| e.key.id).collect();
        assert_eq!(ids.len(), 50, "no song appears twice");
        Ok(())
    }

    #[test]
    fn test_friend_picks_when_few_songs() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(10)?;
        let engine = engine_for(&db_path, "dan")?;
        engine.follow("bob")?;
        engine.store().register_listen("bob", 4)?;

        let top = engine.friend_recommendations()?;
        assert!(top.is_short());
        assert_eq!(top.available(), 1);
        Ok(())
    }
}

#[cfg(test)]
mod recommendation_tests {
    use super::*;

    #[test]
    fn test_no_history_is_reported() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(10)?;
        let engine = engine_for(&db_path, "dan")?;
        let mut rng = StdRng::seed_from_u64(42);

        assert!(matches!(engine.seed_recommendation(&mut rng), Err(DotifyError::NoHistory(_))));
        assert!(matches!(engine.similar_user_recommendation(&mut rng), Err(DotifyError::NoHistory(_))));
        Ok(())
    }

    #[test]
    fn test_similar_user_single_page() -> Result<()> {
        let (_temp_dir, db_path) = create_test_database(20)?;
        let engine = engine_for(&db_path, "ann")?;
        engine.store().register_listen("ann", 1)?;
        for id in 1..=12 {
            engine.store().register_listen("cat", id)?;
        }
        let mut rng = StdRng::seed_from_u64(42);

        let recommendation = engine.similar_user_recommendation(&mut rng)?;

        assert!(recommendation.header().contains("'cat'"));
        assert_eq!(recommendation.session.cursor().page_position(), PagePosition::Only);
        let page = recommendation.session.render_current_page()?;
        assert_eq!(page.len(), 5);
        assert!(page.rows.iter().all(|song| song.id != 1));
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use std::io::Write;

    fn dotify(temp_dir: &TempDir, db_path: &Path, args: &[&str], stdin: &str) -> Result<String> {
        let mut child = Command::new(env!("CARGO_BIN_EXE_dotify"))
            .env("XDG_DATA_HOME", temp_dir.path())
            .env_remove("DOTIFY_USER")
            .arg("--db")
            .arg(db_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        if let Some(mut input) = child.stdin.take() {
            input.write_all(stdin.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        assert!(output.status.success(), "dotify {args:?} failed");
        Ok(String::from_utf8(output.stdout)?)
    }

    #[test]
    fn test_cli_help_lists_commands() {
        let output = Command::new(env!("CARGO_BIN_EXE_dotify"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("search"));
        assert!(stdout.contains("playlists"));
        assert!(stdout.contains("for-you"));
    }

    #[test]
    fn test_cli_playlist_and_follow_flow() -> Result<()> {
        let (temp_dir, db_path) = create_test_database(3)?;

        let created = dotify(&temp_dir, &db_path, &["--user", "ann", "playlist", "create", "mix"], "")?;
        assert!(created.contains("Created playlist 'mix'"));

        let followed = dotify(&temp_dir, &db_path, &["--user", "ann", "follow", "bob"], "")?;
        assert!(followed.contains("now following bob"));
        let again = dotify(&temp_dir, &db_path, &["--user", "ann", "follow", "bob"], "")?;
        assert!(again.contains("already following bob"));

        let friends = dotify(&temp_dir, &db_path, &["--user", "ann", "friends"], "")?;
        assert!(friends.contains("Your friends have not listened to any songs."));
        Ok(())
    }

    #[test]
    fn test_cli_search_prompt_listens() -> Result<()> {
        let (temp_dir, db_path) = create_test_database(3)?;

        let out = dotify(
            &temp_dir,
            &db_path,
            &["--user", "ann", "search", "title", "Track"],
            "s 2\nq\n",
        )?;

        assert!(out.contains("Listened to Track 002"));
        assert_eq!(Store::open(&db_path)?.listen_history("ann")?, vec![2]);
        Ok(())
    }

    #[test]
    fn test_cli_for_you_without_history() -> Result<()> {
        let (temp_dir, db_path) = create_test_database(3)?;
        let out = dotify(&temp_dir, &db_path, &["--user", "dan", "for-you", "seed"], "")?;
        assert!(out.contains("haven't listened to any songs yet"));
        Ok(())
    }
}
