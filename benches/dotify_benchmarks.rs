//! # Dotify Performance Benchmarks
//!
//! ## Benchmark Categories
//!
//! - **Merging**: three-stream merge and top-K extraction
//! - **Paging**: page renders and selections against an on-disk library
//! - **Aggregation**: friend listen counting and artist rankings
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench merge
//! cargo bench paging
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use dotify::browser::{Browser, Direction};
use dotify::db::Store;
use dotify::friends;
use dotify::merge::{extract_top_k, merge_streams, RankEntry, RankGroup, RankSource, RankStream};
use dotify::provider::{SongFilter, SongOrdering, SongSearch};
use std::hint::black_box;
use std::path::PathBuf;
use tempfile::TempDir;

/// 1000 songs by 20 artists, 50 users with 40 listens each, everyone
/// following the first 10 users.
fn create_benchmark_database() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("benchmark_library.db");
    drop(Store::open(&db_path).expect("Failed to create schema"));

    let mut conn = rusqlite::Connection::open(&db_path).expect("Failed to open database");
    let tx = conn.transaction().expect("Failed to start transaction");
    tx.execute_batch(
        "INSERT INTO genre VALUES (1, 'Jazz'), (2, 'Rock'), (3, 'Ambient');
         INSERT INTO album VALUES (1, 'Sessions', '1999-09-09');",
    )
    .expect("Failed to insert genres");

    for i in 1..=1000_i64 {
        tx.execute(
            "INSERT INTO song (song_id, title, length, release_date, genre_id) VALUES (?1, ?2, ?3, '1999-09-09', ?4)",
            rusqlite::params![i, format!("Song {i:04}"), 120 + i % 240, 1 + i % 3],
        )
        .expect("Failed to insert song");
        tx.execute(
            "INSERT INTO song_by_artist VALUES (?1, ?2)",
            rusqlite::params![i, format!("Artist {}", (i - 1) / 50 + 1)],
        )
        .expect("Failed to insert artist");
        tx.execute("INSERT INTO song_on_album VALUES (?1, 1, ?1)", [i])
            .expect("Failed to insert album track");
    }
    for u in 1..=50_i64 {
        let user = format!("user{u:02}");
        tx.execute("INSERT INTO users (username) VALUES (?1)", [&user])
            .expect("Failed to insert user");
        for k in 0..40_i64 {
            tx.execute(
                "INSERT INTO user_listens_song (username, song_id) VALUES (?1, ?2)",
                rusqlite::params![user, (u * 37 + k * 13) % 1000 + 1],
            )
            .expect("Failed to insert listen");
        }
        for f in 1..=10_i64 {
            if f != u {
                tx.execute(
                    "INSERT INTO following VALUES (?1, ?2)",
                    rusqlite::params![user, format!("user{f:02}")],
                )
                .expect("Failed to insert follow");
            }
        }
    }
    tx.commit().expect("Failed to commit fixture");

    (temp_dir, db_path)
}

fn synthetic_stream(len: u64, salt: u64) -> RankStream<String> {
    RankStream::from_entries(
        (0..len)
            .map(|i| RankEntry::new(format!("Artist {}", (i * salt) % len), (i * 7919 + salt) % 500))
            .collect(),
    )
}

/// Benchmark the merge strategies on in-memory streams
fn benchmark_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [10_u64, 100, 1000] {
        let combined = synthetic_stream(size, 3);
        let playlist = synthetic_stream(size, 5);
        let listen = synthetic_stream(size, 7);

        group.bench_with_input(BenchmarkId::new("three_stream_top_10", size), &size, |b, _| {
            b.iter(|| merge_streams(black_box(&combined), black_box(&playlist), black_box(&listen), 10))
        });

        let candidates = listen.clone().into_entries();
        group.bench_with_input(BenchmarkId::new("extract_top_50", size), &size, |b, _| {
            b.iter_batched(
                || candidates.clone(),
                |candidates| extract_top_k(black_box(candidates), 50),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark page renders and selection against the store
fn benchmark_paging(c: &mut Criterion) {
    let (_temp_dir, db_path) = create_benchmark_database();
    let store = Store::open(&db_path).expect("Failed to open store");
    let mut group = c.benchmark_group("paging");

    group.bench_function("open_and_first_page", |b| {
        b.iter(|| {
            let search = SongSearch::new(&store, SongFilter::Title("Song".into()), SongOrdering::Default);
            let browser = Browser::open(search, 20).expect("rows exist");
            black_box(browser.render_current_page().expect("page renders"))
        })
    });

    let search = SongSearch::new(&store, SongFilter::Genre("Jazz".into()), SongOrdering::ReleaseDateDesc);
    let mut browser = Browser::open(search, 20).expect("rows exist");
    group.bench_function("jump_deep_page", |b| {
        b.iter(|| black_box(browser.navigate(Direction::Absolute(black_box(300))).expect("page renders")))
    });

    group.bench_function("select_row", |b| b.iter(|| black_box(browser.select(black_box(7)).expect("row exists"))));

    group.finish();
}

/// Benchmark the store-backed aggregations
fn benchmark_aggregation(c: &mut Criterion) {
    let (_temp_dir, db_path) = create_benchmark_database();
    let store = Store::open(&db_path).expect("Failed to open store");
    let mut group = c.benchmark_group("aggregation");

    group.bench_function("friend_listens", |b| {
        b.iter(|| friends::aggregate(&store, black_box("user42")).expect("aggregation runs"))
    });

    for rank_group in [RankGroup::ListensByArtist, RankGroup::CombinedByArtist] {
        group.bench_function(format!("{rank_group:?}"), |b| {
            b.iter(|| store.aggregate_scores(rank_group, black_box("user07")).expect("query runs"))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_merge, benchmark_paging, benchmark_aggregation);

criterion_main!(benches);
