//! Integration tests: environment lifecycle, write/read scenarios end to end,
//! and the store's behaviour under concurrent writers.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use concurrent_bench::config::BenchConfig;
use concurrent_bench::env::BenchEnvironment;
use concurrent_bench::error::{FailureKind, StoreError};
use concurrent_bench::report::ScenarioResult;
use concurrent_bench::runner;
use concurrent_bench::schema::{create_schema, row_count, SELECT_BY_ID};
use concurrent_bench::suite::{BenchmarkSuite, Scenario, Stopwatch, CONCURRENCY_LEVELS};
use concurrent_bench::workload::{
    read_key, ReadGenerator, WriteGenerator, OPS_PER_WORKER, SEED_ROWS,
};
use rusqlite::Connection;
use tempfile::TempDir;

fn fresh_env() -> (TempDir, BenchEnvironment) {
    let dir = TempDir::new().expect("temp dir");
    let config = BenchConfig::at(dir.path().join("concurrent_test.db"));
    let env = BenchEnvironment::setup(&config).expect("setup");
    (dir, env)
}

/// Side connection for inspecting the store outside the handle's pool.
fn inspect(env: &BenchEnvironment) -> Connection {
    Connection::open(env.path()).expect("open inspection connection")
}

fn all_values(conn: &Connection) -> Vec<i64> {
    let mut stmt = conn
        .prepare("SELECT value FROM bench_test ORDER BY value")
        .unwrap();
    let values = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<Vec<i64>, _>>()
        .unwrap();
    values
}

// ── Write scenarios ─────────────────────────────────────────────────

#[test]
fn write_scenarios_insert_exactly_concurrency_times_ops() {
    let (_dir, env) = fresh_env();
    let suite = BenchmarkSuite::standard();
    let mut timer = Stopwatch::default();

    for concurrency in CONCURRENCY_LEVELS {
        let before = row_count(env.handle()).unwrap();
        let report = suite
            .run_scenario(env.handle(), &Scenario::write(concurrency), &mut timer)
            .unwrap();

        assert!(report.is_clean(), "{:?}", report.outcome.sample_errors);
        assert_eq!(report.outcome.attempted, concurrency * OPS_PER_WORKER);
        let after = row_count(env.handle()).unwrap();
        assert_eq!((after - before) as usize, concurrency * OPS_PER_WORKER);
    }

    let conn = inspect(&env);
    let (total, distinct): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), COUNT(DISTINCT id) FROM bench_test",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(total, distinct);
    assert_eq!(total as usize, CONCURRENCY_LEVELS.iter().sum::<usize>() * OPS_PER_WORKER);

    drop(conn);
    env.teardown().unwrap();
}

#[test]
fn concurrent_writers_lose_nothing_and_duplicate_nothing() {
    let (_dir, env) = fresh_env();

    let outcome = runner::run(env.handle(), 10, OPS_PER_WORKER, &WriteGenerator);
    assert!(outcome.is_clean(), "{:?}", outcome.sample_errors);
    assert_eq!(outcome.succeeded, 500);

    let conn = inspect(&env);
    let ids: Vec<i64> = conn
        .prepare("SELECT id FROM bench_test")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let unique: BTreeSet<i64> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 500);
    assert_eq!(unique.len(), 500);

    let expected: Vec<i64> = (0..10)
        .flat_map(|w| (0..OPS_PER_WORKER).map(move |j| (w * 1000 + j) as i64))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    assert_eq!(all_values(&conn), expected);
}

#[test]
fn end_to_end_write_with_two_workers() {
    let (_dir, env) = fresh_env();
    let suite = BenchmarkSuite::standard();
    let mut timer = Stopwatch::default();

    let report = suite
        .run_scenario(env.handle(), &Scenario::write(2), &mut timer)
        .unwrap();
    assert!(report.is_clean());
    assert!(report.seed.is_none());
    assert_eq!(row_count(env.handle()).unwrap(), 100);

    let conn = inspect(&env);
    for value in all_values(&conn) {
        let (worker, op) = (value / 1000, value % 1000);
        assert!((0..2).contains(&worker), "value {value}");
        assert!((0..50).contains(&op), "value {value}");
    }
    let data_ok: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM bench_test WHERE data = 'w' || (value / 1000) || '_o' || (value % 1000)",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(data_ok, 100);
}

// ── Read scenarios ──────────────────────────────────────────────────

#[test]
fn every_lookup_key_is_inside_the_seeded_range() {
    let rows = NonZeroUsize::new(SEED_ROWS).unwrap();
    for worker in 0..10 {
        for op in 0..OPS_PER_WORKER {
            let id = read_key(worker, op, OPS_PER_WORKER, rows);
            assert!((1..=SEED_ROWS as i64).contains(&id));
        }
    }
}

#[test]
fn end_to_end_read_with_four_workers() {
    let (_dir, env) = fresh_env();
    let suite = BenchmarkSuite::standard();
    let mut timer = Stopwatch::default();

    let report = suite
        .run_scenario(env.handle(), &Scenario::read(4), &mut timer)
        .unwrap();

    let seed = report.seed.as_ref().expect("read scenario seeds");
    assert_eq!(seed.inserted, 1000);
    assert_eq!(seed.failed, 0);
    assert_eq!(report.outcome.attempted, 200);
    assert_eq!(report.outcome.succeeded, 200);
    assert_eq!(report.outcome.failures.get(&FailureKind::Query), None);
    assert_eq!(report.outcome.failures.get(&FailureKind::Scan), None);
}

#[test]
fn repeated_read_scenarios_reseed_and_stay_clean() {
    let (_dir, env) = fresh_env();
    let suite = BenchmarkSuite::standard();
    let mut timer = Stopwatch::default();
    let mut result = ScenarioResult::new(Scenario::read(10));

    for _ in 0..2 {
        let report = suite
            .run_scenario(env.handle(), &Scenario::read(10), &mut timer)
            .unwrap();
        result.add_sample(&report);
    }
    assert!(result.is_clean());
    assert_eq!(result.attempted, 1000);
    assert_eq!(row_count(env.handle()).unwrap(), 2000);
}

#[test]
fn lookups_decode_seeded_rows() {
    let (_dir, env) = fresh_env();
    let reader = ReadGenerator::new(NonZeroUsize::new(10).unwrap());
    reader.seed(env.handle()).unwrap();

    let (data, value): (String, i64) = env
        .handle()
        .query_row(SELECT_BY_ID, [7], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap();
    assert_eq!(data, "data_6");
    assert_eq!(value, 6);

    let err = env
        .handle()
        .query_row(SELECT_BY_ID, [7], |r| r.get::<_, i64>(0))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Scan);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[test]
fn second_schema_creation_fails() {
    let (_dir, env) = fresh_env();
    let err = create_schema(env.handle()).unwrap_err();
    assert!(matches!(err, StoreError::Schema(_)), "{err}");
    // Still usable afterwards.
    assert_eq!(row_count(env.handle()).unwrap(), 0);
}

#[test]
fn closed_handle_fails_every_operation() {
    let (_dir, env) = fresh_env();
    let suite = BenchmarkSuite::standard();
    let mut timer = Stopwatch::default();
    env.handle().close().unwrap();

    assert!(matches!(row_count(env.handle()), Err(StoreError::Closed)));
    assert!(matches!(
        env.handle().execute("DELETE FROM bench_test", []),
        Err(StoreError::Closed)
    ));
    assert!(matches!(
        suite.run_scenario(env.handle(), &Scenario::write(1), &mut timer),
        Err(StoreError::Closed)
    ));

    // Workers started against a closed handle record failures, not panics.
    let outcome = runner::run(env.handle(), 2, 3, &WriteGenerator);
    assert_eq!(outcome.failures.get(&FailureKind::Closed), Some(&6));
}

#[test]
fn teardown_removes_the_store() {
    let (_dir, env) = fresh_env();
    let path = env.path().to_path_buf();
    assert!(path.exists());
    env.teardown().unwrap();
    assert!(!path.exists());
}

#[test]
fn tight_pool_still_completes_every_operation() {
    let dir = TempDir::new().unwrap();
    let mut config = BenchConfig::at(dir.path().join("tight.db"));
    config.max_open = 2;
    config.max_idle = 1;
    let env = BenchEnvironment::setup(&config).unwrap();

    let outcome = runner::run(env.handle(), 8, 20, &WriteGenerator);
    assert!(outcome.is_clean(), "{:?}", outcome.sample_errors);
    assert_eq!(row_count(env.handle()).unwrap(), 160);
    assert!(env.handle().pool_stats().open <= 2);

    env.teardown().unwrap();
}
