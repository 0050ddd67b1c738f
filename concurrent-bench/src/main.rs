//! Standalone benchmark runner that prints the formatted report.
//!
//! Sets up a fresh store, runs the selected scenarios in order, tears the
//! store down and prints one line per scenario. Settings can come from flags,
//! environment variables or a `.env` file in the working directory.
//!
//! Usage:
//!   cargo run --release
//!   cargo run --release -- --scenario concurrent_read/8 --samples 5
//!   cargo run --release -- --list

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use concurrent_bench::config::{
    BenchConfig, DEFAULT_ACQUIRE_TIMEOUT_MS, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DB_PATH,
    DEFAULT_MAX_IDLE, DEFAULT_MAX_OPEN,
};
use concurrent_bench::env::BenchEnvironment;
use concurrent_bench::logging::initialize_logger;
use concurrent_bench::report::{print_report, ScenarioResult};
use concurrent_bench::suite::{BenchmarkSuite, Stopwatch};
use concurrent_bench::workload::OPS_PER_WORKER;
use concurrent_bench::StoreError;

#[derive(Parser, Debug)]
#[command(name = "concurrent-bench")]
#[command(about = "Measure SQLite insert and point-lookup throughput as client concurrency grows")]
struct Args {
    /// Store file. Deleted before the run and again after it.
    #[arg(long, env = "CONCURRENT_BENCH_DB", default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// Ceiling on simultaneously open connections (0 = unbounded)
    #[arg(long, env = "CONCURRENT_BENCH_MAX_OPEN", default_value_t = DEFAULT_MAX_OPEN)]
    max_open: usize,

    /// Connections kept idle between operations
    #[arg(long, env = "CONCURRENT_BENCH_MAX_IDLE", default_value_t = DEFAULT_MAX_IDLE)]
    max_idle: usize,

    /// SQLite busy handler timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    busy_timeout_ms: u64,

    /// How long a worker waits for a pooled connection, in milliseconds
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_MS)]
    acquire_timeout_ms: u64,

    /// Run only this scenario (repeatable), e.g. `concurrent_write/4`
    #[arg(short, long = "scenario")]
    scenarios: Vec<String>,

    /// List scenario names and exit
    #[arg(long)]
    list: bool,

    /// Timed runs per scenario
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    samples: u32,

    #[arg(long, env = "CONCURRENT_BENCH_LOG", default_value = "info")]
    log_level: LevelFilter,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> BenchConfig {
        BenchConfig {
            db_path: self.db_path.clone(),
            max_open: self.max_open,
            max_idle: self.max_idle,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        }
    }
}

fn run_suite(
    suite: &BenchmarkSuite,
    env: &BenchEnvironment,
    samples: u32,
) -> Result<Vec<ScenarioResult>, StoreError> {
    let mut timer = Stopwatch::default();
    let mut results = Vec::with_capacity(suite.scenarios().len());
    for scenario in suite.scenarios() {
        let mut result = ScenarioResult::new(*scenario);
        eprint!("  Benchmarking {}...", result.name);
        for _ in 0..samples {
            let report = suite.run_scenario(env.handle(), scenario, &mut timer)?;
            result.add_sample(&report);
        }
        if result.is_clean() {
            eprintln!(" done ({:.2}ms mean)", result.mean_us() / 1000.0);
        } else {
            eprintln!(
                " done ({:.2}ms mean, {} failed ops)",
                result.mean_us() / 1000.0,
                result.failed()
            );
        }
        results.push(result);
    }
    Ok(results)
}

fn run(args: &Args) -> Result<()> {
    let suite = BenchmarkSuite::standard();
    if args.list {
        for scenario in suite.scenarios() {
            println!("{}", scenario.name());
        }
        return Ok(());
    }
    let suite = if args.scenarios.is_empty() {
        suite
    } else {
        suite.filtered(&args.scenarios)?
    };

    let config = args.config();
    println!("Running concurrent store benchmark...");
    println!("  Store:           {}", config.db_path.display());
    println!("  Pool:            max_open={} max_idle={}", config.max_open, config.max_idle);
    println!("  Ops per worker:  {OPS_PER_WORKER}");
    println!("  Samples:         {}", args.samples);

    let env = BenchEnvironment::setup(&config)
        .with_context(|| format!("setting up store at {}", config.db_path.display()))?;

    let outcome = run_suite(&suite, &env, args.samples);
    env.teardown().context("tearing down store")?;
    let results = outcome.context("running scenarios")?;

    print_report(&results);
    Ok(())
}

fn main() {
    // A missing .env is fine; flags and defaults cover everything.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    if let Err(e) = initialize_logger(args.log_level, args.log_file.as_deref()) {
        eprintln!("Failed to initialize logger: {e:#}. Exiting.");
        process::exit(1);
    }

    if let Err(e) = run(&args) {
        log::error!("{e:#}");
        process::exit(1);
    }
}
