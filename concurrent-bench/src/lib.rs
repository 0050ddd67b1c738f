//! Concurrent Store Benchmark
//!
//! Measures how insert and point-lookup throughput against a file-backed
//! SQLite store scale with the number of concurrent clients. All workers
//! share one pool-backed [`store::StoreHandle`]; the pool's `max_open` bound
//! is the throttle, so the numbers include connection contention.
//!
//! Two workloads are run at concurrency 1, 2, 4, 8 and 10, 50 ops per worker:
//! - **write**: each worker inserts rows keyed by its id
//! - **read**: 1000 rows are seeded (untimed), then each worker looks up a
//!   deterministic slice of primary keys
//!
//! Run benchmarks: `cargo bench`
//! Run the standalone report: `cargo run --release`
//! Run tests: `cargo test`

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod report;
pub mod runner;
pub mod schema;
pub mod store;
pub mod suite;
pub mod workload;

pub use error::{FailureKind, OpFailure, StoreError};
pub use store::StoreHandle;
