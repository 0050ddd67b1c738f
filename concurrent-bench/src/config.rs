//! Run configuration: where the transient store lives and how the pool is bounded.

use std::path::PathBuf;
use std::time::Duration;

use crate::store::StoreOptions;

pub const DEFAULT_DB_PATH: &str = "concurrent_test.db";
pub const DEFAULT_MAX_OPEN: usize = 20;
pub const DEFAULT_MAX_IDLE: usize = 10;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Store file; deleted before setup and after teardown.
    pub db_path: PathBuf,
    pub max_open: usize,
    pub max_idle: usize,
    pub busy_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_open: DEFAULT_MAX_OPEN,
            max_idle: DEFAULT_MAX_IDLE,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
        }
    }
}

impl BenchConfig {
    /// Defaults with the store placed at `db_path`.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: self.busy_timeout,
            acquire_timeout: self.acquire_timeout,
        }
    }
}
