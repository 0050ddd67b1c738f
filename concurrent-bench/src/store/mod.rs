//! `StoreHandle`: the single shared, pool-backed handle to the benchmark store.
//!
//! Every call checks a connection out of the pool, runs one statement and
//! hands the connection back. Nothing is cached between calls.

pub mod pool;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Params, Row};

use crate::error::{OpFailure, StoreError};
use pool::{open_connection, AcquireError, ConnectionPool, PooledConnection};

pub use pool::PoolStats;

/// Engine-level tuning applied to every pooled connection.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long SQLite's busy handler retries a locked database.
    pub busy_timeout: Duration,
    /// How long a caller waits for a free slot when the pool is at `max_open`.
    pub acquire_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

pub struct StoreHandle {
    path: PathBuf,
    pool: ConnectionPool,
}

impl StoreHandle {
    /// Create or open the store at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };

        let first = open_connection(path, &options).map_err(open_err)?;
        init_database(&first).map_err(open_err)?;
        log::debug!("Opened store at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            pool: ConnectionPool::with_initial(path, options, first),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set pool bounds. Call before concurrent use begins.
    ///
    /// `max_open = 0` leaves the pool unbounded; `max_idle` is clamped to
    /// `max_open` otherwise.
    pub fn configure_pool(&self, max_open: usize, max_idle: usize) {
        self.pool.configure(max_open, max_idle);
        log::debug!("Pool bounds set: max_open={max_open}, max_idle={max_idle}");
    }

    /// Run one write statement and return the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, StoreError> {
        let conn = self.checkout(StoreError::Exec)?;
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| StoreError::Exec(e.into()))?;
        stmt.execute(params).map_err(|e| StoreError::Exec(e.into()))
    }

    /// Run a query expected to return exactly one row and decode it with `map`.
    ///
    /// Zero rows or an engine failure is [`StoreError::Query`]; a column that
    /// cannot be decoded into the requested type is [`StoreError::Scan`].
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<T, StoreError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.checkout(StoreError::Query)?;
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| StoreError::Query(e.into()))?;
        stmt.query_row(params, map).map_err(StoreError::from_query)
    }

    /// Release the pool. Every later call on this handle fails with
    /// [`StoreError::Closed`], including a second `close`.
    pub fn close(&self) -> Result<(), StoreError> {
        if !self.pool.close() {
            return Err(StoreError::Closed);
        }
        log::debug!("Closed store at {}", self.path.display());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn checkout(
        &self,
        wrap: fn(OpFailure) -> StoreError,
    ) -> Result<PooledConnection<'_>, StoreError> {
        self.pool.acquire().map_err(|e| match e {
            AcquireError::Closed => StoreError::Closed,
            AcquireError::Timeout(waited) => wrap(OpFailure::PoolTimeout(waited)),
            AcquireError::Connect(source) => wrap(OpFailure::Engine(source)),
        })
    }
}

/// One-time database-level settings, applied on the connection that opens the file.
pub(crate) fn init_database(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")
}

/// Per-connection settings for concurrent file-backed access.
pub(crate) fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;",
    )
}
