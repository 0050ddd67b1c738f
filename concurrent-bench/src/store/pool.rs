//! Bounded connection pool over one SQLite file.
//!
//! Two knobs:
//! - `max_open`: ceiling on live connections (0 = unbounded). Acquirers above
//!   the ceiling block on a condition variable until a connection is returned
//!   or the acquire timeout elapses.
//! - `max_idle`: how many returned connections are kept warm. Surplus
//!   connections are closed on release.

use std::mem;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::{configure_connection, StoreOptions};

/// Idle connections kept when no explicit bound has been configured.
pub const DEFAULT_MAX_IDLE: usize = 2;

/// Snapshot of pool bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Live connections, idle or checked out.
    pub open: usize,
    pub idle: usize,
    pub max_open: usize,
    pub max_idle: usize,
}

/// Why a connection could not be handed out.
#[derive(Debug)]
pub(crate) enum AcquireError {
    Closed,
    Timeout(Duration),
    Connect(rusqlite::Error),
}

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
    max_open: usize,
    max_idle: usize,
    closed: bool,
}

pub(crate) struct ConnectionPool {
    path: PathBuf,
    options: StoreOptions,
    state: Mutex<PoolState>,
    released: Condvar,
}

impl ConnectionPool {
    /// Create the pool with one already-configured connection parked idle.
    pub(crate) fn with_initial(path: &Path, options: StoreOptions, first: Connection) -> Self {
        Self {
            path: path.to_path_buf(),
            options,
            state: Mutex::new(PoolState {
                idle: vec![first],
                open: 1,
                max_open: 0,
                max_idle: DEFAULT_MAX_IDLE,
                closed: false,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire(&self) -> Result<PooledConnection<'_>, AcquireError> {
        let deadline = Instant::now() + self.options.acquire_timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(AcquireError::Closed);
            }
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(self, conn));
            }
            if state.max_open == 0 || state.open < state.max_open {
                // Reserve the slot, then connect without holding the lock.
                state.open += 1;
                drop(state);
                return match open_connection(&self.path, &self.options) {
                    Ok(conn) => Ok(PooledConnection::new(self, conn)),
                    Err(e) => {
                        self.lock().open -= 1;
                        self.released.notify_one();
                        Err(AcquireError::Connect(e))
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AcquireError::Timeout(self.options.acquire_timeout));
            }
            let (guard, _) = self
                .released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    fn release(&self, conn: Connection) {
        let mut state = self.lock();
        let over_open = state.max_open > 0 && state.open > state.max_open;
        if state.closed || over_open || state.idle.len() >= state.max_idle {
            state.open -= 1;
            drop(state);
            drop(conn);
        } else {
            state.idle.push(conn);
            drop(state);
        }
        self.released.notify_one();
    }

    pub(crate) fn configure(&self, max_open: usize, max_idle: usize) {
        let surplus = {
            let mut state = self.lock();
            state.max_open = max_open;
            state.max_idle = if max_open > 0 {
                max_idle.min(max_open)
            } else {
                max_idle
            };
            let keep = state.idle.len().min(state.max_idle);
            let surplus = state.idle.split_off(keep);
            state.open -= surplus.len();
            surplus
        };
        drop(surplus);
        // A raised ceiling may unblock waiters.
        self.released.notify_all();
    }

    /// Mark the pool closed and drop every idle connection. Checked-out
    /// connections are dropped as they come back.
    pub(crate) fn close(&self) -> bool {
        let idle = {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            let idle = mem::take(&mut state.idle);
            state.open -= idle.len();
            idle
        };
        drop(idle);
        self.released.notify_all();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            open: state.open,
            idle: state.idle.len(),
            max_open: state.max_open,
            max_idle: state.max_idle,
        }
    }
}

pub(crate) fn open_connection(path: &Path, options: &StoreOptions) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(options.busy_timeout)?;
    configure_connection(&conn)?;
    Ok(conn)
}

/// A connection on loan from the pool; returned on drop.
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a ConnectionPool, conn: Connection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection is only taken on drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
