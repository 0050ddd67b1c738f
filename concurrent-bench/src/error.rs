//! Error taxonomy for store access.
//!
//! Setup and teardown errors (`Open`, `Schema`, `Cleanup`) are fatal to a run.
//! Per-operation errors (`Exec`, `Query`, `Scan`, `Closed`) are counted against
//! the scenario that produced them and never abort a worker.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a single statement could not complete.
#[derive(Debug, Error)]
pub enum OpFailure {
    #[error(transparent)]
    Engine(#[from] rusqlite::Error),
    #[error("timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create schema: {0}")]
    Schema(#[source] OpFailure),
    #[error("write statement failed: {0}")]
    Exec(#[source] OpFailure),
    #[error("query failed: {0}")]
    Query(#[source] OpFailure),
    #[error("failed to decode row: {0}")]
    Scan(#[source] rusqlite::Error),
    #[error("store handle is closed")]
    Closed,
    #[error("failed to remove store file {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StoreError::Open { .. } => FailureKind::Open,
            StoreError::Schema(_) => FailureKind::Schema,
            StoreError::Exec(_) => FailureKind::Exec,
            StoreError::Query(_) => FailureKind::Query,
            StoreError::Scan(_) => FailureKind::Scan,
            StoreError::Closed => FailureKind::Closed,
            StoreError::Cleanup { .. } => FailureKind::Cleanup,
        }
    }

    /// Classify a `query_row` failure: decode problems are `Scan`, everything
    /// else (including "no rows") is `Query`.
    pub(crate) fn from_query(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::Scan(err),
            other => StoreError::Query(OpFailure::Engine(other)),
        }
    }
}

/// Coarse error class used to tally per-operation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    Open,
    Schema,
    Exec,
    Query,
    Scan,
    Closed,
    Cleanup,
    /// A worker thread could not be spawned or panicked; its remaining
    /// operations never ran.
    Worker,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Open => "open",
            FailureKind::Schema => "schema",
            FailureKind::Exec => "exec",
            FailureKind::Query => "query",
            FailureKind::Scan => "scan",
            FailureKind::Closed => "closed",
            FailureKind::Cleanup => "cleanup",
            FailureKind::Worker => "worker",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
