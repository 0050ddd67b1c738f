//! The single benchmark table and the statements issued against it.

use rusqlite::Row;

use crate::error::StoreError;
use crate::store::StoreHandle;

pub const CREATE_TABLE: &str =
    "CREATE TABLE bench_test (id INTEGER PRIMARY KEY, data TEXT, value INTEGER)";

pub const INSERT_ROW: &str = "INSERT INTO bench_test (data, value) VALUES (?1, ?2)";

pub const SELECT_BY_ID: &str = "SELECT data, value FROM bench_test WHERE id = ?1";

const SELECT_FULL_BY_ID: &str = "SELECT id, data, value FROM bench_test WHERE id = ?1";

const COUNT_ROWS: &str = "SELECT COUNT(*) FROM bench_test";

/// A persisted row. Written once by an insert, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchRow {
    pub id: i64,
    pub data: String,
    pub value: i64,
}

impl BenchRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            data: row.get(1)?,
            value: row.get(2)?,
        })
    }
}

/// Create `bench_test`. The store is expected to be fresh: an existing table
/// is a [`StoreError::Schema`] failure, not a no-op.
pub fn create_schema(handle: &StoreHandle) -> Result<(), StoreError> {
    handle.execute(CREATE_TABLE, []).map_err(|e| match e {
        StoreError::Exec(failure) => StoreError::Schema(failure),
        other => other,
    })?;
    log::debug!("Created bench_test in {}", handle.path().display());
    Ok(())
}

pub fn row_count(handle: &StoreHandle) -> Result<i64, StoreError> {
    handle.query_row(COUNT_ROWS, [], |r| r.get(0))
}

pub fn fetch_row(handle: &StoreHandle, id: i64) -> Result<BenchRow, StoreError> {
    handle.query_row(SELECT_FULL_BY_ID, [id], BenchRow::from_row)
}
