//! Workload generators: the operation sequence one worker performs.
//!
//! The op-sequence math lives in free functions ([`write_op`], [`read_key`])
//! so it can be checked without a store. The generators drive those
//! sequences against a shared [`StoreHandle`].
//!
//! Failure policy is continue-and-count: a failed operation is recorded in the
//! worker's [`WorkerReport`] and the loop moves on to the next one.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use rusqlite::params;

use crate::error::{FailureKind, StoreError};
use crate::schema::{INSERT_ROW, SELECT_BY_ID};
use crate::store::StoreHandle;

/// Operations each worker issues per scenario.
pub const OPS_PER_WORKER: usize = 50;

/// Rows inserted before a read scenario.
pub const SEED_ROWS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkloadKind {
    Write,
    Read,
}

impl WorkloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::Write => "write",
            WorkloadKind::Read => "read",
        }
    }
}

/// One worker's assignment, handed over at fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTask {
    pub worker_id: usize,
    pub ops_per_worker: usize,
}

/// What one worker observed.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    /// First failure message, kept for the scenario summary.
    pub first_error: Option<String>,
}

impl WorkerReport {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    pub fn record<T>(&mut self, op: usize, result: Result<T, StoreError>) {
        self.attempted += 1;
        match result {
            Ok(_) => self.succeeded += 1,
            Err(e) => {
                *self.failures.entry(e.kind()).or_insert(0) += 1;
                if self.first_error.is_none() {
                    log::warn!("worker {} op {op}: {e}", self.worker_id);
                    self.first_error = Some(e.to_string());
                } else {
                    log::debug!("worker {} op {op}: {e}", self.worker_id);
                }
            }
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

/// A workload that can be fanned out across workers sharing one handle.
pub trait Workload: Sync {
    fn kind(&self) -> WorkloadKind;

    /// Run one worker's full operation sequence. Operations are issued one at
    /// a time, each waiting for its result.
    fn run_worker(&self, handle: &StoreHandle, task: WorkerTask) -> WorkerReport;
}

/// Payload and value of write op `op` issued by `worker_id`.
pub fn write_op(worker_id: usize, op: usize) -> (String, i64) {
    (
        format!("w{worker_id}_o{op}"),
        (worker_id * 1000 + op) as i64,
    )
}

/// Primary key looked up by read op `op` of `worker_id`.
///
/// Always in `[1, row_count]`, so every lookup lands on a seeded row without
/// any coordination between workers.
pub fn read_key(worker_id: usize, op: usize, ops_per_worker: usize, row_count: NonZeroUsize) -> i64 {
    ((worker_id * ops_per_worker + op) % row_count.get() + 1) as i64
}

/// Bulk-insert workload.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteGenerator;

impl Workload for WriteGenerator {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Write
    }

    fn run_worker(&self, handle: &StoreHandle, task: WorkerTask) -> WorkerReport {
        let mut report = WorkerReport::new(task.worker_id);
        for op in 0..task.ops_per_worker {
            let (data, value) = write_op(task.worker_id, op);
            report.record(op, handle.execute(INSERT_ROW, params![data, value]));
        }
        report
    }
}

/// Rows written by [`ReadGenerator::seed`].
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub inserted: usize,
    pub failed: usize,
}

/// Point-lookup workload over a seeded key space `1..=row_count`.
#[derive(Debug, Clone, Copy)]
pub struct ReadGenerator {
    row_count: NonZeroUsize,
}

impl ReadGenerator {
    pub fn new(row_count: NonZeroUsize) -> Self {
        Self { row_count }
    }

    pub fn row_count(&self) -> NonZeroUsize {
        self.row_count
    }

    /// Insert `("data_{i}", i)` for every `i < row_count`.
    ///
    /// Individual insert failures are counted and the seed carries on. A
    /// closed handle aborts the seed, since no later insert could succeed.
    pub fn seed(&self, handle: &StoreHandle) -> Result<SeedReport, StoreError> {
        let mut report = SeedReport::default();
        for i in 0..self.row_count.get() {
            match handle.execute(INSERT_ROW, params![format!("data_{i}"), i as i64]) {
                Ok(_) => report.inserted += 1,
                Err(StoreError::Closed) => return Err(StoreError::Closed),
                Err(e) => {
                    log::warn!("seed row {i} failed: {e}");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

impl Workload for ReadGenerator {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Read
    }

    fn run_worker(&self, handle: &StoreHandle, task: WorkerTask) -> WorkerReport {
        let mut report = WorkerReport::new(task.worker_id);
        for op in 0..task.ops_per_worker {
            let id = read_key(task.worker_id, op, task.ops_per_worker, self.row_count);
            let row = handle.query_row(SELECT_BY_ID, [id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
            });
            report.record(op, row);
        }
        report
    }
}
