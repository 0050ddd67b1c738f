//! Fan-out / join: runs N identical workers against one shared handle.
//!
//! Workers are scoped threads borrowing the handle, so the handle provably
//! outlives every worker. Each worker returns its own [`WorkerReport`]; the
//! reports are merged only after the join barrier. A failing or panicking
//! worker never cancels its siblings.

use std::collections::BTreeMap;
use std::thread;

use crate::error::FailureKind;
use crate::store::StoreHandle;
use crate::workload::{WorkerReport, WorkerTask, Workload};

/// Error messages kept per [`RunOutcome`] and per accumulated scenario result.
pub const MAX_SAMPLE_ERRORS: usize = 5;

/// Merged result of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub workers: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    /// First error of each failing worker, capped at a handful.
    pub sample_errors: Vec<String>,
}

impl RunOutcome {
    fn absorb(&mut self, report: WorkerReport) {
        self.attempted += report.attempted;
        self.succeeded += report.succeeded;
        for (kind, count) in report.failures {
            *self.failures.entry(kind).or_insert(0) += count;
        }
        if let Some(msg) = report.first_error {
            self.push_sample(format!("worker {}: {msg}", report.worker_id));
        }
    }

    fn lose_worker(&mut self, worker_id: usize, ops_per_worker: usize, reason: &str) {
        self.attempted += ops_per_worker;
        *self.failures.entry(FailureKind::Worker).or_insert(0) += ops_per_worker;
        self.push_sample(format!("worker {worker_id}: {reason}"));
    }

    fn push_sample(&mut self, msg: String) {
        if self.sample_errors.len() < MAX_SAMPLE_ERRORS {
            self.sample_errors.push(msg);
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Spawn `concurrency` workers with ids `0..concurrency`, each running
/// `workload` for `ops_per_worker` operations, and block until all finish.
pub fn run(
    handle: &StoreHandle,
    concurrency: usize,
    ops_per_worker: usize,
    workload: &dyn Workload,
) -> RunOutcome {
    let mut outcome = RunOutcome {
        workers: concurrency,
        ..RunOutcome::default()
    };
    if concurrency == 0 {
        return outcome;
    }

    log::debug!(
        "Spawning {concurrency} {} workers x {ops_per_worker} ops",
        workload.kind().as_str()
    );

    thread::scope(|scope| {
        let workers: Vec<_> = (0..concurrency)
            .map(|worker_id| {
                let task = WorkerTask {
                    worker_id,
                    ops_per_worker,
                };
                let spawned = thread::Builder::new()
                    .name(format!("bench-worker-{worker_id}"))
                    .spawn_scoped(scope, move || workload.run_worker(handle, task));
                (worker_id, spawned)
            })
            .collect();

        // Join barrier.
        for (worker_id, spawned) in workers {
            match spawned {
                Ok(join) => match join.join() {
                    Ok(report) => outcome.absorb(report),
                    Err(_) => {
                        log::error!("worker {worker_id} panicked");
                        outcome.lose_worker(worker_id, ops_per_worker, "panicked");
                    }
                },
                Err(e) => {
                    log::error!("failed to spawn worker {worker_id}: {e}");
                    outcome.lose_worker(worker_id, ops_per_worker, "could not be spawned");
                }
            }
        }
    });

    log::debug!(
        "All {concurrency} workers joined: {} ok, {} failed",
        outcome.succeeded,
        outcome.failed()
    );
    outcome
}
