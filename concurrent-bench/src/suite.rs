//! The ordered scenario table and the per-scenario timing protocol.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::error::StoreError;
use crate::report::ScenarioReport;
use crate::runner;
use crate::store::StoreHandle;
use crate::workload::{ReadGenerator, WorkloadKind, WriteGenerator, OPS_PER_WORKER, SEED_ROWS};

/// Concurrency levels in the standard suite.
pub const CONCURRENCY_LEVELS: [usize; 5] = [1, 2, 4, 8, 10];

/// One (workload, concurrency) configuration, executed as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub kind: WorkloadKind,
    pub concurrency: usize,
    pub ops_per_worker: usize,
}

impl Scenario {
    pub const fn write(concurrency: usize) -> Self {
        Self {
            kind: WorkloadKind::Write,
            concurrency,
            ops_per_worker: OPS_PER_WORKER,
        }
    }

    pub const fn read(concurrency: usize) -> Self {
        Self {
            kind: WorkloadKind::Read,
            concurrency,
            ops_per_worker: OPS_PER_WORKER,
        }
    }

    /// `concurrent_write/4`, `concurrent_read/10`, ...
    pub fn name(&self) -> String {
        format!("concurrent_{}/{}", self.kind.as_str(), self.concurrency)
    }

    pub fn total_ops(&self) -> usize {
        self.concurrency * self.ops_per_worker
    }
}

/// Where a scenario is in its run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScenarioPhase {
    Idle,
    /// Read scenarios only: untimed pre-population.
    Seeding,
    Timing,
    Done,
}

impl ScenarioPhase {
    /// The phase that follows `self` for a scenario of `kind`, or `None` once done.
    pub fn next(self, kind: WorkloadKind) -> Option<Self> {
        match (self, kind) {
            (ScenarioPhase::Idle, WorkloadKind::Read) => Some(ScenarioPhase::Seeding),
            (ScenarioPhase::Idle, WorkloadKind::Write) => Some(ScenarioPhase::Timing),
            (ScenarioPhase::Seeding, _) => Some(ScenarioPhase::Timing),
            (ScenarioPhase::Timing, _) => Some(ScenarioPhase::Done),
            (ScenarioPhase::Done, _) => None,
        }
    }
}

/// The measurement capability a scenario is timed with.
pub trait Timer {
    /// Restart timing from now, discarding anything measured so far.
    fn reset(&mut self);
    fn elapsed(&self) -> Duration;
}

/// Wall-clock [`Timer`].
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Timer for Stopwatch {
    fn reset(&mut self) {
        self.started = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Error)]
#[error("unknown scenario `{0}`")]
pub struct UnknownScenario(pub String);

/// Ordered scenario list. Scenarios run one after another; only the workers
/// inside a scenario run concurrently.
#[derive(Debug, Clone)]
pub struct BenchmarkSuite {
    scenarios: Vec<Scenario>,
    seed_rows: NonZeroUsize,
}

impl BenchmarkSuite {
    pub fn new(scenarios: Vec<Scenario>, seed_rows: NonZeroUsize) -> Self {
        Self {
            scenarios,
            seed_rows,
        }
    }

    /// Writes then reads at every level of [`CONCURRENCY_LEVELS`], 50 ops per
    /// worker, reads over 1000 seeded rows.
    pub fn standard() -> Self {
        let scenarios = CONCURRENCY_LEVELS
            .iter()
            .map(|&c| Scenario::write(c))
            .chain(CONCURRENCY_LEVELS.iter().map(|&c| Scenario::read(c)))
            .collect();
        let seed_rows = NonZeroUsize::new(SEED_ROWS).unwrap_or(NonZeroUsize::MIN);
        Self::new(scenarios, seed_rows)
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn seed_rows(&self) -> NonZeroUsize {
        self.seed_rows
    }

    pub fn find(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name() == name)
    }

    /// Keep only the named scenarios, in suite order.
    pub fn filtered<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, UnknownScenario> {
        let wanted: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        if let Some(missing) = wanted.iter().find(|n| self.find(n).is_none()) {
            return Err(UnknownScenario(missing.to_string()));
        }
        let scenarios = self
            .scenarios
            .iter()
            .filter(|s| wanted.contains(&s.name().as_str()))
            .copied()
            .collect();
        Ok(Self::new(scenarios, self.seed_rows))
    }

    /// Run one scenario: seed (reads only, untimed), reset the timer, fan out,
    /// read the timer after the join barrier.
    ///
    /// Per-operation failures land in the report. Only a closed handle makes
    /// the scenario itself fail.
    pub fn run_scenario(
        &self,
        handle: &StoreHandle,
        scenario: &Scenario,
        timer: &mut dyn Timer,
    ) -> Result<ScenarioReport, StoreError> {
        if handle.is_closed() {
            return Err(StoreError::Closed);
        }
        let name = scenario.name();
        let mut phase = ScenarioPhase::Idle;

        let reader = ReadGenerator::new(self.seed_rows);
        let mut seed = None;
        if scenario.kind == WorkloadKind::Read {
            phase = advance(phase, scenario.kind, &name);
            let seeded = reader.seed(handle)?;
            log::debug!(
                "{name}: seeded {} rows ({} failed)",
                seeded.inserted,
                seeded.failed
            );
            seed = Some(seeded);
        }

        phase = advance(phase, scenario.kind, &name);
        timer.reset();
        let outcome = match scenario.kind {
            WorkloadKind::Write => runner::run(
                handle,
                scenario.concurrency,
                scenario.ops_per_worker,
                &WriteGenerator,
            ),
            WorkloadKind::Read => runner::run(
                handle,
                scenario.concurrency,
                scenario.ops_per_worker,
                &reader,
            ),
        };
        let elapsed = timer.elapsed();
        let phase = advance(phase, scenario.kind, &name);
        debug_assert_eq!(phase, ScenarioPhase::Done, "{name} finished early");

        Ok(ScenarioReport {
            scenario: *scenario,
            elapsed,
            outcome,
            seed,
        })
    }

    /// Run every scenario in order with a fresh reset of `timer` for each.
    pub fn run_all(
        &self,
        handle: &StoreHandle,
        timer: &mut dyn Timer,
    ) -> Result<Vec<ScenarioReport>, StoreError> {
        let mut reports = Vec::with_capacity(self.scenarios.len());
        for scenario in &self.scenarios {
            reports.push(self.run_scenario(handle, scenario, timer)?);
        }
        Ok(reports)
    }
}

fn advance(phase: ScenarioPhase, kind: WorkloadKind, name: &str) -> ScenarioPhase {
    let next = phase.next(kind).unwrap_or(ScenarioPhase::Done);
    debug_assert!(next > phase, "{name}: phase cannot move {phase:?} -> {next:?}");
    log::trace!("{name}: {phase:?} -> {next:?}");
    next
}
