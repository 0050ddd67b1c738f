//! Report module: per-scenario timing, throughput and failure summary.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::FailureKind;
use crate::runner::{RunOutcome, MAX_SAMPLE_ERRORS};
use crate::suite::Scenario;
use crate::workload::SeedReport;

/// Outcome of a single timed run of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    /// Wall time from timer reset until every worker joined.
    pub elapsed: Duration,
    pub outcome: RunOutcome,
    /// Present for read scenarios.
    pub seed: Option<SeedReport>,
}

impl ScenarioReport {
    pub fn is_clean(&self) -> bool {
        self.outcome.is_clean()
    }

    pub fn ops_per_sec(&self) -> f64 {
        ops_per_sec(self.outcome.attempted, self.elapsed)
    }
}

fn ops_per_sec(ops: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    ops as f64 / secs
}

/// Samples of one scenario accumulated across repeated runs.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub scenario: Scenario,
    pub durations: Vec<Duration>,
    pub attempted: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub seed_failures: usize,
    pub sample_errors: Vec<String>,
}

impl ScenarioResult {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            name: scenario.name(),
            scenario,
            durations: Vec::new(),
            attempted: 0,
            failures: BTreeMap::new(),
            seed_failures: 0,
            sample_errors: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, report: &ScenarioReport) {
        self.durations.push(report.elapsed);
        self.attempted += report.outcome.attempted;
        for (&kind, &count) in &report.outcome.failures {
            *self.failures.entry(kind).or_insert(0) += count;
        }
        if let Some(seed) = &report.seed {
            self.seed_failures += seed.failed;
        }
        for msg in &report.outcome.sample_errors {
            if self.sample_errors.len() < MAX_SAMPLE_ERRORS && !self.sample_errors.contains(msg) {
                self.sample_errors.push(msg.clone());
            }
        }
    }

    pub fn samples(&self) -> usize {
        self.durations.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.seed_failures == 0
    }

    pub fn mean_us(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.durations.iter().map(|d| d.as_secs_f64() * 1e6).sum();
        sum / self.durations.len() as f64
    }

    /// Operations per second over all samples.
    pub fn ops_per_sec(&self) -> f64 {
        ops_per_sec(self.attempted, self.durations.iter().sum())
    }

    /// Mean wall time per operation, all workers combined.
    pub fn us_per_op(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        let total: Duration = self.durations.iter().sum();
        total.as_secs_f64() * 1e6 / self.attempted as f64
    }

    fn failure_breakdown(&self) -> String {
        let mut out = String::new();
        for (kind, count) in &self.failures {
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "{kind}={count}");
        }
        if self.seed_failures > 0 {
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "seed={}", self.seed_failures);
        }
        out
    }
}

/// Render the comparison table.
pub fn render_report(results: &[ScenarioResult]) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "  Concurrent Store Benchmark Report");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "  {:22} {:>7} {:>7} {:>12} {:>12} {:>10} {:>8}",
        "Scenario", "Workers", "Samples", "Mean (ms)", "Ops/s", "µs/op", "Failed"
    );
    let _ = writeln!(out, "  {}", "-".repeat(84));

    for r in results {
        let flag = if r.is_clean() { "" } else { "  !" };
        let _ = writeln!(
            out,
            "  {:22} {:>7} {:>7} {:>12.2} {:>12.1} {:>10.1} {:>8}{flag}",
            r.name,
            r.scenario.concurrency,
            r.samples(),
            r.mean_us() / 1000.0,
            r.ops_per_sec(),
            r.us_per_op(),
            r.failed(),
        );
    }

    let dirty: Vec<&ScenarioResult> = results.iter().filter(|r| !r.is_clean()).collect();
    if !dirty.is_empty() {
        let _ = writeln!(out, "\n  Failures:");
        for r in dirty {
            let _ = writeln!(out, "  {:22} {}", r.name, r.failure_breakdown());
            for msg in &r.sample_errors {
                let _ = writeln!(out, "    - {msg}");
            }
        }
    }

    let _ = writeln!(out, "\n{rule}");
    out
}

pub fn print_report(results: &[ScenarioResult]) {
    println!("{}", render_report(results));
}
