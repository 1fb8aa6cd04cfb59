//! Pipeline statistics and metrics.

use std::path::PathBuf;
use std::time::Duration;

use contracts::{DispatchReport, RecordFailure};
use dispatcher::{DispatchRun, MetricsSnapshot};
use observability::DispatchMetricsAggregator;
use serde::Serialize;

/// Dispatch result for one input file
#[derive(Debug, Clone, Serialize)]
pub struct InputRun {
    pub path: PathBuf,
    pub report: DispatchReport,
    pub metrics: MetricsSnapshot,
    pub elapsed_ms: u64,
}

/// Batching plan for one input file (dry run)
#[derive(Debug, Clone, Serialize)]
pub struct PlannedInput {
    pub path: PathBuf,
    pub records: usize,
    pub batches: usize,
    /// Single-record batches above max_bytes_per_request
    pub oversized: usize,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Api the records were dispatched to
    pub api: String,

    /// One entry per dispatched input, in input order
    pub runs: Vec<InputRun>,

    /// One entry per input batched in dry-run mode
    pub planned: Vec<PlannedInput>,

    /// Total duration of the pipeline run
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,

    #[serde(skip)]
    pub aggregator: DispatchMetricsAggregator,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl PipelineStats {
    pub fn new(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            ..Default::default()
        }
    }

    /// Record a finished dispatch
    pub fn add_run(&mut self, path: PathBuf, run: DispatchRun) {
        self.aggregator.update(&run.report, run.elapsed);
        self.runs.push(InputRun {
            path,
            report: run.report,
            metrics: run.metrics,
            elapsed_ms: run.elapsed.as_millis() as u64,
        });
    }

    /// Record a dry-run batching plan
    pub fn add_plan(&mut self, plan: PlannedInput) {
        self.planned.push(plan);
    }

    pub fn total_records(&self) -> usize {
        self.runs.iter().map(|r| r.report.total_records).sum::<usize>()
            + self.planned.iter().map(|p| p.records).sum::<usize>()
    }

    pub fn total_failed(&self) -> usize {
        self.runs.iter().map(|r| r.report.total_failed).sum()
    }

    /// True iff no dispatched record failed
    pub fn is_success(&self) -> bool {
        self.total_failed() == 0
    }

    /// Failures across all inputs, tagged with their input file
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &RecordFailure)> {
        self.runs
            .iter()
            .flat_map(|run| run.report.failures.iter().map(move |f| (&run.path, f)))
    }

    /// Calculate records per second throughput
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_records() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Api: {}", self.api);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Inputs: {}", self.runs.len() + self.planned.len());
        println!("   ├─ Records: {}", self.total_records());
        println!("   └─ Records/s: {:.2}", self.throughput());

        if !self.planned.is_empty() {
            println!("\n🧪 Dry Run Plan");
            for plan in &self.planned {
                println!(
                    "   ├─ {}: {} records in {} batches ({} oversized)",
                    plan.path.display(),
                    plan.records,
                    plan.batches,
                    plan.oversized
                );
            }
        }

        if !self.runs.is_empty() {
            println!("\n📈 Per Input");
            for run in &self.runs {
                println!(
                    "   ├─ {}: {}/{} succeeded, {} batches, {} retries, peak in-flight {}",
                    run.path.display(),
                    run.report.total_succeeded,
                    run.report.total_records,
                    run.report.batches,
                    run.metrics.retries,
                    run.metrics.peak_in_flight
                );
            }

            println!();
            print!("{}", self.aggregator.summary());
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ErrorKind;

    fn run(total: usize, failed: usize) -> DispatchRun {
        DispatchRun {
            api: "AC".into(),
            report: DispatchReport {
                total_records: total,
                total_succeeded: total - failed,
                total_failed: failed,
                failures: (0..failed)
                    .map(|i| RecordFailure {
                        record_index: i,
                        error_kind: ErrorKind::Transient,
                        message: None,
                    })
                    .collect(),
                batches: 1,
                attempts: 1,
            },
            metrics: MetricsSnapshot::default(),
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_totals_across_inputs() {
        let mut stats = PipelineStats::new("AC");
        stats.add_run("a.txt".into(), run(4, 0));
        stats.add_run("b.txt".into(), run(3, 2));

        assert_eq!(stats.total_records(), 7);
        assert_eq!(stats.total_failed(), 2);
        assert!(!stats.is_success());

        let paths: Vec<_> = stats.failures().map(|(p, _)| p.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("b.txt"), PathBuf::from("b.txt")]);
        assert_eq!(stats.aggregator.total_runs, 2);
    }

    #[test]
    fn test_serializes_duration_as_millis() {
        let mut stats = PipelineStats::new("AC");
        stats.duration = Duration::from_millis(1500);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["duration"], 1500);
        assert_eq!(json["api"], "AC");
    }
}
