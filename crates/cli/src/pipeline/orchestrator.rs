//! Pipeline orchestrator - ingestion, registry and dispatch for one api.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::ConnectorBlueprint;
use dispatcher::{make_batches, ApiEntry, ApiRegistry};
use ingestion::RecordFormat;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{PipelineStats, PlannedInput};
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated connector configuration
    pub blueprint: ConnectorBlueprint,

    /// Api code to dispatch to
    pub api: String,

    /// Input files, dispatched one after another
    pub inputs: Vec<PathBuf>,

    /// Forced input format (None = infer per file)
    pub format: Option<RecordFormat>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Batch only, no uploads
    pub dry_run: bool,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops admission of new batches
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline over every input
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let registry = ApiRegistry::from_blueprint(&self.config.blueprint);
        let entry = registry.resolve(&self.config.api)?;

        info!(
            api = %entry.name(),
            uploader = entry.api().uploader.as_str(),
            transport = ?entry.transport(),
            qps = entry.config().qps,
            threads = entry.config().number_of_threads,
            records_per_request = entry.config().records_per_request,
            inputs = self.config.inputs.len(),
            "Api resolved"
        );

        let mut stats = PipelineStats::new(entry.name().as_str());
        for path in &self.config.inputs {
            self.run_input(entry, path, &mut stats).await?;
        }

        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    async fn run_input(
        &self,
        entry: &ApiEntry,
        path: &Path,
        stats: &mut PipelineStats,
    ) -> Result<()> {
        if !path.exists() {
            return Err(CliError::input_not_found(path).into());
        }

        let format = self.config.format.unwrap_or_else(|| {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            RecordFormat::from_extension(ext)
        });
        let records = ingestion::read_records_from_path(path, format)
            .await
            .with_context(|| format!("Failed to read records from {}", path.display()))?;

        info!(input = %path.display(), records = records.len(), ?format, "Input loaded");
        observability::record_records_read(entry.name().as_str(), records.len());

        if self.config.dry_run {
            let total_records = records.len();
            let mut batcher = make_batches(records, entry.config());
            let batches = batcher.by_ref().count();
            stats.add_plan(PlannedInput {
                path: path.to_path_buf(),
                records: total_records,
                batches,
                oversized: batcher.oversized_batches(),
            });
            return Ok(());
        }

        if self.cancel.is_cancelled() {
            warn!(input = %path.display(), "Shutdown requested, records will be reported as cancelled");
        }

        let run = entry
            .dispatch(records, self.cancel.clone())
            .await
            .with_context(|| format!("Dispatch failed for {}", path.display()))?;

        observability::record_dispatch_report(run.api.as_str(), &run.report, run.elapsed);
        observability::record_peak_in_flight(run.api.as_str(), run.metrics.peak_in_flight);

        info!(
            input = %path.display(),
            succeeded = run.report.total_succeeded,
            failed = run.report.total_failed,
            elapsed_ms = run.elapsed.as_millis() as u64,
            "Input dispatched"
        );

        stats.add_run(path.to_path_buf(), run);
        Ok(())
    }
}
