//! DispatchCoordinator - drives batches through gate, limiter and uploader

use std::sync::Arc;

use contracts::{Batch, BatchResult, DispatchConfig, DispatchReport, Record, Uploader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::batcher::make_batches;
use crate::error::DispatcherError;
use crate::gate::ConcurrencyGate;
use crate::metrics::DispatchMetrics;
use crate::rate_limiter::RateLimiter;
use crate::report::{normalize, BatchOutcome, ReportBuilder};

/// Runs dispatches against one uploader with one configuration.
///
/// Each `dispatch` call gets its own worker pool, gate and limiter, so
/// concurrent runs never share hidden state. Metrics are cumulative.
pub struct DispatchCoordinator<U> {
    uploader: Arc<U>,
    config: DispatchConfig,
    cancel: CancellationToken,
    metrics: Arc<DispatchMetrics>,
}

/// Everything a worker needs for one run
struct WorkerContext<U> {
    uploader: Arc<U>,
    gate: ConcurrencyGate,
    limiter: RateLimiter,
    config: DispatchConfig,
    cancel: CancellationToken,
    metrics: Arc<DispatchMetrics>,
}

enum FeedState {
    Open,
    Cancelled,
    WorkersGone,
}

impl<U: Uploader + Sync + 'static> DispatchCoordinator<U> {
    /// Create a coordinator owning `uploader`
    pub fn new(uploader: U, config: DispatchConfig) -> Self {
        Self::from_shared(Arc::new(uploader), config)
    }

    /// Create a coordinator sharing `uploader` with other owners
    pub fn from_shared(uploader: Arc<U>, config: DispatchConfig) -> Self {
        Self {
            uploader,
            config,
            cancel: CancellationToken::new(),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Use an externally controlled cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops admission of new batches when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Configuration used for every run
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Batch, upload and account `records`.
    ///
    /// Returns once every batch is terminal. Upload failures are reported in
    /// the `DispatchReport`, never as `Err`.
    ///
    /// # Errors
    /// `DispatcherError::Config` if the configuration is invalid; no batch is
    /// formed in that case.
    #[instrument(
        name = "dispatch_run",
        skip(self, records),
        fields(uploader = %self.uploader.name(), qps = self.config.qps, threads = self.config.number_of_threads)
    )]
    pub async fn dispatch<I>(&self, records: I) -> Result<DispatchReport, DispatcherError>
    where
        I: IntoIterator<Item = Record>,
    {
        self.config.ensure_valid()?;

        let workers_count = self.config.number_of_threads;
        let context = Arc::new(WorkerContext {
            uploader: Arc::clone(&self.uploader),
            gate: ConcurrencyGate::new(workers_count),
            limiter: RateLimiter::new(self.config.qps),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            metrics: Arc::clone(&self.metrics),
        });

        let (queue_tx, queue_rx) = async_channel::bounded::<Batch>(workers_count);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for worker_id in 0..workers_count {
            workers.spawn(run_worker(
                worker_id,
                Arc::clone(&context),
                queue_rx.clone(),
                outcome_tx.clone(),
            ));
        }
        drop(queue_rx);
        drop(outcome_tx);

        info!(workers = workers_count, "dispatch started");

        let mut builder = ReportBuilder::new();
        let mut batcher = make_batches(records, &self.config);
        let mut state = FeedState::Open;

        for batch in batcher.by_ref() {
            builder.register_batch(&batch);
            self.metrics.inc_batches();

            if matches!(state, FeedState::Open) && self.cancel.is_cancelled() {
                info!(batch_id = %batch.id, "cancellation requested, no further batches admitted");
                state = FeedState::Cancelled;
            }

            match state {
                FeedState::Open => {
                    let batch_id = batch.id;
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            info!(batch_id = %batch_id, "cancellation requested, no further batches admitted");
                            state = FeedState::Cancelled;
                            builder.record_outcome(BatchOutcome::not_admitted(batch_id, 0));
                        }
                        sent = queue_tx.send(batch) => {
                            if sent.is_err() {
                                error!(batch_id = %batch_id, "worker pool exited early");
                                state = FeedState::WorkersGone;
                            }
                        }
                    }
                }
                FeedState::Cancelled => {
                    builder.record_outcome(BatchOutcome::not_admitted(batch.id, 0));
                }
                // left pending, finish() marks them transient
                FeedState::WorkersGone => {}
            }
        }
        drop(queue_tx);

        if batcher.oversized_batches() > 0 {
            warn!(
                count = batcher.oversized_batches(),
                "records larger than max_batch_bytes were sent alone"
            );
        }

        while let Some(outcome) = outcome_rx.recv().await {
            builder.record_outcome(outcome);
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "dispatch worker failed");
            }
        }

        let report = builder.finish();
        self.metrics
            .add_records(report.total_succeeded, report.total_failed);

        info!(
            total = report.total_records,
            succeeded = report.total_succeeded,
            failed = report.total_failed,
            batches = report.batches,
            attempts = report.attempts,
            peak_in_flight = context.gate.peak_in_flight(),
            "dispatch finished"
        );

        Ok(report)
    }
}

#[instrument(name = "dispatch_worker_loop", skip(context, queue, outcomes))]
async fn run_worker<U: Uploader + Sync>(
    worker_id: usize,
    context: Arc<WorkerContext<U>>,
    queue: async_channel::Receiver<Batch>,
    outcomes: mpsc::UnboundedSender<BatchOutcome>,
) {
    debug!(worker_id, "dispatch worker started");

    while let Ok(batch) = queue.recv().await {
        let outcome = process_batch(&context, &batch).await;
        if outcomes.send(outcome).is_err() {
            warn!(worker_id, batch_id = %batch.id, "outcome receiver dropped");
            break;
        }
    }

    debug!(worker_id, "dispatch worker stopped");
}

/// Pending -> InFlight -> terminal, with sequential retries.
///
/// A retry re-sends the whole batch, including records an earlier attempt
/// accepted. The terminal result is the last attempt's.
async fn process_batch<U: Uploader + Sync>(
    context: &WorkerContext<U>,
    batch: &Batch,
) -> BatchOutcome {
    let mut attempt: u32 = 0;
    let mut attempts_made: u32 = 0;
    let mut last = None;

    loop {
        if context.cancel.is_cancelled() {
            return stopped(batch, last, attempts_made);
        }

        let permit = tokio::select! {
            biased;
            _ = context.cancel.cancelled() => return stopped(batch, last, attempts_made),
            permit = context.gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(batch_id = %batch.id, error = %e, "batch not admitted");
                    return stopped(batch, last, attempts_made);
                }
            },
        };

        tokio::select! {
            biased;
            _ = context.cancel.cancelled() => return stopped(batch, last, attempts_made),
            _ = context.limiter.acquire() => {}
        }

        let raw = {
            let _in_flight = context.metrics.enter_upload();
            context.uploader.upload(batch).await
        };
        drop(permit);
        attempts_made += 1;

        let result = normalize(raw, batch);
        if result.is_success() {
            debug!(batch_id = %batch.id, attempts = attempts_made, "batch succeeded");
            return BatchOutcome::completed(result, attempts_made);
        }

        if !(result.retryable && attempt < context.config.max_retries) {
            warn!(
                batch_id = %batch.id,
                attempts = attempts_made,
                failed = result.failed_record_indices.len(),
                error_kind = ?result.error_kind,
                message = result.message.as_deref().unwrap_or_default(),
                "batch failed"
            );
            return BatchOutcome::completed(result, attempts_made);
        }

        let backoff = context.config.backoff_for(attempt);
        attempt += 1;
        context.metrics.inc_retries();
        debug!(
            batch_id = %batch.id,
            retry = attempt,
            backoff_ms = backoff.as_millis() as u64,
            message = result.message.as_deref().unwrap_or_default(),
            "retrying batch"
        );
        last = Some(result);

        tokio::select! {
            biased;
            _ = context.cancel.cancelled() => return stopped(batch, last, attempts_made),
            _ = sleep(backoff) => {}
        }
    }
}

/// Outcome of a batch that stops before a new attempt
fn stopped(batch: &Batch, last: Option<BatchResult>, attempts: u32) -> BatchOutcome {
    match last {
        Some(result) => BatchOutcome::completed(result, attempts),
        None => BatchOutcome::not_admitted(batch.id, attempts),
    }
}
