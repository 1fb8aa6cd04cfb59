//! Report aggregation
//!
//! Folds terminal batch outcomes into one `DispatchReport`. Every registered
//! record is accounted exactly once, even when its batch never reports back.

use std::collections::BTreeMap;

use contracts::{Batch, BatchId, BatchResult, DispatchReport, ErrorKind, RecordFailure};
use tracing::{debug, warn};

const NOT_ADMITTED: &str = "dispatch cancelled before the batch was sent";
const LOST: &str = "worker terminated without reporting the batch";

/// Make an uploader result consistent with the batch it describes.
///
/// - failed indices outside the batch are dropped
/// - an error with no failed indices fails the whole batch
/// - failed records without an error kind are `PermanentRejection`
/// - `succeeded_count` is recomputed from the failed set
pub fn normalize(mut result: BatchResult, batch: &Batch) -> BatchResult {
    result.batch_id = batch.id;
    result
        .failed_record_indices
        .retain(|idx| batch.contains_index(*idx));

    if result.error_kind.is_some() && result.failed_record_indices.is_empty() {
        result.failed_record_indices = batch.record_indices().collect();
    }
    if !result.failed_record_indices.is_empty() && result.error_kind.is_none() {
        result.error_kind = Some(ErrorKind::PermanentRejection);
    }
    if result.error_kind.is_none() {
        result.retryable = false;
    }

    result.succeeded_count = batch.len() - result.failed_record_indices.len();
    result
}

/// How a batch left the pipeline
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutcomeStatus {
    /// Last attempt's result, already normalized
    Completed(BatchResult),
    /// Never sent because the run was cancelled
    NotAdmitted,
}

/// Terminal state of one batch
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BatchOutcome {
    pub batch_id: BatchId,
    pub attempts: u32,
    pub status: OutcomeStatus,
}

impl BatchOutcome {
    pub fn completed(result: BatchResult, attempts: u32) -> Self {
        Self {
            batch_id: result.batch_id,
            attempts,
            status: OutcomeStatus::Completed(result),
        }
    }

    pub fn not_admitted(batch_id: BatchId, attempts: u32) -> Self {
        Self {
            batch_id,
            attempts,
            status: OutcomeStatus::NotAdmitted,
        }
    }
}

/// Accumulates outcomes for one run
#[derive(Debug, Default)]
pub(crate) struct ReportBuilder {
    pending: BTreeMap<BatchId, Vec<usize>>,
    total_records: usize,
    batches: usize,
    attempts: u64,
    succeeded: usize,
    failures: Vec<RecordFailure>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account a batch before it is handed to a worker
    pub fn register_batch(&mut self, batch: &Batch) {
        self.batches += 1;
        self.total_records += batch.len();
        self.pending
            .insert(batch.id, batch.record_indices().collect());
    }

    /// Fold one terminal outcome; outcomes for unknown batches are ignored
    pub fn record_outcome(&mut self, outcome: BatchOutcome) {
        let Some(indices) = self.pending.remove(&outcome.batch_id) else {
            warn!(batch_id = %outcome.batch_id, "outcome for unknown or finished batch ignored");
            return;
        };
        self.attempts += u64::from(outcome.attempts);

        match outcome.status {
            OutcomeStatus::Completed(result) => {
                let kind = result.error_kind.unwrap_or(ErrorKind::PermanentRejection);
                for idx in indices {
                    if result.failed_record_indices.contains(&idx) {
                        self.failures.push(RecordFailure {
                            record_index: idx,
                            error_kind: kind,
                            message: result.message.clone(),
                        });
                    } else {
                        self.succeeded += 1;
                    }
                }
            }
            OutcomeStatus::NotAdmitted => {
                self.fail_all(indices, ErrorKind::Cancelled, NOT_ADMITTED);
            }
        }
    }

    fn fail_all(&mut self, indices: Vec<usize>, kind: ErrorKind, message: &str) {
        self.failures
            .extend(indices.into_iter().map(|record_index| RecordFailure {
                record_index,
                error_kind: kind,
                message: Some(message.to_string()),
            }));
    }

    /// Close the run. Batches still pending are counted as transient failures.
    pub fn finish(mut self) -> DispatchReport {
        let lost = std::mem::take(&mut self.pending);
        for (batch_id, indices) in lost {
            warn!(batch_id = %batch_id, records = indices.len(), "batch lost, marking records transient");
            self.fail_all(indices, ErrorKind::Transient, LOST);
        }

        self.failures.sort_by_key(|f| f.record_index);
        debug!(
            batches = self.batches,
            succeeded = self.succeeded,
            failed = self.failures.len(),
            "report aggregated"
        );

        DispatchReport {
            total_records: self.total_records,
            total_succeeded: self.succeeded,
            total_failed: self.failures.len(),
            failures: self.failures,
            batches: self.batches,
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Record;
    use std::collections::BTreeSet;

    fn batch(id: u64, indices: std::ops::Range<usize>) -> Batch {
        Batch::new(BatchId(id), indices.map(|i| Record::new(i, "p")).collect())
    }

    #[test]
    fn test_normalize_drops_foreign_indices() {
        let b = batch(0, 0..3);
        let mut raw = BatchResult::success(&b);
        raw.failed_record_indices = BTreeSet::from([1, 42]);
        raw.error_kind = Some(ErrorKind::PermanentRejection);
        let result = normalize(raw, &b);
        assert_eq!(result.failed_record_indices, BTreeSet::from([1]));
        assert_eq!(result.succeeded_count, 2);
    }

    #[test]
    fn test_normalize_error_without_indices_fails_batch() {
        let b = batch(0, 5..8);
        let mut raw = BatchResult::success(&b);
        raw.error_kind = Some(ErrorKind::Transient);
        raw.retryable = true;
        let result = normalize(raw, &b);
        assert_eq!(result.failed_record_indices.len(), 3);
        assert_eq!(result.succeeded_count, 0);
        assert!(result.retryable);
    }

    #[test]
    fn test_normalize_missing_kind() {
        let b = batch(0, 0..2);
        let mut raw = BatchResult::success(&b);
        raw.failed_record_indices.insert(0);
        raw.retryable = true;
        let result = normalize(raw, &b);
        assert_eq!(result.error_kind, Some(ErrorKind::PermanentRejection));
    }

    #[test]
    fn test_normalize_fixes_batch_id() {
        let b = batch(7, 0..2);
        let mut raw = BatchResult::success(&b);
        raw.batch_id = BatchId(99);
        assert_eq!(normalize(raw, &b).batch_id, BatchId(7));
    }

    #[test]
    fn test_builder_accounts_every_record() {
        let b0 = batch(0, 0..3);
        let b1 = batch(1, 3..6);
        let b2 = batch(2, 6..7);
        let b3 = batch(3, 7..9);

        let mut builder = ReportBuilder::new();
        for b in [&b0, &b1, &b2, &b3] {
            builder.register_batch(b);
        }
        builder.record_outcome(BatchOutcome::completed(BatchResult::success(&b0), 1));
        builder.record_outcome(BatchOutcome::completed(
            BatchResult::partial(&b1, [4], ErrorKind::PermanentRejection, "bad"),
            2,
        ));
        builder.record_outcome(BatchOutcome::not_admitted(b2.id, 0));
        // b3 never reports

        let report = builder.finish();
        assert_eq!(report.total_records, 9);
        assert_eq!(report.batches, 4);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.total_succeeded, 5);
        assert_eq!(report.total_succeeded + report.failures.len(), report.total_records);

        let kinds: Vec<(usize, ErrorKind)> = report
            .failures
            .iter()
            .map(|f| (f.record_index, f.error_kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (4, ErrorKind::PermanentRejection),
                (6, ErrorKind::Cancelled),
                (7, ErrorKind::Transient),
                (8, ErrorKind::Transient),
            ]
        );
    }

    #[test]
    fn test_duplicate_outcome_ignored() {
        let b = batch(0, 0..2);
        let mut builder = ReportBuilder::new();
        builder.register_batch(&b);
        builder.record_outcome(BatchOutcome::completed(BatchResult::success(&b), 1));
        builder.record_outcome(BatchOutcome::completed(
            BatchResult::failure(&b, ErrorKind::Transient, "late"),
            1,
        ));
        let report = builder.finish();
        assert!(report.is_success());
        assert_eq!(report.attempts, 1);
    }
}
