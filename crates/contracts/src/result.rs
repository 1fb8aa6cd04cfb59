//! BatchResult - Uploader output
//!
//! Outcome of one upload attempt for one batch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::{Batch, BatchId};

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network timeout, 5xx, server-side rate limiting (retryable)
    Transient,
    /// Malformed record, auth failure, quota permanently exhausted
    PermanentRejection,
    /// Invalid dispatch configuration (fatal, before any batch)
    Config,
    /// Never admitted to flight because the run was cancelled
    Cancelled,
}

impl ErrorKind {
    /// Whether an upload failing with this kind may be retried
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Stable label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::PermanentRejection => "permanent_rejection",
            Self::Config => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Batch this result belongs to
    pub batch_id: BatchId,

    /// Records accepted by the target
    pub succeeded_count: usize,

    /// Input indices of records that failed
    #[serde(default)]
    pub failed_record_indices: BTreeSet<usize>,

    /// Failure classification (None on full success)
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,

    /// Human readable error detail
    #[serde(default)]
    pub message: Option<String>,

    /// Whether the dispatcher may retry this batch
    #[serde(default)]
    pub retryable: bool,
}

impl BatchResult {
    /// Every record of `batch` was accepted
    pub fn success(batch: &Batch) -> Self {
        Self {
            batch_id: batch.id,
            succeeded_count: batch.len(),
            failed_record_indices: BTreeSet::new(),
            error_kind: None,
            message: None,
            retryable: false,
        }
    }

    /// Every record of `batch` failed with `kind`
    pub fn failure(batch: &Batch, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            batch_id: batch.id,
            succeeded_count: 0,
            failed_record_indices: batch.record_indices().collect(),
            error_kind: Some(kind),
            message: Some(message.into()),
            retryable: kind.is_retryable(),
        }
    }

    /// Only `failed` records of `batch` failed; the rest were accepted.
    ///
    /// Indices not belonging to the batch are ignored.
    pub fn partial(
        batch: &Batch,
        failed: impl IntoIterator<Item = usize>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let failed: BTreeSet<usize> = failed
            .into_iter()
            .filter(|idx| batch.contains_index(*idx))
            .collect();
        Self {
            batch_id: batch.id,
            succeeded_count: batch.len() - failed.len(),
            failed_record_indices: failed,
            error_kind: Some(kind),
            message: Some(message.into()),
            retryable: kind.is_retryable(),
        }
    }

    /// Override the retry flag
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// No failed records and no error
    pub fn is_success(&self) -> bool {
        self.failed_record_indices.is_empty() && self.error_kind.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;

    fn batch() -> Batch {
        Batch::new(
            BatchId(0),
            (10..14).map(|i| Record::new(i, "x")).collect(),
        )
    }

    #[test]
    fn test_failure_marks_every_record() {
        let result = BatchResult::failure(&batch(), ErrorKind::Transient, "503");
        assert_eq!(result.succeeded_count, 0);
        assert_eq!(result.failed_record_indices.len(), 4);
        assert!(result.retryable);
        assert!(!result.is_success());
    }

    #[test]
    fn test_partial_ignores_foreign_indices() {
        let result =
            BatchResult::partial(&batch(), [11, 13, 99], ErrorKind::PermanentRejection, "bad");
        assert_eq!(result.succeeded_count, 2);
        assert_eq!(
            result.failed_record_indices.iter().copied().collect::<Vec<_>>(),
            vec![11, 13]
        );
        assert!(!result.retryable);
    }

    #[test]
    fn test_error_kind_serde() {
        let json = serde_json::to_string(&ErrorKind::PermanentRejection).unwrap();
        assert_eq!(json, "\"permanent_rejection\"");
        assert!(!ErrorKind::Cancelled.is_retryable());
    }
}
