//! DispatchReport - final accounting of one dispatch run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ErrorKind;

/// One failed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Input index of the record
    pub record_index: usize,

    /// Final error kind
    pub error_kind: ErrorKind,

    /// Error detail from the last attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregate of every batch outcome for one run.
///
/// Immutable once returned; `failures` is ordered by `record_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Records fed into the run
    pub total_records: usize,

    /// Records accepted by the target
    pub total_succeeded: usize,

    /// Records with a terminal failure
    pub total_failed: usize,

    /// Per-record failures, ordered by index
    pub failures: Vec<RecordFailure>,

    /// Batches formed
    pub batches: usize,

    /// Upload calls made, retries included
    pub attempts: u64,
}

impl DispatchReport {
    /// True iff no record failed
    pub fn is_success(&self) -> bool {
        self.total_failed == 0
    }

    /// Failed record counts grouped by error kind
    pub fn failures_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.error_kind).or_insert(0) += 1;
        }
        counts
    }

    /// Fraction of records accepted, 1.0 for an empty run
    pub fn success_rate(&self) -> f64 {
        if self.total_records == 0 {
            1.0
        } else {
            self.total_succeeded as f64 / self.total_records as f64
        }
    }
}
