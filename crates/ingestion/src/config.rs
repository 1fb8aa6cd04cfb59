//! Reader configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// How each input line is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFormat {
    /// Each non-blank line is an opaque record
    #[default]
    Lines,
    /// Each non-blank line must be a JSON document
    JsonLines,
}

impl RecordFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "json" | "jsonl" | "ndjson" => Self::JsonLines,
            _ => Self::Lines,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Records produced
    pub records_read: AtomicU64,

    /// Blank lines skipped
    pub blank_lines: AtomicU64,

    /// Lines rejected by the format check
    pub invalid_records: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a produced record
    pub fn record_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped blank line
    pub fn record_blank(&self) {
        self.blank_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invalid line
    pub fn record_invalid(&self) {
        self.invalid_records.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            blank_lines: self.blank_lines.load(Ordering::Relaxed),
            invalid_records: self.invalid_records.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub blank_lines: u64,
    pub invalid_records: u64,
}
