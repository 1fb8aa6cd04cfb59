//! Line-oriented record reader

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use contracts::Record;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, instrument, warn};

use crate::config::{IngestionMetrics, RecordFormat};
use crate::error::{IngestionError, Result};

/// Turns an async line source into `Record`s.
///
/// Indices are assigned in input order starting at 0 and count only the
/// records produced, so blank lines leave no gaps.
pub struct RecordReader<R> {
    lines: Lines<R>,
    format: RecordFormat,
    line_no: usize,
    next_index: usize,
    metrics: Arc<IngestionMetrics>,
}

impl<R: AsyncBufRead + Unpin> RecordReader<R> {
    /// Create a reader over `source`
    pub fn new(source: R, format: RecordFormat) -> Self {
        Self {
            lines: source.lines(),
            format,
            line_no: 0,
            next_index: 0,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Read the next record, `None` at end of input.
    ///
    /// # Errors
    /// - IO failure
    /// - `InvalidRecord` when a `JsonLines` line is not valid JSON
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.metrics.record_blank();
                continue;
            }

            if self.format == RecordFormat::JsonLines {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(trimmed) {
                    self.metrics.record_invalid();
                    warn!(line = self.line_no, error = %e, "invalid json record");
                    return Err(IngestionError::InvalidRecord {
                        line: self.line_no,
                        message: e.to_string(),
                    });
                }
            }

            let record = Record::new(self.next_index, Bytes::from(trimmed.to_owned()));
            self.next_index += 1;
            self.metrics.record_read();
            metrics::counter!("tentacles_records_read_total").increment(1);
            return Ok(Some(record));
        }
        Ok(None)
    }

    /// Drain the source into a vector
    pub async fn read_all(mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        let snapshot = self.metrics.snapshot();
        debug!(
            records = snapshot.records_read,
            blank_lines = snapshot.blank_lines,
            "input drained"
        );
        Ok(records)
    }
}

/// Read every record of the file at `path`
#[instrument(name = "ingestion_read_file", skip(path), fields(path = %path.display()))]
pub async fn read_records_from_path(path: &Path, format: RecordFormat) -> Result<Vec<Record>> {
    let file = File::open(path).await?;
    RecordReader::new(BufReader::new(file), format).read_all().await
}
