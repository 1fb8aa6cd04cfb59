//! Batcher - splits an ordered record sequence into upload-sized batches

use std::iter::Peekable;

use contracts::{Batch, BatchId, DispatchConfig, Record};
use tracing::warn;

/// Lazy, single-pass iterator of batches.
///
/// A batch is closed when adding the next record would exceed either the
/// record count or the byte budget. A record larger than the byte budget on
/// its own becomes a single-record batch.
pub struct Batcher<I: Iterator<Item = Record>> {
    records: Peekable<I>,
    max_records: usize,
    max_bytes: Option<usize>,
    next_id: u64,
    oversized: usize,
}

/// Build a batcher over `records` using the limits of `config`
pub fn make_batches<I>(records: I, config: &DispatchConfig) -> Batcher<I::IntoIter>
where
    I: IntoIterator<Item = Record>,
{
    Batcher::new(records, config.records_per_request, config.max_batch_bytes)
}

impl<I: Iterator<Item = Record>> Batcher<I> {
    /// Create a batcher; `max_records` below 1 is treated as 1
    pub fn new(
        records: impl IntoIterator<Item = Record, IntoIter = I>,
        max_records: usize,
        max_bytes: Option<usize>,
    ) -> Self {
        Self {
            records: records.into_iter().peekable(),
            max_records: max_records.max(1),
            max_bytes,
            next_id: 0,
            oversized: 0,
        }
    }

    /// Single-record batches emitted because the record alone exceeded the byte budget
    pub fn oversized_batches(&self) -> usize {
        self.oversized
    }

    fn fits(max_bytes: Option<usize>, current_bytes: usize, next: &Record) -> bool {
        max_bytes.map_or(true, |max| current_bytes + next.size() <= max)
    }

    fn emit(&mut self, records: Vec<Record>) -> Batch {
        let id = BatchId(self.next_id);
        self.next_id += 1;
        Batch::new(id, records)
    }
}

impl<I: Iterator<Item = Record>> Iterator for Batcher<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let first = self.records.next()?;
        let mut bytes = first.size();

        if let Some(max) = self.max_bytes {
            if bytes > max {
                self.oversized += 1;
                warn!(
                    record_index = first.index,
                    size = bytes,
                    max_batch_bytes = max,
                    "record exceeds max_batch_bytes, sending it alone"
                );
                return Some(self.emit(vec![first]));
            }
        }

        let max_bytes = self.max_bytes;
        let mut records = vec![first];
        while records.len() < self.max_records {
            let fits = match self.records.peek() {
                Some(next) => Self::fits(max_bytes, bytes, next),
                None => false,
            };
            if !fits {
                break;
            }
            if let Some(next) = self.records.next() {
                bytes += next.size();
                records.push(next);
            }
        }

        Some(self.emit(records))
    }
}
