//! Record / Batch - Batcher output
//!
//! A `Batch` is formed once by the batcher and never mutated afterwards.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unit of payload data.
///
/// The dispatcher never looks inside `payload`; its structure belongs to the
/// uploader that eventually sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the input sequence
    pub index: usize,

    /// Raw payload bytes
    pub payload: Bytes,
}

impl Record {
    /// Create a record at `index`
    pub fn new(index: usize, payload: impl Into<Bytes>) -> Self {
        Self {
            index,
            payload: payload.into(),
        }
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Batch sequence number, assigned by the batcher starting at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered, non-empty group of records sent in one upload call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch id
    pub id: BatchId,

    /// Records in input order
    pub records: Vec<Record>,
}

impl Batch {
    /// Create a batch
    pub fn new(id: BatchId, records: Vec<Record>) -> Self {
        Self { id, records }
    }

    /// Number of records
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the batch holds no records (the batcher never emits one)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total payload size in bytes
    pub fn byte_size(&self) -> usize {
        self.records.iter().map(Record::size).sum()
    }

    /// Input indices of the records in this batch
    pub fn record_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.records.iter().map(|r| r.index)
    }

    /// Whether `index` belongs to this batch
    pub fn contains_index(&self, index: usize) -> bool {
        self.records.iter().any(|r| r.index == index)
    }
}
