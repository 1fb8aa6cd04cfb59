//! # Ingestion
//!
//! Record ingestion module.
//!
//! Responsibilities:
//! - Read newline-delimited input into `Record`s
//! - Skip blank lines, optionally enforce one JSON document per line
//! - Assign input indices used for reporting
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{read_records_from_path, RecordFormat};
//!
//! let records = read_records_from_path(path, RecordFormat::JsonLines).await?;
//! ```

mod config;
mod error;
mod reader;

// Re-exports
pub use config::{IngestionMetrics, MetricsSnapshot, RecordFormat};
pub use contracts::Record;
pub use error::{IngestionError, Result};
pub use reader::{read_records_from_path, RecordReader};
